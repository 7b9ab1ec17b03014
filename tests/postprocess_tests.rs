//! File-level tests for image fitting and black & white conversion.

use std::path::{Path, PathBuf};

use living_portrait::postprocess::{
    convert_to_black_and_white, convert_video_to_bw, create_looping_video, create_simple_loop,
    fit_image_to_aspect_ratio, AspectRatio, BwMethod, FitMode, PostProcessError,
};
use tempfile::TempDir;

fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 4 % 256) as u8, (y * 4 % 256) as u8, 160])
    })
    .save(&path)
    .unwrap();
    path
}

// === Aspect Ratio Fitting ===

#[test]
fn test_pad_portrait_to_landscape() {
    let dir = TempDir::new().unwrap();
    let input = write_png(dir.path(), "portrait.png", 90, 160);

    let output = fit_image_to_aspect_ratio(
        &input,
        AspectRatio::Landscape16x9,
        None,
        FitMode::Pad,
        [0, 0, 0],
    )
    .unwrap();

    assert_eq!(output, dir.path().join("portrait_fitted_16x9.jpg"));
    let fitted = image::open(&output).unwrap();
    assert_eq!((fitted.width(), fitted.height()), (160, 90));

    // Left edge is padding, centre is picture
    let rgb = fitted.to_rgb8();
    let edge = rgb.get_pixel(2, 45).0;
    assert!(edge.iter().all(|&c| c < 16), "edge pixel {:?} should be black", edge);
    let centre = rgb.get_pixel(80, 45).0;
    assert!(centre[2] > 100, "centre pixel {:?} should be picture", centre);
}

#[test]
fn test_crop_square_to_landscape() {
    let dir = TempDir::new().unwrap();
    let input = write_png(dir.path(), "square.png", 160, 160);
    let output_path = dir.path().join("out").join("cropped.jpg");

    let output = fit_image_to_aspect_ratio(
        &input,
        AspectRatio::Landscape16x9,
        Some(&output_path),
        FitMode::Crop,
        [0, 0, 0],
    )
    .unwrap();

    assert_eq!(output, output_path);
    let fitted = image::open(&output).unwrap();
    assert_eq!((fitted.width(), fitted.height()), (160, 90));
}

#[test]
fn test_fit_missing_input() {
    let dir = TempDir::new().unwrap();
    let result = fit_image_to_aspect_ratio(
        &dir.path().join("missing.png"),
        AspectRatio::Square,
        None,
        FitMode::Pad,
        [255, 255, 255],
    );
    assert!(matches!(result, Err(PostProcessError::NotFound(_))));
}

#[test]
fn test_fit_undecodable_input() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("broken.png");
    std::fs::write(&input, b"definitely not a png").unwrap();

    let result = fit_image_to_aspect_ratio(
        &input,
        AspectRatio::Landscape16x9,
        None,
        FitMode::Pad,
        [0, 0, 0],
    );
    assert!(matches!(result, Err(PostProcessError::Image(_))));
}

// === Black & White ===

#[test]
fn test_black_and_white_default_output() {
    let dir = TempDir::new().unwrap();
    let input = write_png(dir.path(), "colour.png", 40, 30);

    let output = convert_to_black_and_white(&input, None, BwMethod::HighContrast).unwrap();

    assert_eq!(output, dir.path().join("colour_bw.jpg"));
    let bw = image::open(&output).unwrap().to_rgb8();
    assert_eq!(bw.dimensions(), (40, 30));
    for pixel in bw.pixels() {
        let [r, g, b] = pixel.0;
        // JPEG chroma noise stays within a few levels
        assert!(r.abs_diff(g) <= 3 && g.abs_diff(b) <= 3, "pixel {:?} not gray", pixel.0);
    }
}

#[test]
fn test_every_bw_method_writes_an_image() {
    let dir = TempDir::new().unwrap();
    let input = write_png(dir.path(), "colour.png", 24, 24);

    for method in [BwMethod::Grayscale, BwMethod::HighContrast, BwMethod::Vintage] {
        let output = dir.path().join(format!("{}.jpg", method.as_str()));
        convert_to_black_and_white(&input, Some(&output), method).unwrap();
        assert!(output.exists());
    }
}

// === Video ===

#[tokio::test]
async fn test_video_operations_report_missing_input() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.mp4");

    assert!(matches!(
        create_looping_video(&missing, None, 0.5, 1).await,
        Err(PostProcessError::NotFound(_))
    ));
    assert!(matches!(
        create_simple_loop(&missing, None, 3).await,
        Err(PostProcessError::NotFound(_))
    ));
    assert!(matches!(
        convert_video_to_bw(&missing, None, BwMethod::Vintage).await,
        Err(PostProcessError::NotFound(_))
    ));
}
