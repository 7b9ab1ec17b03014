//! Still-image filters: aspect-ratio fitting and black & white conversion.

use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};

use super::PostProcessError;

/// JPEG quality used for every written image.
const JPEG_QUALITY: u8 = 95;

/// Output aspect ratios understood by the video models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AspectRatio {
    #[default]
    Landscape16x9,
    Portrait9x16,
    Classic4x3,
    Portrait3x4,
    Square,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 5] = [
        AspectRatio::Landscape16x9,
        AspectRatio::Portrait9x16,
        AspectRatio::Classic4x3,
        AspectRatio::Portrait3x4,
        AspectRatio::Square,
    ];

    /// Width and height terms of the ratio.
    pub fn terms(self) -> (u32, u32) {
        match self {
            AspectRatio::Landscape16x9 => (16, 9),
            AspectRatio::Portrait9x16 => (9, 16),
            AspectRatio::Classic4x3 => (4, 3),
            AspectRatio::Portrait3x4 => (3, 4),
            AspectRatio::Square => (1, 1),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Landscape16x9 => "16:9",
            AspectRatio::Portrait9x16 => "9:16",
            AspectRatio::Classic4x3 => "4:3",
            AspectRatio::Portrait3x4 => "3:4",
            AspectRatio::Square => "1:1",
        }
    }

    /// Width divided by height.
    pub fn value(self) -> f64 {
        let (w, h) = self.terms();
        w as f64 / h as f64
    }

    /// Pixel dimensions with the longer side equal to `base_size`.
    pub fn dimensions(self, base_size: u32) -> (u32, u32) {
        let (w, h) = self.terms();
        if w >= h {
            (base_size, (base_size as u64 * h as u64 / w as u64) as u32)
        } else {
            ((base_size as u64 * w as u64 / h as u64) as u32, base_size)
        }
    }

    /// True if `width x height` is within `tolerance` (relative) of this ratio.
    pub fn matches(self, width: u32, height: u32, tolerance: f64) -> bool {
        if height == 0 {
            return false;
        }
        let current = width as f64 / height as f64;
        ((current - self.value()) / self.value()).abs() <= tolerance
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = PostProcessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AspectRatio::ALL
            .into_iter()
            .find(|ratio| ratio.as_str() == s.trim())
            .ok_or_else(|| PostProcessError::UnsupportedAspectRatio(s.to_string()))
    }
}

/// Rough shape of a source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectClass {
    /// Wider than 1.2:1.
    Landscape,
    /// Between 0.83:1 and 1.2:1.
    SquareIsh,
    Portrait,
}

impl AspectClass {
    pub fn of(width: u32, height: u32) -> Self {
        let aspect = width as f64 / height.max(1) as f64;
        if aspect > 1.2 {
            AspectClass::Landscape
        } else if aspect > 0.83 {
            AspectClass::SquareIsh
        } else {
            AspectClass::Portrait
        }
    }

    /// Ratio requested from the cloud model for this class.
    ///
    /// Every class maps to 16:9: reference-image requests are only known to
    /// work in landscape. Portrait and square sources are letterboxed instead.
    pub fn target_ratio(self) -> AspectRatio {
        match self {
            AspectClass::Landscape => AspectRatio::Landscape16x9,
            AspectClass::SquareIsh => AspectRatio::Landscape16x9,
            AspectClass::Portrait => AspectRatio::Landscape16x9,
        }
    }
}

/// How [`fit_image_to_aspect_ratio`] reaches the target shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FitMode {
    /// Letterbox or pillarbox, keeping the whole image.
    #[default]
    Pad,
    /// Centre crop.
    Crop,
}

/// Black & white conversion styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BwMethod {
    Grayscale,
    /// Classic portrait look: +30% contrast, +5% brightness.
    #[default]
    HighContrast,
    /// Softened, slightly punchier old-photo look.
    Vintage,
}

impl BwMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            BwMethod::Grayscale => "grayscale",
            BwMethod::HighContrast => "high_contrast",
            BwMethod::Vintage => "vintage",
        }
    }
}

/// Fit an image to `target` and save it as JPEG.
///
/// The default output is `{stem}_fitted_{W}x{H}.jpg` next to the input.
pub fn fit_image_to_aspect_ratio(
    input: &Path,
    target: AspectRatio,
    output: Option<&Path>,
    mode: FitMode,
    background: [u8; 3],
) -> Result<PathBuf, PostProcessError> {
    if !input.exists() {
        return Err(PostProcessError::NotFound(input.to_path_buf()));
    }

    let output = match output {
        Some(path) => path.to_path_buf(),
        None => suffixed_jpeg(input, &format!("fitted_{}", target.as_str().replace(':', "x"))),
    };

    log::info!("Fitting image to {} using {:?} mode...", target, mode);

    let img = image::open(input)?.to_rgb8();
    let (source_w, source_h) = img.dimensions();
    let (target_w, target_h) = target.dimensions(source_w.max(source_h));

    let result = match mode {
        FitMode::Pad => pad_to_dimensions(&img, target_w, target_h, background),
        FitMode::Crop => crop_to_aspect(&img, target.value()),
    };

    save_jpeg(&DynamicImage::ImageRgb8(result), &output)?;
    log::info!("Fitted image saved to: {}", output.display());
    Ok(output)
}

/// Scale `img` to fit inside `target_w x target_h` and centre it on a canvas.
pub fn pad_to_dimensions(img: &RgbImage, target_w: u32, target_h: u32, background: [u8; 3]) -> RgbImage {
    let (source_w, source_h) = img.dimensions();
    let source_aspect = source_w as f64 / source_h as f64;
    let target_aspect = target_w as f64 / target_h as f64;

    let scale = if source_aspect > target_aspect {
        target_w as f64 / source_w as f64
    } else {
        target_h as f64 / source_h as f64
    };
    let new_w = ((source_w as f64 * scale) as u32).clamp(1, target_w);
    let new_h = ((source_h as f64 * scale) as u32).clamp(1, target_h);

    let resized = imageops::resize(img, new_w, new_h, FilterType::Lanczos3);
    let mut canvas = RgbImage::from_pixel(target_w, target_h, Rgb(background));
    let x = (target_w - new_w) / 2;
    let y = (target_h - new_h) / 2;
    imageops::overlay(&mut canvas, &resized, x as i64, y as i64);

    log::debug!("Padded {}x{} to {}x{}", source_w, source_h, target_w, target_h);
    canvas
}

/// Centre crop `img` to `target_aspect` (width / height).
pub fn crop_to_aspect(img: &RgbImage, target_aspect: f64) -> RgbImage {
    let (source_w, source_h) = img.dimensions();
    let source_aspect = source_w as f64 / source_h as f64;

    let (new_w, new_h) = if source_aspect > target_aspect {
        (((source_h as f64 * target_aspect) as u32).max(1), source_h)
    } else {
        (source_w, ((source_w as f64 / target_aspect) as u32).max(1))
    };
    let x = (source_w - new_w) / 2;
    let y = (source_h - new_h) / 2;

    log::debug!("Cropped from {}x{} to {}x{}", source_w, source_h, new_w, new_h);
    imageops::crop_imm(img, x, y, new_w, new_h).to_image()
}

/// Convert an image to black & white and save it as JPEG.
///
/// The default output is `{stem}_bw.jpg` next to the input.
pub fn convert_to_black_and_white(
    input: &Path,
    output: Option<&Path>,
    method: BwMethod,
) -> Result<PathBuf, PostProcessError> {
    if !input.exists() {
        return Err(PostProcessError::NotFound(input.to_path_buf()));
    }
    let output = match output {
        Some(path) => path.to_path_buf(),
        None => suffixed_jpeg(input, "bw"),
    };

    log::info!("Converting to black and white using {} method...", method.as_str());

    let gray = image::open(input)?.to_luma8();
    let gray = apply_bw_method(gray, method);

    let rgb = DynamicImage::ImageLuma8(gray).to_rgb8();
    save_jpeg(&DynamicImage::ImageRgb8(rgb), &output)?;
    log::info!("Black and white image saved to: {}", output.display());
    Ok(output)
}

/// Tone a grayscale image according to `method`.
pub fn apply_bw_method(gray: GrayImage, method: BwMethod) -> GrayImage {
    match method {
        BwMethod::Grayscale => gray,
        BwMethod::HighContrast => {
            let contrasted = enhance_contrast(&gray, 1.3);
            enhance_brightness(&contrasted, 1.05)
        }
        BwMethod::Vintage => {
            let softened = enhance_sharpness(&gray, 0.8);
            enhance_contrast(&softened, 1.2)
        }
    }
}

/// Scale each pixel's distance from the mean gray level by `factor`.
pub fn enhance_contrast(gray: &GrayImage, factor: f32) -> GrayImage {
    let count = (gray.width() as u64 * gray.height() as u64).max(1);
    let sum: u64 = gray.pixels().map(|p| p.0[0] as u64).sum();
    let mean = (sum as f64 / count as f64).round() as f32;

    map_gray(gray, |v| mean + factor * (v - mean))
}

/// Multiply every pixel by `factor`.
pub fn enhance_brightness(gray: &GrayImage, factor: f32) -> GrayImage {
    map_gray(gray, |v| v * factor)
}

/// Blend between a blurred copy (`factor = 0`) and the original (`factor = 1`).
pub fn enhance_sharpness(gray: &GrayImage, factor: f32) -> GrayImage {
    let blurred = imageops::blur(gray, 1.0);
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let original = gray.get_pixel(x, y).0[0] as f32;
        let smooth = blurred.get_pixel(x, y).0[0] as f32;
        Luma([clamp_u8(smooth + factor * (original - smooth))])
    })
}

fn map_gray(gray: &GrayImage, f: impl Fn(f32) -> f32) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        Luma([clamp_u8(f(gray.get_pixel(x, y).0[0] as f32))])
    })
}

fn clamp_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

fn save_jpeg(img: &DynamicImage, path: &Path) -> Result<(), PostProcessError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let writer = BufWriter::new(File::create(path)?);
    img.write_with_encoder(JpegEncoder::new_with_quality(writer, JPEG_QUALITY))?;
    Ok(())
}

fn suffixed_jpeg(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    input.with_file_name(format!("{}_{}.jpg", stem, suffix))
}
