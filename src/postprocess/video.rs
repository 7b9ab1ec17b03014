//! Video filters run through `ffmpeg`.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use super::image::BwMethod;
use super::PostProcessError;

/// Default crossfade between the end and the start of a loop.
pub const DEFAULT_CROSSFADE: f64 = 0.5;

/// Read a video's duration in seconds with `ffprobe`.
pub async fn probe_duration(input: &Path) -> Result<f64, PostProcessError> {
    if !input.exists() {
        return Err(PostProcessError::NotFound(input.to_path_buf()));
    }

    let stdout = run(
        "ffprobe",
        &[
            "-v".into(),
            "error".into(),
            "-show_entries".into(),
            "format=duration".into(),
            "-of".into(),
            "default=noprint_wrappers=1:nokey=1".into(),
            input.to_string_lossy().into_owned(),
        ],
    )
    .await?;

    let text = stdout.trim();
    text.parse::<f64>()
        .map_err(|_| PostProcessError::InvalidDuration(text.to_string()))
}

/// Filter graph that crossfades the last `crossfade` seconds into the first.
///
/// With `num_loops > 1` the result is repeated with ffmpeg's `loop` filter.
pub fn build_loop_filter(duration: f64, crossfade: f64, num_loops: u32) -> String {
    let fade_start = (duration - crossfade).max(0.0);
    let mut filter = format!(
        "[0:v]split[v1][v2];\
         [v1]trim=0:{fade_start},setpts=PTS-STARTPTS[main];\
         [v2]trim={fade_start}:{duration},setpts=PTS-STARTPTS[fade_out];\
         [0:v]trim=0:{crossfade},setpts=PTS-STARTPTS[fade_in];\
         [fade_out][fade_in]xfade=transition=fade:duration={crossfade}:offset=0[xf];\
         [main][xf]concat=n=2:v=1:a=0"
    );
    if num_loops > 1 {
        filter.push_str(&format!("[base];[base]loop={}:1:0", num_loops));
    }
    filter
}

/// Create a seamlessly looping video by crossfading its end into its start.
///
/// The default output is `{stem}_loop.{ext}` next to the input.
pub async fn create_looping_video(
    input: &Path,
    output: Option<&Path>,
    crossfade: f64,
    num_loops: u32,
) -> Result<PathBuf, PostProcessError> {
    if !input.exists() {
        return Err(PostProcessError::NotFound(input.to_path_buf()));
    }
    let output = prepare_output(input, output, "loop").await?;

    log::info!("Creating looping video with {}s crossfade...", crossfade);

    let duration = probe_duration(input).await?;
    log::debug!("Video duration: {}s", duration);

    let filter = build_loop_filter(duration, crossfade, num_loops);
    let args = [
        "-i".to_string(),
        input.to_string_lossy().into_owned(),
        "-filter_complex".into(),
        filter,
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        "medium".into(),
        "-crf".into(),
        "18".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-y".into(),
        output.to_string_lossy().into_owned(),
    ];
    run("ffmpeg", &args).await?;

    log::info!("Looping video created: {}", output.display());
    Ok(output)
}

/// Repeat a video `num_loops` times without re-encoding.
pub async fn create_simple_loop(
    input: &Path,
    output: Option<&Path>,
    num_loops: u32,
) -> Result<PathBuf, PostProcessError> {
    if !input.exists() {
        return Err(PostProcessError::NotFound(input.to_path_buf()));
    }
    let output = prepare_output(input, output, "loop").await?;

    log::info!("Creating simple loop ({} repetitions)...", num_loops);

    let args = [
        "-stream_loop".to_string(),
        num_loops.saturating_sub(1).to_string(),
        "-i".into(),
        input.to_string_lossy().into_owned(),
        "-c".into(),
        "copy".into(),
        "-y".into(),
        output.to_string_lossy().into_owned(),
    ];
    run("ffmpeg", &args).await?;

    log::info!("Looped video created: {}", output.display());
    Ok(output)
}

/// `-vf` chain for a black & white method.
pub fn bw_video_filter(method: BwMethod) -> &'static str {
    match method {
        BwMethod::Grayscale => "hue=s=0",
        BwMethod::HighContrast => "hue=s=0,eq=contrast=1.3:brightness=0.02",
        BwMethod::Vintage => "hue=s=0,gblur=sigma=0.6,eq=contrast=1.2",
    }
}

/// Re-encode a video in black & white. Audio is copied untouched.
///
/// The default output is `{stem}_bw.{ext}` next to the input.
pub async fn convert_video_to_bw(
    input: &Path,
    output: Option<&Path>,
    method: BwMethod,
) -> Result<PathBuf, PostProcessError> {
    if !input.exists() {
        return Err(PostProcessError::NotFound(input.to_path_buf()));
    }
    let output = prepare_output(input, output, "bw").await?;

    log::info!("Converting video to black and white ({})...", method.as_str());

    let args = [
        "-i".to_string(),
        input.to_string_lossy().into_owned(),
        "-vf".into(),
        bw_video_filter(method).into(),
        "-c:v".into(),
        "libx264".into(),
        "-crf".into(),
        "18".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-c:a".into(),
        "copy".into(),
        "-y".into(),
        output.to_string_lossy().into_owned(),
    ];
    run("ffmpeg", &args).await?;

    log::info!("Black and white video created: {}", output.display());
    Ok(output)
}

async fn prepare_output(
    input: &Path,
    output: Option<&Path>,
    suffix: &str,
) -> Result<PathBuf, PostProcessError> {
    let output = match output {
        Some(path) => path.to_path_buf(),
        None => suffixed(input, suffix),
    };
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(output)
}

fn suffixed(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string());
    let name = match input.extension() {
        Some(ext) => format!("{}_{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}_{}", stem, suffix),
    };
    input.with_file_name(name)
}

/// Run a tool to completion and return its stdout.
async fn run(program: &'static str, args: &[String]) -> Result<String, PostProcessError> {
    log::debug!("Running {} {}", program, args.join(" "));

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(PostProcessError::spawn)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        log::error!("{} error: {}", program, stderr);
        return Err(PostProcessError::ProcessFailed {
            program,
            exit_code: output.status.code(),
            stderr,
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_filter_single_pass() {
        let filter = build_loop_filter(8.0, 0.5, 1);
        assert!(filter.starts_with("[0:v]split[v1][v2];"));
        assert!(filter.contains("[v1]trim=0:7.5,setpts=PTS-STARTPTS[main];"));
        assert!(filter.contains("[v2]trim=7.5:8,setpts=PTS-STARTPTS[fade_out];"));
        assert!(filter.contains("xfade=transition=fade:duration=0.5:offset=0[xf]"));
        assert!(filter.ends_with("[main][xf]concat=n=2:v=1:a=0"));
    }

    #[test]
    fn test_loop_filter_repeats() {
        let filter = build_loop_filter(8.0, 0.5, 3);
        assert!(filter.ends_with("[base];[base]loop=3:1:0"));
    }

    #[test]
    fn test_loop_filter_clamps_fade_start() {
        let filter = build_loop_filter(0.2, 0.5, 1);
        assert!(filter.contains("[v1]trim=0:0,"));
    }

    #[test]
    fn test_suffixed_keeps_extension() {
        assert_eq!(
            suffixed(Path::new("/out/a_animated.mp4"), "bw"),
            PathBuf::from("/out/a_animated_bw.mp4")
        );
        assert_eq!(suffixed(Path::new("clip"), "loop"), PathBuf::from("clip_loop"));
    }

    #[test]
    fn test_bw_filters_desaturate() {
        for method in [BwMethod::Grayscale, BwMethod::HighContrast, BwMethod::Vintage] {
            assert!(bw_video_filter(method).starts_with("hue=s=0"));
        }
    }

    #[tokio::test]
    async fn test_missing_input_is_not_found() {
        let err = create_looping_video(Path::new("/nonexistent/clip.mp4"), None, 0.5, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, PostProcessError::NotFound(_)));

        let err = probe_duration(Path::new("/nonexistent/clip.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, PostProcessError::NotFound(_)));
    }
}
