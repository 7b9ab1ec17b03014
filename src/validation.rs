//! Input image checks run before any backend is contacted.

use std::path::{Path, PathBuf};

use crate::error::GenerationError;

/// Image extensions accepted by both backends.
pub const SUPPORTED_FORMATS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Upload limit of the cloud backend.
pub const CLOUD_MAX_IMAGE_MB: f64 = 10.0;

/// Size limit of the local backend.
pub const LOCAL_MAX_IMAGE_MB: f64 = 50.0;

/// Check that `path` is an existing, supported image no larger than `max_size_mb`.
pub fn validate_image(path: &Path, max_size_mb: f64) -> Result<PathBuf, GenerationError> {
    if !path.exists() {
        return Err(GenerationError::InvalidInput(format!(
            "Image not found: {}",
            path.display()
        )));
    }

    let metadata = std::fs::metadata(path)?;
    if !metadata.is_file() {
        return Err(GenerationError::InvalidInput(format!(
            "Not a file: {}",
            path.display()
        )));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if !SUPPORTED_FORMATS.contains(&extension.as_str()) {
        return Err(GenerationError::InvalidInput(format!(
            "Unsupported format: .{}. Supported: {}",
            extension,
            SUPPORTED_FORMATS.join(", ")
        )));
    }

    let size_mb = metadata.len() as f64 / (1024.0 * 1024.0);
    if size_mb > max_size_mb {
        return Err(GenerationError::InvalidInput(format!(
            "File too large: {:.2}MB. Maximum: {}MB",
            size_mb, max_size_mb
        )));
    }

    log::debug!("Image validated: {} ({:.2}MB)", path.display(), size_mb);
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, len: usize) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&vec![0u8; len]).unwrap();
        path
    }

    #[test]
    fn test_accepts_supported_image() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "photo.JPG", 1024);
        assert_eq!(validate_image(&path, CLOUD_MAX_IMAGE_MB).unwrap(), path);
    }

    #[test]
    fn test_rejects_missing_file() {
        let err = validate_image(Path::new("/nonexistent/photo.jpg"), CLOUD_MAX_IMAGE_MB)
            .unwrap_err();
        assert!(matches!(err, GenerationError::InvalidInput(msg) if msg.contains("not found")));
    }

    #[test]
    fn test_rejects_directory() {
        let dir = TempDir::new().unwrap();
        let err = validate_image(dir.path(), CLOUD_MAX_IMAGE_MB).unwrap_err();
        assert!(matches!(err, GenerationError::InvalidInput(msg) if msg.contains("Not a file")));
    }

    #[test]
    fn test_rejects_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "photo.gif", 10);
        let err = validate_image(&path, CLOUD_MAX_IMAGE_MB).unwrap_err();
        assert!(matches!(err, GenerationError::InvalidInput(msg) if msg.contains("Unsupported format")));
    }

    #[test]
    fn test_rejects_oversized_file() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "photo.png", 2 * 1024 * 1024);
        let err = validate_image(&path, 1.0).unwrap_err();
        assert!(matches!(err, GenerationError::InvalidInput(msg) if msg.contains("too large")));
        assert!(validate_image(&path, LOCAL_MAX_IMAGE_MB).is_ok());
    }
}
