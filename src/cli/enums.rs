//! CLI enum types for backend, photo type, intensity and B&W method options.

use clap::ValueEnum;

use crate::generator::Backend;
use crate::postprocess::BwMethod;
use crate::prompt::{Intensity, PhotoType};

/// Generation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum BackendArg {
    #[default]
    Auto,
    #[value(alias = "veo")]
    Cloud,
    #[value(alias = "svd")]
    Local,
}

impl From<BackendArg> for Backend {
    fn from(b: BackendArg) -> Self {
        match b {
            BackendArg::Auto => Backend::Auto,
            BackendArg::Cloud => Backend::Cloud,
            BackendArg::Local => Backend::Local,
        }
    }
}

/// Kind of photograph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum PhotoTypeArg {
    #[default]
    Portrait,
    Group,
    Landscape,
    Pet,
    Formal,
}

impl From<PhotoTypeArg> for PhotoType {
    fn from(p: PhotoTypeArg) -> Self {
        match p {
            PhotoTypeArg::Portrait => PhotoType::Portrait,
            PhotoTypeArg::Group => PhotoType::Group,
            PhotoTypeArg::Landscape => PhotoType::Landscape,
            PhotoTypeArg::Pet => PhotoType::Pet,
            PhotoTypeArg::Formal => PhotoType::Formal,
        }
    }
}

/// Animation intensity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum IntensityArg {
    #[default]
    Subtle,
    Moderate,
    Dramatic,
}

impl From<IntensityArg> for Intensity {
    fn from(i: IntensityArg) -> Self {
        match i {
            IntensityArg::Subtle => Intensity::Subtle,
            IntensityArg::Moderate => Intensity::Moderate,
            IntensityArg::Dramatic => Intensity::Dramatic,
        }
    }
}

/// Black & white conversion method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum BwMethodArg {
    Grayscale,
    #[default]
    #[value(alias = "high_contrast")]
    HighContrast,
    Vintage,
}

impl From<BwMethodArg> for BwMethod {
    fn from(m: BwMethodArg) -> Self {
        match m {
            BwMethodArg::Grayscale => BwMethod::Grayscale,
            BwMethodArg::HighContrast => BwMethod::HighContrast,
            BwMethodArg::Vintage => BwMethod::Vintage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_arg_to_backend() {
        assert_eq!(Backend::from(BackendArg::Auto), Backend::Auto);
        assert_eq!(Backend::from(BackendArg::Cloud), Backend::Cloud);
        assert_eq!(Backend::from(BackendArg::Local), Backend::Local);
    }

    #[test]
    fn test_backend_aliases() {
        assert_eq!(BackendArg::from_str("veo", true), Ok(BackendArg::Cloud));
        assert_eq!(BackendArg::from_str("svd", true), Ok(BackendArg::Local));
    }

    #[test]
    fn test_photo_type_arg_to_photo_type() {
        assert_eq!(PhotoType::from(PhotoTypeArg::Group), PhotoType::Group);
        assert_eq!(PhotoType::from(PhotoTypeArg::Pet), PhotoType::Pet);
        assert_eq!(PhotoType::from(PhotoTypeArg::Formal), PhotoType::Formal);
    }

    #[test]
    fn test_intensity_arg_to_intensity() {
        assert_eq!(Intensity::from(IntensityArg::Subtle), Intensity::Subtle);
        assert_eq!(Intensity::from(IntensityArg::Dramatic), Intensity::Dramatic);
    }

    #[test]
    fn test_bw_method_accepts_underscore_spelling() {
        assert_eq!(
            BwMethodArg::from_str("high_contrast", true),
            Ok(BwMethodArg::HighContrast)
        );
        assert_eq!(
            BwMethod::from(BwMethodArg::Vintage),
            BwMethod::Vintage
        );
    }
}
