//! Collaborator-facing settings records.
//!
//! Configuration readers (environment files, batch settings, and the like)
//! live outside this crate and hand over plain value records. The types here
//! are the typed boundary for those records: string-tagged fields are
//! converted into the core's enums, and unrecognized tags are rejected with
//! [`LensError::UnsupportedNoiseKind`] /
//! [`LensError::UnsupportedSpectrumSource`].

use std::path::PathBuf;

use crate::error::LensError;
use crate::noise::NoiseSpec;
use crate::spectrum::SpectrumSource;
use crate::units::{Angle, NoiseLevel};

/// String-tagged noise settings, as produced by configuration readers.
#[derive(Debug, Clone)]
pub struct NoiseConfig {
    /// Noise kind tag: `"white"` or `"detector"`.
    pub kind: String,
    /// Map-noise amplitude in µK·arcmin.
    pub sigma_uk_arcmin: f64,
    /// Beam FWHM in arcminutes (detector noise only).
    pub fwhm_arcmin: f64,
    /// Multipole above which detector noise is truncated to zero.
    pub ellmax: Option<f64>,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            kind: "white".into(),
            sigma_uk_arcmin: 0.1,
            fwhm_arcmin: 0.0,
            ellmax: None,
        }
    }
}

impl TryFrom<&NoiseConfig> for NoiseSpec {
    type Error = LensError;

    fn try_from(cfg: &NoiseConfig) -> Result<Self, LensError> {
        match cfg.kind.as_str() {
            "white" => Ok(NoiseSpec::White {
                sigma: NoiseLevel::from_uk_arcmin(cfg.sigma_uk_arcmin),
            }),
            "detector" => Ok(NoiseSpec::Detector {
                sigma: NoiseLevel::from_uk_arcmin(cfg.sigma_uk_arcmin),
                fwhm: Angle::from_arcmin(cfg.fwhm_arcmin),
                ellmax: cfg.ellmax,
            }),
            other => Err(LensError::UnsupportedNoiseKind(other.to_string())),
        }
    }
}

/// String-tagged spectrum-source settings.
#[derive(Debug, Clone)]
pub struct SpectrumConfig {
    /// Source format tag; currently only `"camb"` is recognized.
    pub format: String,
    /// Path to the tabulated spectrum file.
    pub path: PathBuf,
}

impl TryFrom<&SpectrumConfig> for SpectrumSource {
    type Error = LensError;

    fn try_from(cfg: &SpectrumConfig) -> Result<Self, LensError> {
        match cfg.format.as_str() {
            "camb" => Ok(SpectrumSource::CambFile(cfg.path.clone())),
            other => Err(LensError::UnsupportedSpectrumSource(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn white_noise_config_converts_with_units() {
        let cfg = NoiseConfig {
            kind: "white".into(),
            sigma_uk_arcmin: 6.0,
            ..Default::default()
        };
        let spec = NoiseSpec::try_from(&cfg).unwrap();
        match spec {
            NoiseSpec::White { sigma } => {
                assert!((sigma.uk_arcmin() - 6.0).abs() < 1e-12);
            }
            other => panic!("expected white noise, got {other:?}"),
        }
    }

    #[test]
    fn detector_noise_config_converts_with_units() {
        let cfg = NoiseConfig {
            kind: "detector".into(),
            sigma_uk_arcmin: 1.0,
            fwhm_arcmin: 7.0,
            ellmax: Some(3000.0),
        };
        match NoiseSpec::try_from(&cfg).unwrap() {
            NoiseSpec::Detector { fwhm, ellmax, .. } => {
                assert!((fwhm.arcmin() - 7.0).abs() < 1e-12);
                assert_eq!(ellmax, Some(3000.0));
            }
            other => panic!("expected detector noise, got {other:?}"),
        }
    }

    #[test]
    fn unknown_noise_kind_is_rejected_by_name() {
        let cfg = NoiseConfig {
            kind: "atmospheric".into(),
            ..Default::default()
        };
        let err = NoiseSpec::try_from(&cfg).unwrap_err();
        assert!(err.to_string().contains("atmospheric"));
    }

    #[test]
    fn unknown_spectrum_format_is_rejected_by_name() {
        let cfg = SpectrumConfig {
            format: "class".into(),
            path: "cls.dat".into(),
        };
        let err = SpectrumSource::try_from(&cfg).unwrap_err();
        assert!(err.to_string().contains("class"));
    }
}
