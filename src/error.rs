//! Error taxonomy for the lensing pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::backend::BackendKind;

/// Errors surfaced by the reconstruction pipeline.
///
/// All of these are reported immediately to the caller; nothing is retried or
/// silently downgraded.
#[derive(Debug, Error)]
pub enum LensError {
    /// The requested estimator/lensing backend is not compiled into this
    /// build. Raised at construction time, never deferred to first use.
    #[error("estimator backend '{0}' is not available in this build")]
    BackendUnavailable(BackendKind),

    /// A configuration record carried a noise kind tag the core does not
    /// recognize.
    #[error("unsupported noise kind '{0}': choose (white/detector)")]
    UnsupportedNoiseKind(String),

    /// A configuration record carried a spectrum source tag the loader does
    /// not recognize.
    #[error("unsupported spectrum source '{0}': choose (camb)")]
    UnsupportedSpectrumSource(String),

    /// A caller-supplied map does not match its declared geometry.
    #[error("map shape {actual:?} does not match geometry shape {expected:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// A spectrum file could not be read or parsed.
    #[error("failed to load power spectrum from {path}")]
    SpectrumLoad {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}
