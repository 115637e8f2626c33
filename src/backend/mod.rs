//! Spectral backend capability: spectrum loading, quadratic-estimator
//! evaluation, response computation, map transforms, and lensing.
//!
//! The estimation core delegates every FFT-shaped operation to a backend
//! implementing [`EstimatorBackend`]. Backends are optional capabilities:
//! the built-in flat-sky backend is compiled in through the default `flatsky`
//! cargo feature, and selecting a backend that is not present in the build
//! fails at construction time with [`LensError::BackendUnavailable`].

#[cfg(feature = "flatsky")]
mod flatsky;

#[cfg(feature = "flatsky")]
pub use flatsky::FlatSkyBackend;

use std::fmt;

use ndarray::Array2;
use rand::RngCore;

use crate::error::LensError;
use crate::spectrum::{PowerSpectrum, SpectrumSource};
use crate::{FourierMap, RealMap};

/// Capability contract for an estimator/lensing backend.
///
/// Fourier-space maps follow the crate-wide convention: a raw unnormalized
/// forward DFT of the pixel map, promoted to continuum normalization by the
/// `resolution²` pixel-area Jacobian where the pipeline needs it.
pub trait EstimatorBackend {
    /// Resolve a spectrum source to a 1D TT curve plus its identity token.
    fn load_power_spectrum(&self, source: &SpectrumSource) -> Result<PowerSpectrum, LensError>;

    /// Evaluate the raw (unnormalized) quadratic potential estimate from an
    /// inverse-variance-filtered Fourier-space temperature map and the
    /// theoretical TT curve.
    fn evaluate_quadratic_estimator(
        &self,
        filtered: &FourierMap,
        resolution: f64,
        cl_th: &[f64],
    ) -> FourierMap;

    /// Compute the estimator response (normalization) grid for the given
    /// inverse-variance filter and theoretical TT curve.
    fn compute_normalization(
        &self,
        filter: &Array2<f64>,
        resolution: f64,
        cl_th: &[f64],
    ) -> Array2<f64>;

    /// Forward-transform a pixel-space map to Fourier space with the
    /// continuum normalization (`resolution² · DFT`).
    fn fourier_transform_map(&self, map: &RealMap, resolution: f64) -> FourierMap;

    /// Remap an unlensed pixel-space map through the deflection field of the
    /// given Fourier-space lensing potential. The potential may live on a
    /// different geometry than the temperature map; the backend regrids.
    fn lens_map(
        &self,
        unlensed: &RealMap,
        resolution_t: f64,
        phi_fft: &FourierMap,
        resolution_phi: f64,
    ) -> RealMap;

    /// Draw a Gaussian realization of the given 2D power grid, returning the
    /// Fourier-space temperature map.
    fn simulate_temperature_map(
        &self,
        power: &Array2<f64>,
        resolution: f64,
        rng: &mut dyn RngCore,
    ) -> FourierMap;
}

/// Known backend implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum BackendKind {
    /// Built-in FFT flat-sky backend (cargo feature `flatsky`).
    FlatSky,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::FlatSky => f.write_str("flatsky"),
        }
    }
}

impl BackendKind {
    /// Whether this backend is compiled into the current build.
    pub fn is_available(&self) -> bool {
        match self {
            BackendKind::FlatSky => cfg!(feature = "flatsky"),
        }
    }

    /// Instantiate the backend, failing fast if it is not available.
    pub fn instantiate(&self) -> Result<Box<dyn EstimatorBackend>, LensError> {
        match self {
            #[cfg(feature = "flatsky")]
            BackendKind::FlatSky => Ok(Box::new(FlatSkyBackend::new())),
            #[cfg(not(feature = "flatsky"))]
            BackendKind::FlatSky => Err(LensError::BackendUnavailable(*self)),
        }
    }
}
