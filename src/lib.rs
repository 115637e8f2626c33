//! # cmblens
//!
//! Flat-sky **CMB lensing** utilities: quadratic-estimator reconstruction of
//! the lensing potential from temperature maps, and forward lensing of
//! unlensed maps through a convergence field.
//!
//! Given a Fourier-space temperature map and its geometry, `cmblens`
//! interpolates theoretical/observed power spectra and an instrument-noise
//! model onto the map's multipole grid, applies an inverse-variance filter,
//! and evaluates the quadratic TT estimator together with its normalization.
//! Every derived quantity (multipole grid, spectrum projections, filter,
//! normalization) is cached and rebuilt incrementally as inputs change, so
//! batch pipelines that process many maps with one configuration pay the
//! expensive setup once.
//!
//! ## Features
//!
//! - **Quadratic TT estimator** — normalized potential reconstruction from
//!   inverse-variance-filtered maps
//! - **Incremental caching** — grids, projections, and the estimator response
//!   invalidate independently (geometry, spectrum identities, filter)
//! - **Noise models** — white and beam-deconvolved detector noise with
//!   unit-aware amplitudes (µK·arcmin / arcmin)
//! - **Forward lensing** — remap an unlensed map through a convergence field
//!   via the flat-sky Poisson relation
//! - **Pluggable backends** — the spectral backend is a capability trait;
//!   the built-in FFT implementation lives behind the default `flatsky`
//!   feature
//!
//! ## Example
//!
//! ```no_run
//! use cmblens::{
//!     Angle, BackendKind, Geometry, NoiseConfig, NoiseSpec, Reconstruction, SpectrumSource,
//! };
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let mut pipeline = Reconstruction::new(BackendKind::FlatSky).unwrap();
//!
//! // Geometry and inputs
//! let geometry = Geometry::new(Angle::from_degrees(1.6), 128);
//! let spectrum = SpectrumSource::CambFile("data/scalCls.dat".into());
//! let noise = NoiseSpec::try_from(&NoiseConfig::default()).unwrap();
//!
//! // Simulate an unlensed map and recover the (null) potential
//! let mut rng = StdRng::seed_from_u64(1);
//! let tfft = pipeline
//!     .generate_temperature_map(geometry, &spectrum, &mut rng)
//!     .unwrap();
//! let phi = pipeline
//!     .estimate_potential(&tfft, geometry, &spectrum, None, Some(&noise))
//!     .unwrap();
//! println!("recovered potential map: {:?}", phi.dim());
//! ```
//!
//! ## Pipeline overview
//!
//! 1. **Multipole grid** — `ell[i,j] = 2π·npixel/angle · sqrt(fx² + fy²)`,
//!    rebuilt only when the geometry changes
//! 2. **Spectrum projection** — 1D `C_l` curves linearly interpolated onto
//!    the 2D grid (zero beyond the tabulated range), plus the noise power
//! 3. **Filtering** — multiply the map by the reciprocal observed power and
//!    the pixel-area Jacobian
//! 4. **Estimation** — backend evaluates the raw quadratic estimate; the
//!    cached response normalizes it (recomputed only after a spectrum
//!    rebuild)

pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod geometry;
pub mod multipole;
pub mod noise;
pub mod reconstruction;
pub mod spectrum;
pub mod units;

#[cfg(feature = "flatsky")]
pub use backend::FlatSkyBackend;
pub use backend::{BackendKind, EstimatorBackend};
pub use cache::EstimationCache;
pub use config::{NoiseConfig, SpectrumConfig};
pub use error::LensError;
pub use geometry::Geometry;
pub use multipole::MultipoleGrid;
pub use noise::NoiseSpec;
pub use reconstruction::Reconstruction;
pub use spectrum::{PowerSpectrum, SpectrumIdentity, SpectrumSource};
pub use units::{Angle, NoiseLevel};

// Commonly used map types. All maps are square 2D arrays; Fourier-space maps
// follow the raw-DFT normalization documented on `EstimatorBackend`.

/// Pixel-space map of a real scalar field (temperature, convergence, ...).
pub type RealMap = ndarray::Array2<f64>;

/// Fourier-space map (raw unnormalized DFT layout, DC mode at `[0, 0]`).
pub type FourierMap = ndarray::Array2<num_complex::Complex64>;
