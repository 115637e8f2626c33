//! High-level lensing-reconstruction pipeline.

use num_complex::Complex64;
use rand::RngCore;
use tracing::debug;

use crate::backend::{BackendKind, EstimatorBackend};
use crate::cache::EstimationCache;
use crate::error::LensError;
use crate::geometry::Geometry;
use crate::noise::NoiseSpec;
use crate::spectrum::SpectrumSource;
use crate::units::Angle;
use crate::{FourierMap, RealMap};

/// Lensing-potential reconstruction and forward-lensing pipeline.
///
/// Owns the estimator backend (selected at construction) and an
/// [`EstimationCache`] that is rebuilt incrementally as the geometry, the
/// spectrum identities, or the filter change. The design assumes a single
/// logical caller drives each pipeline instance to completion before another
/// begins; give each pipeline its own instance for concurrent use.
pub struct Reconstruction {
    backend: Box<dyn EstimatorBackend>,
    cache: EstimationCache,
}

impl Reconstruction {
    /// Construct over the given backend kind.
    ///
    /// Fails fast with [`LensError::BackendUnavailable`] if the backend is
    /// not compiled into this build.
    pub fn new(kind: BackendKind) -> Result<Self, LensError> {
        Ok(Self::with_backend(kind.instantiate()?))
    }

    /// Construct over a caller-supplied backend implementation.
    pub fn with_backend(backend: Box<dyn EstimatorBackend>) -> Self {
        Self {
            backend,
            cache: EstimationCache::new(),
        }
    }

    /// Read access to the cache (rebuild counters, cached projections).
    pub fn cache(&self) -> &EstimationCache {
        &self.cache
    }

    /// Drop all cached state.
    pub fn reset_cache(&mut self) {
        self.cache.reset();
    }

    /// Estimate the lensing potential from a Fourier-space temperature map
    /// with the quadratic TT estimator.
    ///
    /// `tfft` is the raw forward DFT of the observed pixel map and must match
    /// `geometry`. The map is inverse-variance filtered with the cached
    /// observed spectrum (times the `resolution²` pixel-area Jacobian), the
    /// backend evaluates the raw quadratic estimate, and the cached response
    /// normalizes it. Returns the normalized potential in Fourier space.
    ///
    /// Repeated calls with unchanged geometry and spectrum identities reuse
    /// every cached stage; in particular the normalization is computed only
    /// on the first such call.
    pub fn estimate_potential(
        &mut self,
        tfft: &FourierMap,
        geometry: Geometry,
        theoretical: &SpectrumSource,
        observed: Option<&SpectrumSource>,
        noise: Option<&NoiseSpec>,
    ) -> Result<FourierMap, LensError> {
        check_shape(tfft.dim(), geometry.shape())?;

        let rebuilt = self.cache.ensure_spectra(
            self.backend.as_ref(),
            geometry,
            theoretical,
            observed,
            noise,
        )?;

        let resolution = geometry.resolution();
        let jacobian = resolution * resolution;
        let filter = self.cache.inverse_observed_power();
        let mut filtered = tfft.clone();
        for ((i, j), v) in filtered.indexed_iter_mut() {
            *v *= filter[[i, j]] * jacobian;
        }

        let raw = self.backend.evaluate_quadratic_estimator(
            &filtered,
            resolution,
            self.cache.theoretical_curve(),
        );

        if rebuilt {
            self.cache.rebuild_normalization(self.backend.as_ref());
        }

        let norm = self.cache.normalization();
        let mut phi = raw;
        for ((i, j), v) in phi.indexed_iter_mut() {
            *v /= norm[[i, j]];
        }
        Ok(phi)
    }

    /// Lens an unlensed temperature map through a convergence field.
    ///
    /// The convergence is converted to a lensing potential via the flat-sky
    /// Poisson relation `phi = 2·kappa / ell²` on the convergence map's own
    /// multipole grid (built through the cache if not current); the DC mode
    /// is excluded per the grid invariant. The two maps need not share a
    /// geometry; the backend handles the regridding. Returns the lensed
    /// pixel-space map.
    pub fn lens_temperature_map(
        &mut self,
        unlensed: &RealMap,
        angle_t: Angle,
        kappa: &RealMap,
        angle_kappa: Angle,
    ) -> Result<RealMap, LensError> {
        let geom_t = Geometry::new(angle_t, unlensed.nrows());
        let geom_kappa = Geometry::new(angle_kappa, kappa.nrows());
        check_shape(unlensed.dim(), geom_t.shape())?;
        check_shape(kappa.dim(), geom_kappa.shape())?;

        self.cache.ensure_grid(geom_kappa);
        let Some(grid) = self.cache.multipole() else {
            unreachable!("ensure_grid always builds the multipole grid");
        };

        let kappa_fft = self
            .backend
            .fourier_transform_map(kappa, geom_kappa.resolution());
        let ell2 = grid.ell_squared();
        let mut phi_fft = kappa_fft;
        for ((i, j), v) in phi_fft.indexed_iter_mut() {
            *v *= Complex64::from(2.0 / ell2[[i, j]]);
        }
        debug!(
            "lensing a {}px map through a {}px convergence field",
            geom_t.npixel, geom_kappa.npixel
        );

        Ok(self.backend.lens_map(
            unlensed,
            geom_t.resolution(),
            &phi_fft,
            geom_kappa.resolution(),
        ))
    }

    /// Draw a Gaussian realization of the theoretical TT spectrum on the
    /// given geometry, returning the Fourier-space temperature map.
    ///
    /// The spectrum is resolved and projected through the cache, so repeated
    /// realizations on the same geometry/spectrum are cheap.
    pub fn generate_temperature_map(
        &mut self,
        geometry: Geometry,
        theoretical: &SpectrumSource,
        rng: &mut dyn RngCore,
    ) -> Result<FourierMap, LensError> {
        self.cache
            .ensure_spectra(self.backend.as_ref(), geometry, theoretical, None, None)?;
        Ok(self.backend.simulate_temperature_map(
            self.cache.theoretical_power(),
            geometry.resolution(),
            rng,
        ))
    }
}

fn check_shape(actual: (usize, usize), expected: (usize, usize)) -> Result<(), LensError> {
    if actual != expected {
        return Err(LensError::ShapeMismatch { expected, actual });
    }
    Ok(())
}
