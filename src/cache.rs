//! Incrementally-invalidated cache for the estimation pipeline.

use ndarray::Array2;
use tracing::debug;

use crate::backend::EstimatorBackend;
use crate::error::LensError;
use crate::geometry::Geometry;
use crate::multipole::MultipoleGrid;
use crate::noise::NoiseSpec;
use crate::spectrum::{self, SpectrumIdentity, SpectrumSource};

/// Cached derived state for the quadratic-estimator pipeline.
///
/// Rebuild rules:
/// - the multipole grid is rebuilt iff the geometry differs (by value) from
///   the stored one;
/// - the spectrum projections are rebuilt iff the grid was just rebuilt or
///   either spectrum identity differs from what is stored;
/// - the normalization is rebuilt iff the projections were just rebuilt.
///
/// Each pipeline owns its own cache instance; there is no process-wide
/// shared state and no internal locking. The rebuild counters exist so that
/// callers (and tests) can observe that unchanged inputs skip the expensive
/// paths.
#[derive(Debug)]
pub struct EstimationCache {
    geometry: Option<Geometry>,
    multipole: Option<MultipoleGrid>,

    th_identity: Option<SpectrumIdentity>,
    /// Stored observed identity; `None` while the observed projection is
    /// derived from the theoretical curve.
    obs_identity: Option<SpectrumIdentity>,
    spectra_valid: bool,

    cl_th: Vec<f64>,
    power_th: Array2<f64>,
    power_obs: Array2<f64>,
    inv_power_obs: Array2<f64>,
    norm: Array2<f64>,

    grid_builds: u64,
    spectra_builds: u64,
    norm_builds: u64,
}

impl Default for EstimationCache {
    fn default() -> Self {
        Self::new()
    }
}

impl EstimationCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            geometry: None,
            multipole: None,
            th_identity: None,
            obs_identity: None,
            spectra_valid: false,
            cl_th: Vec::new(),
            power_th: Array2::zeros((0, 0)),
            power_obs: Array2::zeros((0, 0)),
            inv_power_obs: Array2::zeros((0, 0)),
            norm: Array2::zeros((0, 0)),
            grid_builds: 0,
            spectra_builds: 0,
            norm_builds: 0,
        }
    }

    /// Drop all cached state, returning to the freshly-constructed state.
    /// The rebuild counters are reset as well.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Geometry the cached grids were built for, if any.
    pub fn geometry(&self) -> Option<&Geometry> {
        self.geometry.as_ref()
    }

    /// Cached multipole grid, if built.
    pub fn multipole(&self) -> Option<&MultipoleGrid> {
        self.multipole.as_ref()
    }

    /// Cached 1D theoretical TT curve.
    pub fn theoretical_curve(&self) -> &[f64] {
        &self.cl_th
    }

    /// Theoretical spectrum projected onto the multipole grid.
    pub fn theoretical_power(&self) -> &Array2<f64> {
        &self.power_th
    }

    /// Observed (noise-inclusive) spectrum projected onto the grid.
    pub fn observed_power(&self) -> &Array2<f64> {
        &self.power_obs
    }

    /// Reciprocal of the observed spectrum: the inverse-variance filter.
    pub fn inverse_observed_power(&self) -> &Array2<f64> {
        &self.inv_power_obs
    }

    /// Estimator normalization grid (DC entry forced to 1).
    pub fn normalization(&self) -> &Array2<f64> {
        &self.norm
    }

    pub fn grid_builds(&self) -> u64 {
        self.grid_builds
    }

    pub fn spectra_builds(&self) -> u64 {
        self.spectra_builds
    }

    pub fn norm_builds(&self) -> u64 {
        self.norm_builds
    }

    /// Ensure the multipole grid matches `geometry`.
    ///
    /// Returns `true` if the grid was rebuilt. An unchanged geometry is an
    /// idempotent no-op that does not touch the frequency arrays.
    pub fn ensure_grid(&mut self, geometry: Geometry) -> bool {
        if self.geometry == Some(geometry) {
            return false;
        }
        debug!(
            "rebuilding multipole grid: {}x{} pixels over {:.3} deg",
            geometry.npixel,
            geometry.npixel,
            geometry.angle.degrees()
        );
        self.multipole = Some(MultipoleGrid::build(&geometry));
        self.geometry = Some(geometry);
        self.spectra_valid = false;
        self.grid_builds += 1;
        true
    }

    /// Ensure the spectrum projections match `geometry` and the given source
    /// identities.
    ///
    /// Resolves the curves through the backend's loader, projects them onto
    /// the multipole grid, adds the noise power to the observed projection,
    /// and caches the inverse-variance filter. When the observed source is
    /// absent the observed curve equals the theoretical curve by value.
    ///
    /// Returns `true` if a rebuild happened; a call with unchanged geometry
    /// and identities is a no-op. Note that the noise spec is *not* part of
    /// the invalidation key.
    pub fn ensure_spectra(
        &mut self,
        backend: &dyn EstimatorBackend,
        geometry: Geometry,
        theoretical: &SpectrumSource,
        observed: Option<&SpectrumSource>,
        noise: Option<&NoiseSpec>,
    ) -> Result<bool, LensError> {
        let grid_rebuilt = self.ensure_grid(geometry);

        let th_id = theoretical.identity();
        let obs_id = observed.map(SpectrumSource::identity);
        if !grid_rebuilt
            && self.spectra_valid
            && self.th_identity.as_ref() == Some(&th_id)
            && self.obs_identity == obs_id
        {
            return Ok(false);
        }

        let th = backend.load_power_spectrum(theoretical)?;
        let obs_cl = match observed {
            Some(source) => backend.load_power_spectrum(source)?.cl,
            None => th.cl.clone(),
        };

        let Some(grid) = self.multipole.as_ref() else {
            unreachable!("ensure_grid always builds the multipole grid");
        };
        let power_th = spectrum::project_onto_grid(&th.cl, grid.ell());
        let mut power_obs = spectrum::project_onto_grid(&obs_cl, grid.ell());
        if let Some(spec) = noise {
            power_obs += &spec.power(grid.ell());
        }
        let inv_power_obs = power_obs.mapv(f64::recip);

        debug!(
            "rebuilt spectrum projections for theoretical '{}' (observed: {})",
            th_id,
            obs_id
                .as_ref()
                .map(|id| id.as_str())
                .unwrap_or("derived from theoretical")
        );

        self.cl_th = th.cl;
        self.power_th = power_th;
        self.power_obs = power_obs;
        self.inv_power_obs = inv_power_obs;
        self.th_identity = Some(th_id);
        self.obs_identity = obs_id;
        self.spectra_valid = true;
        self.spectra_builds += 1;
        Ok(true)
    }

    /// Recompute the normalization grid for the cached filter and
    /// theoretical curve, forcing the DC entry to 1.
    ///
    /// The pipeline invokes this only when [`Self::ensure_spectra`] reported
    /// a rebuild, so across repeated calls with unchanged inputs the
    /// normalization is computed at most once.
    pub fn rebuild_normalization(&mut self, backend: &dyn EstimatorBackend) {
        let Some(geometry) = self.geometry else {
            unreachable!("normalization is only rebuilt after ensure_spectra");
        };
        let mut norm =
            backend.compute_normalization(&self.inv_power_obs, geometry.resolution(), &self.cl_th);
        norm[[0, 0]] = 1.0;
        self.norm = norm;
        self.norm_builds += 1;
    }
}
