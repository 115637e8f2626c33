//! Multipole grids for flat-sky Fourier analysis.
//!
//! In the flat-sky approximation each Fourier pixel of an npixel×npixel map
//! corresponds to a 2D wavevector whose magnitude plays the role of the
//! multipole `ell`. The grid is a pure function of the map geometry and is
//! cached by [`crate::EstimationCache`] so that repeated pipeline calls with
//! an unchanged geometry never recompute the frequency arrays.

use std::f64::consts::PI;

use ndarray::Array2;

use crate::geometry::Geometry;

/// DFT sample frequencies for an n-point grid, in cycles per sample.
///
/// Ordering matches the standard FFT layout: non-negative frequencies first,
/// then the negative frequencies.
pub(crate) fn fft_freqs(n: usize) -> Vec<f64> {
    let mut freqs = vec![0.0; n];
    let half = (n - 1) / 2;
    for (k, f) in freqs.iter_mut().enumerate() {
        *f = if k <= half {
            k as f64 / n as f64
        } else {
            (k as f64 - n as f64) / n as f64
        };
    }
    freqs
}

/// 2D multipole-magnitude grid derived from a map geometry.
///
/// `ell[i, j] = 2π·npixel/angle_rad · sqrt(f_i² + f_j²)` with `f` the DFT
/// frequencies. The zero-frequency entry of the *squared* grid is forced to
/// 1.0 before the square root is taken, so `ell` and `ell²` can safely appear
/// in denominators; the DC entry carries no physical meaning and must be
/// excluded (or overwritten) by anything that divides by it.
#[derive(Debug, Clone)]
pub struct MultipoleGrid {
    ell: Array2<f64>,
    ell2: Array2<f64>,
}

impl MultipoleGrid {
    /// Build the grid for the given geometry.
    pub fn build(geometry: &Geometry) -> Self {
        let n = geometry.npixel;
        let scale = 2.0 * PI * n as f64 / geometry.angle.radians();
        let freqs = fft_freqs(n);

        let mut ell2 = Array2::zeros((n, n));
        for ((i, j), v) in ell2.indexed_iter_mut() {
            *v = (freqs[i] * freqs[i] + freqs[j] * freqs[j]) * scale * scale;
        }
        ell2[[0, 0]] = 1.0;

        let ell = ell2.mapv(f64::sqrt);
        Self { ell, ell2 }
    }

    /// Multipole magnitude per Fourier pixel.
    pub fn ell(&self) -> &Array2<f64> {
        &self.ell
    }

    /// Squared multipole magnitude per Fourier pixel (DC entry forced to 1).
    pub fn ell_squared(&self) -> &Array2<f64> {
        &self.ell2
    }

    /// Pixels per side of the underlying map.
    pub fn npixel(&self) -> usize {
        self.ell.nrows()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::Angle;
    use approx::assert_relative_eq;

    #[test]
    fn fft_freqs_even_and_odd() {
        assert_eq!(fft_freqs(4), vec![0.0, 0.25, -0.5, -0.25]);
        assert_eq!(fft_freqs(5), vec![0.0, 0.2, 0.4, -0.4, -0.2]);
    }

    #[test]
    fn dc_entry_is_one() {
        let grid = MultipoleGrid::build(&Geometry::new(Angle::from_degrees(1.6), 128));
        assert_eq!(grid.ell_squared()[[0, 0]], 1.0);
        assert_eq!(grid.ell()[[0, 0]], 1.0);
    }

    #[test]
    fn fundamental_mode_matches_patch_size() {
        // The first non-zero mode along an axis is ell = 2π/angle.
        let angle = Angle::from_degrees(2.0);
        let grid = MultipoleGrid::build(&Geometry::new(angle, 64));
        assert_relative_eq!(grid.ell()[[1, 0]], 2.0 * PI / angle.radians(), max_relative = 1e-12);
        assert_relative_eq!(grid.ell()[[0, 1]], 2.0 * PI / angle.radians(), max_relative = 1e-12);
    }

    #[test]
    fn grid_is_symmetric_under_frequency_negation() {
        let grid = MultipoleGrid::build(&Geometry::new(Angle::from_degrees(1.0), 16));
        let ell = grid.ell();
        for i in 1..16 {
            for j in 1..16 {
                assert_relative_eq!(ell[[i, j]], ell[[16 - i, 16 - j]]);
            }
        }
    }
}
