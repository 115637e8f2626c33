//! Built-in flat-sky spectral backend.
//!
//! Implements the TT quadratic estimator and its response, Gaussian map
//! simulation, and temperature-map lensing with ordinary 2D FFTs. Mode
//! products are formed on the unpadded grid, so coupling beyond the Nyquist
//! band aliases instead of being zero-padded away; the response is computed
//! with the same convention, which is what keeps the normalized estimator
//! unbiased.
//!
//! # Fourier conventions
//!
//! Forward transforms approximate the continuum transform,
//! `T(l) = dx² Σ_x T(x) e^{-il·x}`, and inverses carry the matching
//! `1/(N² dx²)`. With these factors the continuum convolution
//! `∫ d²l/(2π)² A(l) B(L−l)` is exactly `fwd(inv(A)·inv(B))`, which is how
//! the estimator and its response are evaluated below. Maps handed across
//! the backend boundary are raw unnormalized DFTs; the pipeline applies the
//! `resolution²` Jacobian where continuum normalization is needed.

use std::f64::consts::PI;

use ndarray::Array2;
use num_complex::Complex64;
use rand::RngCore;
use rand_distr::{Distribution, StandardNormal};
use rustfft::FftPlanner;
use tracing::debug;

use super::EstimatorBackend;
use crate::error::LensError;
use crate::multipole::fft_freqs;
use crate::spectrum::{self, PowerSpectrum, SpectrumSource};
use crate::{FourierMap, RealMap};

/// FFT-based flat-sky estimator/lensing backend.
#[derive(Debug, Default)]
pub struct FlatSkyBackend;

impl FlatSkyBackend {
    pub fn new() -> Self {
        Self
    }
}

// ── FFT helpers ─────────────────────────────────────────────────────────────

/// Unnormalized 2D DFT (row pass then column pass).
fn dft2(map: &Array2<Complex64>, inverse: bool) -> Array2<Complex64> {
    let (n0, n1) = map.dim();
    let mut planner = FftPlanner::<f64>::new();
    let fft_rows = if inverse {
        planner.plan_fft_inverse(n1)
    } else {
        planner.plan_fft_forward(n1)
    };
    let fft_cols = if inverse {
        planner.plan_fft_inverse(n0)
    } else {
        planner.plan_fft_forward(n0)
    };

    let mut out = map.clone();
    for mut row in out.rows_mut() {
        let mut buf: Vec<Complex64> = row.iter().copied().collect();
        fft_rows.process(&mut buf);
        for (dst, src) in row.iter_mut().zip(buf) {
            *dst = src;
        }
    }
    for mut col in out.columns_mut() {
        let mut buf: Vec<Complex64> = col.iter().copied().collect();
        fft_cols.process(&mut buf);
        for (dst, src) in col.iter_mut().zip(buf) {
            *dst = src;
        }
    }
    out
}

/// Forward transform with the continuum normalization `dx² · DFT`.
fn fwd(map: &Array2<Complex64>, dx: f64) -> Array2<Complex64> {
    let mut out = dft2(map, false);
    let area = Complex64::from(dx * dx);
    out.mapv_inplace(|v| v * area);
    out
}

/// Inverse transform: `Σ_l X(l) e^{il·x} / (N² dx²)`.
fn inv(map: &Array2<Complex64>, dx: f64) -> Array2<Complex64> {
    let (n0, n1) = map.dim();
    let mut out = dft2(map, true);
    let norm = Complex64::from(1.0 / ((n0 * n1) as f64 * dx * dx));
    out.mapv_inplace(|v| v * norm);
    out
}

/// Signed multipole components per axis and the magnitude grid.
fn ell_grid(n: usize, dx: f64) -> (Vec<f64>, Array2<f64>) {
    let lv: Vec<f64> = fft_freqs(n).iter().map(|f| 2.0 * PI * f / dx).collect();
    let mut ell = Array2::zeros((n, n));
    for ((i, j), v) in ell.indexed_iter_mut() {
        *v = (lv[i] * lv[i] + lv[j] * lv[j]).sqrt();
    }
    (lv, ell)
}

// ── Periodic interpolation ──────────────────────────────────────────────────

fn wrap(idx: isize, n: usize) -> usize {
    idx.rem_euclid(n as isize) as usize
}

fn bilinear_periodic(map: &Array2<f64>, x: f64, y: f64) -> f64 {
    let (n0, n1) = map.dim();
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let i0 = wrap(x0 as isize, n0);
    let i1 = (i0 + 1) % n0;
    let j0 = wrap(y0 as isize, n1);
    let j1 = (j0 + 1) % n1;
    map[[i0, j0]] * (1.0 - fx) * (1.0 - fy)
        + map[[i1, j0]] * fx * (1.0 - fy)
        + map[[i0, j1]] * (1.0 - fx) * fy
        + map[[i1, j1]] * fx * fy
}

fn catmull_rom(p: [f64; 4], t: f64) -> f64 {
    0.5 * (2.0 * p[1]
        + (-p[0] + p[2]) * t
        + (2.0 * p[0] - 5.0 * p[1] + 4.0 * p[2] - p[3]) * t * t
        + (-p[0] + 3.0 * p[1] - 3.0 * p[2] + p[3]) * t * t * t)
}

/// Catmull-Rom bicubic sample with periodic wrapping. Exact at grid points.
fn bicubic_periodic(map: &Array2<f64>, x: f64, y: f64) -> f64 {
    let (n0, n1) = map.dim();
    let x0 = x.floor() as isize;
    let y0 = y.floor() as isize;
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let mut col = [0.0; 4];
    for (a, c) in col.iter_mut().enumerate() {
        let i = wrap(x0 + a as isize - 1, n0);
        let row = [
            map[[i, wrap(y0 - 1, n1)]],
            map[[i, wrap(y0, n1)]],
            map[[i, wrap(y0 + 1, n1)]],
            map[[i, wrap(y0 + 2, n1)]],
        ];
        *c = catmull_rom(row, fy);
    }
    catmull_rom(col, fx)
}

// ── Backend implementation ──────────────────────────────────────────────────

impl EstimatorBackend for FlatSkyBackend {
    fn load_power_spectrum(&self, source: &SpectrumSource) -> Result<PowerSpectrum, LensError> {
        match source {
            SpectrumSource::CambFile(path) => {
                let cl = spectrum::load_camb_cltt(path).map_err(|e| LensError::SpectrumLoad {
                    path: path.clone(),
                    source: e,
                })?;
                debug!("loaded CAMB spectrum ({} multipoles) from {}", cl.len(), path.display());
                Ok(PowerSpectrum {
                    cl,
                    identity: source.identity(),
                })
            }
            SpectrumSource::Tabulated { cl, .. } => Ok(PowerSpectrum {
                cl: cl.clone(),
                identity: source.identity(),
            }),
        }
    }

    fn evaluate_quadratic_estimator(
        &self,
        filtered: &FourierMap,
        resolution: f64,
        cl_th: &[f64],
    ) -> FourierMap {
        let n = filtered.nrows();
        let dx = resolution;
        let (lv, ell) = ell_grid(n, dx);
        let cth = spectrum::project_onto_grid(cl_th, &ell);

        // phibar(L) = 2 Σ_i L_i ∫ d²l/(2π)² [l_i C_l t(l)] t(L−l),
        // evaluated as real-space products of the two filtered legs.
        let t_real = inv(filtered, dx);
        let mut phibar = Array2::<Complex64>::zeros((n, n));
        for axis in 0..2 {
            let mut leg = filtered.clone();
            for ((i, j), v) in leg.indexed_iter_mut() {
                let li = if axis == 0 { lv[i] } else { lv[j] };
                *v *= li * cth[[i, j]];
            }
            let leg_real = inv(&leg, dx);
            let conv = fwd(&(&t_real * &leg_real), dx);
            for ((i, j), v) in phibar.indexed_iter_mut() {
                let li = if axis == 0 { lv[i] } else { lv[j] };
                *v += 2.0 * li * conv[[i, j]];
            }
        }
        phibar
    }

    fn compute_normalization(
        &self,
        filter: &Array2<f64>,
        resolution: f64,
        cl_th: &[f64],
    ) -> Array2<f64> {
        let n = filter.nrows();
        let dx = resolution;
        let (lv, ell) = ell_grid(n, dx);
        let cth = spectrum::project_onto_grid(cl_th, &ell);
        debug!("computing estimator response on a {n}x{n} grid");

        let f_cplx = filter.mapv(|v| Complex64::new(v, 0.0));
        let f_real = inv(&f_cplx, dx);

        // First-order legs: inv(l_i · C · F).
        let mut c_legs = Vec::with_capacity(2);
        for axis in 0..2 {
            let mut leg = f_cplx.clone();
            for ((i, j), v) in leg.indexed_iter_mut() {
                let li = if axis == 0 { lv[i] } else { lv[j] };
                *v *= li * cth[[i, j]];
            }
            c_legs.push(inv(&leg, dx));
        }

        // R(L) = 2 Σ_ij L_i L_j [ ∫ (l_i l_j C² F)(l) F(L−l)
        //                        + ∫ (l_i C F)(l) (l_j C F)(L−l) ] d²l/(2π)²
        let mut resp = Array2::<f64>::zeros((n, n));
        for ai in 0..2 {
            for aj in 0..2 {
                let mut qleg = f_cplx.clone();
                for ((i, j), v) in qleg.indexed_iter_mut() {
                    let li = if ai == 0 { lv[i] } else { lv[j] };
                    let lj = if aj == 0 { lv[i] } else { lv[j] };
                    let c = cth[[i, j]];
                    *v *= li * lj * c * c;
                }
                let t1 = fwd(&(&inv(&qleg, dx) * &f_real), dx);
                let t2 = fwd(&(&c_legs[ai] * &c_legs[aj]), dx);
                for ((i, j), v) in resp.indexed_iter_mut() {
                    let li = if ai == 0 { lv[i] } else { lv[j] };
                    let lj = if aj == 0 { lv[i] } else { lv[j] };
                    *v += 2.0 * li * lj * (t1[[i, j]].re + t2[[i, j]].re);
                }
            }
        }
        resp
    }

    fn fourier_transform_map(&self, map: &RealMap, resolution: f64) -> FourierMap {
        let cplx = map.mapv(|v| Complex64::new(v, 0.0));
        fwd(&cplx, resolution)
    }

    fn lens_map(
        &self,
        unlensed: &RealMap,
        resolution_t: f64,
        phi_fft: &FourierMap,
        resolution_phi: f64,
    ) -> RealMap {
        let np = phi_fft.nrows();
        let lv: Vec<f64> = fft_freqs(np)
            .iter()
            .map(|f| 2.0 * PI * f / resolution_phi)
            .collect();

        // Deflection field d_i(x) = inv(i·l_i·phi) on the potential's grid.
        let mut deflection = Vec::with_capacity(2);
        for axis in 0..2 {
            let mut leg = phi_fft.clone();
            for ((i, j), v) in leg.indexed_iter_mut() {
                let li = if axis == 0 { lv[i] } else { lv[j] };
                *v *= Complex64::new(0.0, li);
            }
            deflection.push(inv(&leg, resolution_phi).mapv(|v| v.re));
        }

        // Remap: sample the deflection at each temperature pixel (bilinear on
        // the potential grid), then resample the unlensed map at the
        // displaced position (bicubic, periodic).
        let (nt0, nt1) = unlensed.dim();
        let scale = resolution_t / resolution_phi;
        let mut lensed = Array2::zeros((nt0, nt1));
        for ((i, j), out) in lensed.indexed_iter_mut() {
            let u = i as f64 * scale;
            let v = j as f64 * scale;
            let d0 = bilinear_periodic(&deflection[0], u, v);
            let d1 = bilinear_periodic(&deflection[1], u, v);
            let si = i as f64 + d0 / resolution_t;
            let sj = j as f64 + d1 / resolution_t;
            *out = bicubic_periodic(unlensed, si, sj);
        }
        lensed
    }

    fn simulate_temperature_map(
        &self,
        power: &Array2<f64>,
        resolution: f64,
        rng: &mut dyn RngCore,
    ) -> FourierMap {
        // FFT of unit white noise carries flat power N²; shaping by
        // sqrt(C_l)/dx gives ⟨|T(l)|²⟩ = N²·C_l/dx², the raw-DFT counterpart
        // of the continuum ⟨|T|²⟩ = area·C_l. Transforming a real-space
        // realization keeps the Fourier map hermitian by construction.
        let (n0, n1) = power.dim();
        let mut white = Array2::<Complex64>::zeros((n0, n1));
        for v in white.iter_mut() {
            let g: f64 = StandardNormal.sample(rng);
            *v = Complex64::new(g, 0.0);
        }
        let mut tfft = dft2(&white, false);
        for ((i, j), v) in tfft.indexed_iter_mut() {
            *v *= power[[i, j]].sqrt() / resolution;
        }
        tfft
    }
}
