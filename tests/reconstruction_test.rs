#![cfg(feature = "flatsky")]
//! Integration tests over the built-in flat-sky backend: simulate a
//! temperature map, reconstruct the lensing potential, and lens maps through
//! convergence fields.

use std::f64::consts::PI;

use approx::{assert_abs_diff_eq, assert_relative_eq};
use cmblens::{
    Angle, BackendKind, Geometry, NoiseConfig, NoiseSpec, RealMap, Reconstruction, SpectrumSource,
};
use ndarray::Array2;
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn flat_unit_spectrum() -> SpectrumSource {
    SpectrumSource::Tabulated {
        name: "flat-unit".into(),
        cl: vec![1.0; 4000],
    }
}

fn white_noise_uk_arcmin(sigma: f64) -> NoiseSpec {
    NoiseSpec::try_from(&NoiseConfig {
        kind: "white".into(),
        sigma_uk_arcmin: sigma,
        ..Default::default()
    })
    .unwrap()
}

#[test]
fn end_to_end_white_noise_reconstruction() {
    let _ = tracing_subscriber::fmt().with_env_filter("info").try_init();

    // ── Step 1: configuration ──
    let geometry = Geometry::new(Angle::from_degrees(1.6), 128);
    let spectrum = flat_unit_spectrum();
    let noise = white_noise_uk_arcmin(0.1);

    // ── Step 2: simulate an observed map ──
    let mut pipeline = Reconstruction::new(BackendKind::FlatSky).unwrap();
    let mut rng = StdRng::seed_from_u64(42);
    let tfft = pipeline
        .generate_temperature_map(geometry, &spectrum, &mut rng)
        .unwrap();
    assert_eq!(tfft.dim(), (128, 128));

    // Simulation cached a noiseless observed spectrum under the same
    // identities; start the estimation from a clean slate.
    pipeline.reset_cache();

    // ── Step 3: estimate twice; every cache stage builds exactly once ──
    let phi = pipeline
        .estimate_potential(&tfft, geometry, &spectrum, None, Some(&noise))
        .unwrap();
    let phi_again = pipeline
        .estimate_potential(&tfft, geometry, &spectrum, None, Some(&noise))
        .unwrap();

    assert_eq!(phi.dim(), (128, 128));
    assert_eq!(pipeline.cache().grid_builds(), 1);
    assert_eq!(pipeline.cache().spectra_builds(), 1);
    assert_eq!(pipeline.cache().norm_builds(), 1);
    for (a, b) in phi.iter().zip(phi_again.iter()) {
        assert_eq!(a, b);
    }

    // ── Step 4: cached quantities ──
    let cache = pipeline.cache();
    let grid = cache.multipole().unwrap();
    assert_eq!(grid.ell().dim(), (128, 128));
    assert_eq!(grid.ell()[[0, 0]], 1.0);

    // Observed power = theoretical projection + constant white-noise term.
    let sigma_rad = 0.1 * PI / (180.0 * 60.0);
    let noise_power = sigma_rad * sigma_rad;
    for (th, obs) in cache
        .theoretical_power()
        .iter()
        .zip(cache.observed_power().iter())
    {
        assert_relative_eq!(*obs, th + noise_power, max_relative = 1e-12);
    }

    // Inverse-variance filter is finite and strictly positive everywhere.
    for f in cache.inverse_observed_power().iter() {
        assert!(f.is_finite());
        assert!(*f > 0.0);
    }

    // ── Step 5: the estimate itself is finite, null at DC, hermitian ──
    for v in phi.iter() {
        assert!(v.re.is_finite() && v.im.is_finite());
    }
    assert_eq!(phi[[0, 0]].norm(), 0.0);

    let max_amp = phi.iter().map(|v| v.norm()).fold(0.0_f64, f64::max);
    assert!(max_amp > 0.0);
    // phi(-L) = conj(phi(L)): the input map came from a real-space
    // realization, so the recovered potential must stay hermitian.
    let n = 128;
    for i in 0..n {
        for j in 0..n {
            let mirror = phi[[(n - i) % n, (n - j) % n]];
            assert_abs_diff_eq!(phi[[i, j]].re, mirror.re, epsilon = 1e-6 * max_amp);
            assert_abs_diff_eq!(phi[[i, j]].im, -mirror.im, epsilon = 1e-6 * max_amp);
        }
    }
}

#[test]
fn noise_change_alone_does_not_invalidate_spectra() {
    // The spectrum cache is keyed by geometry and spectrum identities only;
    // a different noise spec under unchanged identities reuses the cached
    // observed power. Callers wanting the new noise picked up reset first.
    let geometry = Geometry::new(Angle::from_degrees(1.6), 32);
    let spectrum = flat_unit_spectrum();
    let mut pipeline = Reconstruction::new(BackendKind::FlatSky).unwrap();

    let tfft = Array2::from_elem((32, 32), Complex64::new(1.0, 0.0));
    pipeline
        .estimate_potential(
            &tfft,
            geometry,
            &spectrum,
            None,
            Some(&white_noise_uk_arcmin(0.1)),
        )
        .unwrap();
    let before = pipeline.cache().observed_power().clone();

    pipeline
        .estimate_potential(
            &tfft,
            geometry,
            &spectrum,
            None,
            Some(&white_noise_uk_arcmin(10.0)),
        )
        .unwrap();

    assert_eq!(pipeline.cache().spectra_builds(), 1);
    assert_eq!(pipeline.cache().observed_power(), &before);
}

#[test]
fn lensing_with_zero_convergence_is_identity() {
    let mut pipeline = Reconstruction::new(BackendKind::FlatSky).unwrap();

    let unlensed: RealMap =
        Array2::from_shape_fn((64, 64), |(i, j)| (i as f64 * 0.37).sin() + (j as f64 * 0.59).cos());
    // A convergence field on a different geometry: coarser and narrower.
    let kappa = RealMap::zeros((32, 32));

    let lensed = pipeline
        .lens_temperature_map(
            &unlensed,
            Angle::from_degrees(2.0),
            &kappa,
            Angle::from_degrees(1.0),
        )
        .unwrap();

    assert_eq!(lensed.dim(), (64, 64));
    for (a, b) in unlensed.iter().zip(lensed.iter()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
    }
}

#[test]
fn nonzero_convergence_displaces_the_map() {
    let mut pipeline = Reconstruction::new(BackendKind::FlatSky).unwrap();

    let n = 64;
    let unlensed: RealMap = Array2::from_shape_fn((n, n), |(i, j)| {
        (2.0 * PI * i as f64 / n as f64).sin() * (2.0 * PI * j as f64 / n as f64).cos()
    });
    // Single long-wavelength convergence mode.
    let kappa: RealMap = Array2::from_shape_fn((n, n), |(i, _)| {
        0.05 * (2.0 * PI * i as f64 / n as f64).cos()
    });

    let angle = Angle::from_degrees(2.0);
    let lensed = pipeline
        .lens_temperature_map(&unlensed, angle, &kappa, angle)
        .unwrap();

    let max_shift = unlensed
        .iter()
        .zip(lensed.iter())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0_f64, f64::max);
    assert!(max_shift > 0.0, "lensing left the map untouched");
    // The deflection is small, so the remap stays a perturbation.
    assert!(max_shift < 1.0);
}

#[test]
fn flatsky_backend_is_available_in_default_build() {
    assert!(BackendKind::FlatSky.is_available());
}
