//! Instrument-noise power models for observed temperature maps.

use std::f64::consts::LN_2;

use ndarray::Array2;

use crate::units::{Angle, NoiseLevel};

/// Noise model for an observed CMB temperature map.
///
/// The noise power enters the observed spectrum used by the inverse-variance
/// filter. All amplitudes are converted to µK·rad (and the beam to radians)
/// before the formulas are evaluated.
#[derive(Debug, Clone, PartialEq)]
pub enum NoiseSpec {
    /// Scale-independent (white) noise.
    White { sigma: NoiseLevel },
    /// White noise deconvolved by a Gaussian beam of the given FWHM; the
    /// beam deconvolution blows up exponentially at high multipole, so an
    /// optional `ellmax` truncates the power to zero above that multipole.
    Detector {
        sigma: NoiseLevel,
        fwhm: Angle,
        ellmax: Option<f64>,
    },
}

impl NoiseSpec {
    /// Evaluate the noise power at every multipole of `ell`.
    pub fn power(&self, ell: &Array2<f64>) -> Array2<f64> {
        match self {
            NoiseSpec::White { sigma } => {
                let s2 = sigma.uk_rad() * sigma.uk_rad();
                Array2::from_elem(ell.raw_dim(), s2)
            }
            NoiseSpec::Detector {
                sigma,
                fwhm,
                ellmax,
            } => {
                let s2 = sigma.uk_rad() * sigma.uk_rad();
                let beam2 = fwhm.radians() * fwhm.radians() / (8.0 * LN_2);
                ell.mapv(|l| {
                    if ellmax.is_some_and(|lmax| l > lmax) {
                        0.0
                    } else {
                        s2 * (l * (l + 1.0) * beam2).exp()
                    }
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_ell() -> Array2<f64> {
        let mut ell = Array2::zeros((3, 3));
        for ((i, j), v) in ell.indexed_iter_mut() {
            *v = 100.0 * (i * 3 + j) as f64;
        }
        ell[[0, 0]] = 1.0;
        ell
    }

    #[test]
    fn white_noise_is_constant_sigma_squared() {
        let spec = NoiseSpec::White {
            sigma: NoiseLevel::from_uk_rad(2.0),
        };
        let power = spec.power(&sample_ell());
        for v in power.iter() {
            assert_eq!(*v, 4.0);
        }
    }

    #[test]
    fn detector_noise_matches_beam_formula() {
        let fwhm = Angle::from_radians(1e-3);
        let spec = NoiseSpec::Detector {
            sigma: NoiseLevel::from_uk_rad(1.0),
            fwhm,
            ellmax: None,
        };
        let ell = sample_ell();
        let power = spec.power(&ell);
        for (l, p) in ell.iter().zip(power.iter()) {
            let expected = (l * (l + 1.0) * 1e-6 / (8.0 * LN_2)).exp();
            assert_relative_eq!(*p, expected, max_relative = 1e-12);
        }
    }

    #[test]
    fn detector_noise_truncates_above_ellmax() {
        let spec = NoiseSpec::Detector {
            sigma: NoiseLevel::from_uk_rad(1.0),
            fwhm: Angle::from_radians(1e-3),
            ellmax: Some(400.0),
        };
        let ell = sample_ell();
        let power = spec.power(&ell);
        for (l, p) in ell.iter().zip(power.iter()) {
            if *l > 400.0 {
                assert_eq!(*p, 0.0);
            } else {
                assert!(*p > 0.0);
            }
        }
    }
}
