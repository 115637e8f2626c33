//! Tabulated TT power spectra: sources, identity tokens, file parsing, and
//! projection onto 2D multipole grids.
//!
//! A spectrum is a 1D curve `C_l` indexed by integer multipole. The cache
//! decides validity purely by comparing [`SpectrumIdentity`] tokens, so two
//! sources are "the same spectrum" iff their identities compare equal.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context;
use ndarray::Array2;

/// Opaque identity token for a loaded spectrum, used for cache invalidation.
///
/// File-backed sources use the canonical path; in-memory tables use a
/// caller-chosen name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpectrumIdentity(String);

impl SpectrumIdentity {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpectrumIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a TT power spectrum comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum SpectrumSource {
    /// CAMB scalar-Cl file on disk (`l  l(l+1)C_l^TT/2π [µK²]  ...`).
    CambFile(PathBuf),
    /// Preloaded curve indexed by integer multipole, keyed by name.
    Tabulated { name: String, cl: Vec<f64> },
}

impl SpectrumSource {
    /// Identity token for cache invalidation.
    pub fn identity(&self) -> SpectrumIdentity {
        match self {
            SpectrumSource::CambFile(path) => {
                // Canonicalize so that two spellings of the same file compare
                // equal; fall back to the literal path if the file is gone.
                let canonical = path
                    .canonicalize()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|_| path.display().to_string());
                SpectrumIdentity::new(format!("camb:{canonical}"))
            }
            SpectrumSource::Tabulated { name, .. } => {
                SpectrumIdentity::new(format!("tabulated:{name}"))
            }
        }
    }
}

/// A 1D TT power spectrum plus the identity of its source.
#[derive(Debug, Clone)]
pub struct PowerSpectrum {
    /// Raw `C_l` in µK², indexed by integer multipole starting at 0.
    pub cl: Vec<f64>,
    pub identity: SpectrumIdentity,
}

/// Parse one CAMB scalar-Cl record: multipole followed by the banded TT power.
fn parse_camb_record(line: &str) -> Option<(usize, f64)> {
    let mut cols = line.split_whitespace();
    let l: usize = cols.next()?.parse().ok()?;
    let banded: f64 = cols.next()?.parse().ok()?;
    Some((l, banded))
}

/// Load the TT column of a CAMB scalar-Cl file as a raw `C_l` curve.
///
/// CAMB tabulates `l(l+1)C_l/2π` in µK² starting at l = 2; the returned curve
/// is indexed from 0 with the untabulated head zero-filled.
pub fn load_camb_cltt(path: &Path) -> anyhow::Result<Vec<f64>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read CAMB spectrum file {}", path.display()))?;

    let mut cl = Vec::new();
    for (l, banded) in data
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .filter_map(parse_camb_record)
    {
        if l == 0 {
            continue;
        }
        if cl.len() <= l {
            cl.resize(l + 1, 0.0);
        }
        cl[l] = banded * 2.0 * std::f64::consts::PI / (l as f64 * (l as f64 + 1.0));
    }

    anyhow::ensure!(
        !cl.is_empty(),
        "no spectrum records found in {}",
        path.display()
    );
    Ok(cl)
}

/// Linearly interpolate a 1D integer-indexed curve onto a 2D multipole grid.
///
/// Grid points at or beyond the last tabulated index are set to exactly zero
/// rather than extrapolated.
pub fn project_onto_grid(cl: &[f64], ell: &Array2<f64>) -> Array2<f64> {
    let last = cl.len().saturating_sub(1) as f64;
    ell.mapv(|l| {
        if l >= last {
            0.0
        } else {
            let i = l.floor() as usize;
            let frac = l - i as f64;
            cl[i] * (1.0 - frac) + cl[i + 1] * frac
        }
    })
}
