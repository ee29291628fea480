//! Trigonometric tables generated by linear recurrences.
//!
//! The slowness grid and the retained frequency bins are both equally
//! spaced, so the phase `2*pi*f*s*x` for bin `b` and grid step `m` is
//! `b * m * alpha` for a per-station angle `alpha`. The Chebyshev relation
//! `cos(n t) = 2 cos(t) cos((n-1) t) - cos((n-2) t)` (and its sine twin)
//! walks both indices with one multiply-add per entry.

use crate::prelude::EngineResult;
use crate::processing::buffer_pool::{try_zeroed, ScratchArena};

/// `cos`/`sin` of `(first_bin + b) * m * alpha_i` for every station `i`,
/// retained bin `b` and grid step `m` along one slowness axis.
pub struct AxisTable {
    nbins: usize,
    steps: usize,
    cos: Vec<f64>,
    sin: Vec<f64>,
}

impl AxisTable {
    /// `alphas` holds one base angle per station: `2*pi*df*d_slowness*coord`.
    pub fn build(
        alphas: &[f64],
        first_bin: usize,
        nbins: usize,
        steps: usize,
        arena: &mut ScratchArena,
    ) -> EngineResult<Self> {
        let len = alphas.len() * nbins * steps;
        let mut cos = arena.checkout(len)?;
        let mut sin = match arena.checkout(len) {
            Ok(buffer) => buffer,
            Err(err) => {
                arena.release(cos);
                return Err(err);
            }
        };

        let scratch = try_zeroed::<f64>(nbins)
            .and_then(|bin_cos| try_zeroed::<f64>(nbins).map(|bin_sin| (bin_cos, bin_sin)));
        let (mut bin_cos, mut bin_sin) = match scratch {
            Ok(pair) => pair,
            Err(err) => {
                arena.release(cos);
                arena.release(sin);
                return Err(err);
            }
        };
        for (station, &alpha) in alphas.iter().enumerate() {
            bin_series(alpha, first_bin, &mut bin_cos, &mut bin_sin);
            for b in 0..nbins {
                let base = (station * nbins + b) * steps;
                multiple_series(
                    bin_cos[b],
                    bin_sin[b],
                    &mut cos[base..base + steps],
                    &mut sin[base..base + steps],
                );
            }
        }

        Ok(Self {
            nbins,
            steps,
            cos,
            sin,
        })
    }

    #[inline]
    pub fn get(&self, station: usize, bin: usize, step: usize) -> (f64, f64) {
        let idx = (station * self.nbins + bin) * self.steps + step;
        (self.cos[idx], self.sin[idx])
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Hands the buffers back for reuse by the next computation.
    pub fn release(self, arena: &mut ScratchArena) {
        arena.release(self.cos);
        arena.release(self.sin);
    }
}

/// `cos`/`sin` of `(first_bin + b) * alpha` for `b` in `0..cos.len()`,
/// seeded from the two lowest bins.
pub fn bin_series(alpha: f64, first_bin: usize, cos: &mut [f64], sin: &mut [f64]) {
    let n = cos.len().min(sin.len());
    if n == 0 {
        return;
    }
    let phi0 = first_bin as f64 * alpha;
    cos[0] = phi0.cos();
    sin[0] = phi0.sin();
    if n == 1 {
        return;
    }
    let phi1 = (first_bin + 1) as f64 * alpha;
    cos[1] = phi1.cos();
    sin[1] = phi1.sin();
    // cos(alpha) from the seeds: cos(phi1 - phi0)
    let two_cos = 2.0 * (cos[1] * cos[0] + sin[1] * sin[0]);
    for b in 2..n {
        cos[b] = two_cos * cos[b - 1] - cos[b - 2];
        sin[b] = two_cos * sin[b - 1] - sin[b - 2];
    }
}

/// `cos`/`sin` of `m * phi` for `m` in `0..cos.len()`, given `cos(phi)` and
/// `sin(phi)`.
pub fn multiple_series(cos_phi: f64, sin_phi: f64, cos: &mut [f64], sin: &mut [f64]) {
    let n = cos.len().min(sin.len());
    if n == 0 {
        return;
    }
    cos[0] = 1.0;
    sin[0] = 0.0;
    if n == 1 {
        return;
    }
    cos[1] = cos_phi;
    sin[1] = sin_phi;
    let two_cos = 2.0 * cos_phi;
    for m in 2..n {
        cos[m] = two_cos * cos[m - 1] - cos[m - 2];
        sin[m] = two_cos * sin[m - 1] - sin[m - 2];
    }
}

/// `cos`/`sin` of `start + k * step` by repeated rotation, for grids that
/// do not start at zero.
pub fn rotation_series(start: f64, step: f64, cos: &mut [f64], sin: &mut [f64]) {
    let n = cos.len().min(sin.len());
    if n == 0 {
        return;
    }
    let (rs, rc) = step.sin_cos();
    cos[0] = start.cos();
    sin[0] = start.sin();
    for k in 1..n {
        cos[k] = cos[k - 1] * rc - sin[k - 1] * rs;
        sin[k] = sin[k - 1] * rc + cos[k - 1] * rs;
    }
}
