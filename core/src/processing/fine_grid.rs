use crate::math::recurrence::rotation_series;
use crate::prelude::EngineResult;
use crate::processing::beamform::zeroed_grid;
use crate::processing::buffer_pool::try_zeroed;
use crate::processing::peak::{GridFrame, PeakLocator};
use crate::processing::spectrum::Spectrum;
use crate::result::FineGrid;
use crate::telemetry::log::LogManager;
use std::f64::consts::PI;

/// Cells per side of the refinement grid.
pub const FINE_GRID_SIZE: usize = 11;

/// Re-steers an 11x11 grid spanning one coarse cell either side of a peak.
pub struct FineGridRefiner {
    logger: LogManager,
}

impl FineGridRefiner {
    pub fn new() -> Self {
        Self {
            logger: LogManager::new("fine-grid"),
        }
    }

    /// Evaluates the fine grid around `(sx0, sy0)` over the absolute bins
    /// `lo..=hi`, normalised with the band's `scale`.
    #[allow(clippy::too_many_arguments)]
    pub fn evaluate(
        &self,
        spectrum: &Spectrum,
        positions: &[(f64, f64)],
        lo: usize,
        hi: usize,
        scale: f64,
        center: (f64, f64),
        d_slowness: f64,
    ) -> EngineResult<Option<FineGrid>> {
        let n = FINE_GRID_SIZE;
        let half = (n - 1) / 2;
        let spacing = 2.0 * d_slowness / (n - 1) as f64;
        let frame = GridFrame {
            size: n,
            origin_x: center.0 - half as f64 * spacing,
            origin_y: center.1 - half as f64 * spacing,
            spacing,
        };

        let nsta = positions.len();
        let mut values = zeroed_grid(n, n)?;
        let mut xcos = try_zeroed::<f64>(nsta * n)?;
        let mut xsin = try_zeroed::<f64>(nsta * n)?;
        let mut ycos = try_zeroed::<f64>(nsta * n)?;
        let mut ysin = try_zeroed::<f64>(nsta * n)?;

        for bin in lo..=hi {
            let col = bin - spectrum.first_bin;
            let omega = 2.0 * PI * bin as f64 * spectrum.df;
            for (station, &(east, north)) in positions.iter().enumerate() {
                let range = station * n..(station + 1) * n;
                rotation_series(
                    omega * east * frame.origin_x,
                    omega * east * spacing,
                    &mut xcos[range.clone()],
                    &mut xsin[range.clone()],
                );
                rotation_series(
                    omega * north * frame.origin_y,
                    omega * north * spacing,
                    &mut ycos[range.clone()],
                    &mut ysin[range],
                );
            }

            for row in 0..n {
                for kx in 0..n {
                    let mut re = 0.0;
                    let mut im = 0.0;
                    for station in 0..nsta {
                        let x = spectrum.data[[station, col]];
                        let (cx, sx) = (xcos[station * n + kx], xsin[station * n + kx]);
                        let (cy, sy) = (ycos[station * n + row], ysin[station * n + row]);
                        let cos = cx * cy - sx * sy;
                        let sin = sx * cy + cx * sy;
                        re += x.re * cos + x.im * sin;
                        im += x.im * cos - x.re * sin;
                    }
                    values[[row, kx]] += re * re + im * im;
                }
            }
        }
        values.mapv_inplace(|v| v * scale);

        let peak = match PeakLocator::find(&values, &frame, None) {
            Some(peak) => peak,
            None => return Ok(None),
        };
        self.logger.debug(&format!(
            "fine peak {:.4} at ({:.4}, {:.4})",
            peak.value, peak.sx, peak.sy
        ));

        Ok(Some(FineGrid {
            size: n,
            spacing,
            origin_x: frame.origin_x,
            origin_y: frame.origin_y,
            values,
            peak,
        }))
    }
}

impl Default for FineGridRefiner {
    fn default() -> Self {
        Self::new()
    }
}
