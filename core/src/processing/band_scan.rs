use crate::prelude::{EngineResult, FkError, FrequencyBand, SignalMask};
use crate::processing::beamform::zeroed_grid;
use crate::processing::normalize::StatisticNormalizer;
use crate::processing::peak::{GridFrame, PeakLocator};
use crate::result::{BandResult, FkResult, SpectrumCube};
use crate::telemetry::log::LogManager;
use ndarray::{Array2, Axis};

/// One tested placement of the sliding band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanPosition {
    pub bin_lo: usize,
    pub bin_hi: usize,
    pub peak_value: f64,
    pub f_stat: f64,
}

/// Every tested position and the index of the winner.
#[derive(Debug, Clone, PartialEq)]
pub struct BandScan {
    pub bandwidth_bins: usize,
    pub positions: Vec<ScanPosition>,
    pub best: usize,
}

impl BandScan {
    pub fn best_position(&self) -> &ScanPosition {
        &self.positions[self.best]
    }
}

/// Slides a fixed-width band over a retained spectrum cube and keeps the
/// placement with the largest F-statistic.
pub struct BandScanner {
    logger: LogManager,
}

impl BandScanner {
    pub fn new() -> Self {
        Self {
            logger: LogManager::new("band-scan"),
        }
    }

    /// Replaces `result.bands` with the single best band found between
    /// `freq_low` and `freq_high`. Without a `mask` the full azimuth and
    /// slowness range is eligible.
    pub fn scan(
        &self,
        result: &mut FkResult,
        bandwidth_hz: f64,
        freq_low: f64,
        freq_high: f64,
        mask: Option<&SignalMask>,
    ) -> EngineResult<BandScan> {
        let cube = result.cube.as_ref().ok_or_else(|| {
            FkError::InvalidArguments("band scan needs a full-spectrum result".into())
        })?;
        if !(bandwidth_hz > 0.0) {
            return Err(FkError::InvalidArguments(format!(
                "scan bandwidth must be positive, got {}",
                bandwidth_hz
            )));
        }
        if !(freq_low < freq_high) {
            return Err(FkError::InvalidArguments(format!(
                "scan range [{}, {}] is empty",
                freq_low, freq_high
            )));
        }

        let df = result.df;
        let width = ((bandwidth_hz / df).round() as usize).max(1);
        let lo = ((freq_low / df).floor().max(0.0) as usize).max(cube.first_bin);
        let hi = ((freq_high / df).ceil().max(0.0) as usize).min(cube.last_bin());
        if hi < lo || hi - lo + 1 < width {
            return Err(FkError::InvalidArguments(format!(
                "scan range bins {}..={} cannot hold a {}-bin band",
                lo, hi, width
            )));
        }

        let geometry = result.geometry;
        let frame = GridFrame::from(geometry);
        let eligible = match mask {
            Some(mask) => PeakLocator::build_mask(mask, geometry)?,
            None => None,
        };
        let nsta = result.num_stations;

        let mut positions = Vec::new();
        let mut best: Option<(usize, Array2<f64>, f64, f64)> = None;
        for start in lo..=hi + 1 - width {
            let end = start + width - 1;
            let (grid, total, scale) = window_grid(cube, start, end, nsta)?;
            let (_, _, peak_value) = PeakLocator::locate(&grid, eligible.as_ref())
                .ok_or_else(|| FkError::InvalidArguments("empty slowness grid".into()))?;
            let f_stat = StatisticNormalizer::f_statistic(nsta, peak_value);
            positions.push(ScanPosition {
                bin_lo: start,
                bin_hi: end,
                peak_value,
                f_stat,
            });
            let improves = best
                .as_ref()
                .map_or(true, |&(idx, _, _, _)| f_stat > positions[idx].f_stat);
            if improves {
                best = Some((positions.len() - 1, grid, total, scale));
            }
        }

        let (best_idx, grid, total_power, scale) = best
            .ok_or_else(|| FkError::InvalidArguments("no band position tested".into()))?;
        let winner = positions[best_idx];
        let unmasked = PeakLocator::find(&grid, &frame, None)
            .ok_or_else(|| FkError::InvalidArguments("empty slowness grid".into()))?;
        let restricted = PeakLocator::find(&grid, &frame, eligible.as_ref())
            .ok_or_else(|| FkError::InvalidArguments("empty slowness grid".into()))?;
        let max_power = grid.iter().copied().fold(f64::MIN, f64::max);

        let mut band = BandResult {
            band: FrequencyBand::new(winner.bin_lo as f64 * df, winner.bin_hi as f64 * df),
            bin_lo: winner.bin_lo,
            bin_hi: winner.bin_hi,
            grid,
            max_power,
            unmasked,
            restricted,
            total_power,
            scale,
            f_stat: 0.0,
            fine: None,
        };
        StatisticNormalizer::normalize_band(&mut band, nsta, result.output_power);
        result.bands = vec![band];

        self.logger.record(&format!(
            "best of {} positions: bins {}..={} F {:.3}",
            positions.len(),
            winner.bin_lo,
            winner.bin_hi,
            winner.f_stat
        ));

        Ok(BandScan {
            bandwidth_bins: width,
            positions,
            best: best_idx,
        })
    }
}

impl Default for BandScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Power-ratio grid over the absolute bins `start..=end` of the cube.
fn window_grid(
    cube: &SpectrumCube,
    start: usize,
    end: usize,
    num_stations: usize,
) -> EngineResult<(Array2<f64>, f64, f64)> {
    let (_, rows, cols) = cube.power.dim();
    let mut grid = zeroed_grid(rows, cols)?;
    let mut total = 0.0;
    for bin in start..=end {
        let slab = cube.power.index_axis(Axis(0), bin - cube.first_bin);
        grid += &slab;
        total += cube.total_power[bin - cube.first_bin];
    }
    if total == 0.0 {
        total = 1.0;
    }
    let scale = 1.0 / (total * num_stations as f64);
    grid.mapv_inplace(|v| v * scale);
    Ok((grid, total, scale))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::ReferencePoint;
    use crate::math::taper::TaperKind;
    use crate::result::GridGeometry;
    use ndarray::Array3;

    /// Cube whose bins 6..=8 are fully coherent at the centre cell and
    /// incoherent elsewhere.
    fn synthetic_result() -> FkResult {
        let n = 5;
        let nbins = 12;
        let nsta = 4;
        let mut power = Array3::<f64>::zeros((nbins, n, n));
        let mut total_power = vec![0.0; nbins];
        for b in 0..nbins {
            let coherent = (6..=8).contains(&b);
            for row in 0..n {
                for col in 0..n {
                    power[[b, row, col]] = if coherent && row == 2 && col == 2 {
                        16.0
                    } else {
                        2.0 + 0.1 * col as f64
                    };
                }
            }
            total_power[b] = 4.0;
        }
        FkResult {
            num_stations: nsta,
            stations: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            network: "XX".into(),
            windowed: true,
            time_shift: 0.0,
            window_start: 0.0,
            window_end: 10.0,
            sample_interval: 0.01,
            df: 0.5,
            nfft: 256,
            first_bin: 0,
            last_bin: nbins - 1,
            geometry: GridGeometry::new(n, 0.2),
            reference: ReferencePoint {
                station: "A".into(),
                lat: 0.0,
                lon: 0.0,
            },
            taper: TaperKind::None,
            output_power: false,
            bands: Vec::new(),
            cube: Some(SpectrumCube {
                power,
                total_power,
                first_bin: 0,
            }),
            notes: Vec::new(),
        }
    }

    #[test]
    fn scan_selects_the_coherent_band() {
        let mut result = synthetic_result();
        let scan = BandScanner::new()
            .scan(&mut result, 1.5, 0.0, 5.5, None)
            .unwrap();
        assert_eq!(scan.bandwidth_bins, 3);
        let best = scan.best_position();
        assert_eq!((best.bin_lo, best.bin_hi), (6, 8));
        assert!(best.bin_hi >= best.bin_lo);
        assert!(scan.positions.iter().all(|p| p.f_stat <= best.f_stat));

        assert_eq!(result.bands.len(), 1);
        let band = &result.bands[0];
        assert_eq!((band.restricted.row, band.restricted.col), (2, 2));
        assert!((band.restricted.value - 1.0).abs() < 1e-12);
        assert!((band.band.fmin - 3.0).abs() < 1e-12);
        assert_eq!(band.grid[[2, 2]], 10.0);
    }

    #[test]
    fn scan_requires_a_cube() {
        let mut result = synthetic_result();
        result.cube = None;
        assert!(matches!(
            BandScanner::new().scan(&mut result, 1.5, 0.0, 5.5, None),
            Err(FkError::InvalidArguments(_))
        ));
    }

    #[test]
    fn scan_rejects_a_range_narrower_than_the_band() {
        let mut result = synthetic_result();
        assert!(BandScanner::new()
            .scan(&mut result, 3.0, 1.0, 1.5, None)
            .is_err());
    }
}
