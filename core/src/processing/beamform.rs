use crate::math::recurrence::AxisTable;
use crate::prelude::{EngineResult, FkError};
use crate::processing::buffer_pool::{try_zeroed, ScratchArena};
use crate::processing::spectrum::Spectrum;
use crate::result::{GridGeometry, SpectrumCube};
use crate::telemetry::log::LogManager;
use ndarray::{Array2, Array3, ArrayViewMut2, Axis};
use std::f64::consts::PI;

/// Beam power of one band, as a ratio of the total band power.
#[derive(Debug, Clone)]
pub struct BandGrid {
    pub values: Array2<f64>,
    pub max_power: f64,
    pub total_power: f64,
    pub scale: f64,
}

pub(crate) fn zeroed_grid(rows: usize, cols: usize) -> EngineResult<Array2<f64>> {
    let data = try_zeroed::<f64>(rows * cols)?;
    Array2::from_shape_vec((rows, cols), data)
        .map_err(|err| FkError::AllocationFailure(format!("grid shape: {}", err)))
}

/// Steered beam power over the coarse slowness grid.
///
/// Only the `sx >= 0, sy >= 0` quadrant is steered; the other quadrants
/// follow from the parity of cosine and sine under a sign flip of either
/// slowness component.
pub struct BeamformGrid<'a> {
    spectrum: &'a Spectrum,
    geometry: GridGeometry,
    east: AxisTable,
    north: AxisTable,
    logger: LogManager,
}

impl<'a> BeamformGrid<'a> {
    /// Builds the per-axis phase tables for `positions` (`(east_km,
    /// north_km)`, one per spectrum row).
    pub fn prepare(
        spectrum: &'a Spectrum,
        positions: &[(f64, f64)],
        geometry: GridGeometry,
        arena: &mut ScratchArena,
    ) -> EngineResult<Self> {
        if positions.len() != spectrum.num_stations() {
            return Err(FkError::InvalidArguments(format!(
                "{} positions for {} spectra",
                positions.len(),
                spectrum.num_stations()
            )));
        }
        let unit = 2.0 * PI * spectrum.df * geometry.d_slowness;
        let steps = geometry.center() + 1;
        let east_alphas: Vec<f64> = positions.iter().map(|&(east, _)| unit * east).collect();
        let north_alphas: Vec<f64> = positions.iter().map(|&(_, north)| unit * north).collect();

        let east = AxisTable::build(
            &east_alphas,
            spectrum.first_bin,
            spectrum.num_bins(),
            steps,
            arena,
        )?;
        let north = match AxisTable::build(
            &north_alphas,
            spectrum.first_bin,
            spectrum.num_bins(),
            steps,
            arena,
        ) {
            Ok(table) => table,
            Err(err) => {
                east.release(arena);
                return Err(err);
            }
        };

        Ok(Self {
            spectrum,
            geometry,
            east,
            north,
            logger: LogManager::new("beamform"),
        })
    }

    /// Adds the unnormalised beam power of retained column `col` to every
    /// cell of `out`.
    fn accumulate_bin(&self, col: usize, mut out: ArrayViewMut2<f64>) {
        let c = self.geometry.center();
        let steps = self.east.steps();
        let spectra = self.spectrum.data.column(col);

        for my in 0..steps {
            for mx in 0..steps {
                let mut a = [0.0f64; 4];
                let mut b = [0.0f64; 4];
                for (station, x) in spectra.iter().enumerate() {
                    let (cx, sx) = self.east.get(station, col, mx);
                    let (cy, sy) = self.north.get(station, col, my);
                    let terms = [cx * cy, sx * sy, sx * cy, cx * sy];
                    for k in 0..4 {
                        a[k] += x.re * terms[k];
                        b[k] += x.im * terms[k];
                    }
                }

                let x_signs: &[f64] = if mx == 0 { &[1.0] } else { &[1.0, -1.0] };
                let y_signs: &[f64] = if my == 0 { &[1.0] } else { &[1.0, -1.0] };
                for &gy in y_signs {
                    for &gx in x_signs {
                        let gxy = gx * gy;
                        let re = a[0] - gxy * a[1] + gx * b[2] + gy * b[3];
                        let im = b[0] - gxy * b[1] - gx * a[2] - gy * a[3];
                        let ky = if gy > 0.0 { c + my } else { c - my };
                        let kx = if gx > 0.0 { c + mx } else { c - mx };
                        out[[ky, kx]] += re * re + im * im;
                    }
                }
            }
        }
    }

    /// Power-ratio grid summed over the absolute bins `lo..=hi`.
    pub fn band(&self, lo: usize, hi: usize) -> EngineResult<BandGrid> {
        let n = self.geometry.size;
        let mut values = zeroed_grid(n, n)?;
        for bin in lo..=hi {
            self.accumulate_bin(bin - self.spectrum.first_bin, values.view_mut());
        }

        let mut total_power = self.spectrum.band_power(lo, hi);
        if total_power == 0.0 {
            total_power = 1.0;
        }
        let scale = 1.0 / (total_power * self.spectrum.num_stations() as f64);
        let mut max_power = f64::MIN;
        for value in values.iter_mut() {
            *value *= scale;
            max_power = max_power.max(*value);
        }
        self.logger.debug(&format!(
            "bins {}..={} max power {:.4}",
            lo, hi, max_power
        ));

        Ok(BandGrid {
            values,
            max_power,
            total_power,
            scale,
        })
    }

    /// Unnormalised power per retained bin plus per-bin total power.
    pub fn cube(&self) -> EngineResult<SpectrumCube> {
        let n = self.geometry.size;
        let nbins = self.spectrum.num_bins();
        let data = try_zeroed::<f64>(nbins * n * n)?;
        let mut power = Array3::from_shape_vec((nbins, n, n), data)
            .map_err(|err| FkError::AllocationFailure(format!("cube shape: {}", err)))?;
        for (col, slab) in power.axis_iter_mut(Axis(0)).enumerate() {
            self.accumulate_bin(col, slab);
        }
        let total_power = (self.spectrum.first_bin..=self.spectrum.last_bin)
            .map(|bin| self.spectrum.bin_power(bin))
            .collect();
        self.logger.debug(&format!("retained cube of {} bins", nbins));
        Ok(SpectrumCube {
            power,
            total_power,
            first_bin: self.spectrum.first_bin,
        })
    }

    /// Hands the phase tables back to the arena.
    pub fn release(self, arena: &mut ScratchArena) {
        self.east.release(arena);
        self.north.release(arena);
    }
}
