//! Output of an FK computation.

pub mod codec;

use crate::array::ReferencePoint;
use crate::math::taper::TaperKind;
use crate::prelude::FrequencyBand;
use ndarray::{Array2, Array3};

pub use codec::{FkRecord, ResultCodec};

/// Square slowness grid, zero slowness at the centre cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
    pub size: usize,
    pub slowness_max: f64,
    pub d_slowness: f64,
}

impl GridGeometry {
    pub fn new(size: usize, slowness_max: f64) -> Self {
        Self {
            size,
            slowness_max,
            d_slowness: 2.0 * slowness_max / (size - 1) as f64,
        }
    }

    pub fn center(&self) -> usize {
        (self.size - 1) / 2
    }

    /// Slowness (s/km) at a row or column index.
    pub fn coordinate(&self, idx: usize) -> f64 {
        (idx as f64 - self.center() as f64) * self.d_slowness
    }
}

/// A located maximum: the cell it was found in and its (possibly refined)
/// slowness.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridPeak {
    pub row: usize,
    pub col: usize,
    pub value: f64,
    pub sx: f64,
    pub sy: f64,
}

impl GridPeak {
    pub fn slowness(&self) -> f64 {
        (self.sx * self.sx + self.sy * self.sy).sqrt()
    }

    /// Back azimuth in degrees clockwise from north, `[0, 360)`.
    pub fn azimuth(&self) -> f64 {
        azimuth_deg(self.sx, self.sy)
    }
}

/// `atan2(sx, sy)` in degrees, normalised to `[0, 360)`.
pub fn azimuth_deg(sx: f64, sy: f64) -> f64 {
    let az = sx.atan2(sy).to_degrees();
    if az < 0.0 {
        az + 360.0
    } else if az >= 360.0 {
        az - 360.0
    } else {
        az
    }
}

/// 11x11 refinement grid around a coarse peak.
#[derive(Debug, Clone, PartialEq)]
pub struct FineGrid {
    pub size: usize,
    pub spacing: f64,
    /// Slowness of cell `[0, 0]`.
    pub origin_x: f64,
    pub origin_y: f64,
    pub values: Array2<f64>,
    pub peak: GridPeak,
}

/// Beam power over the grid for one frequency band.
#[derive(Debug, Clone, PartialEq)]
pub struct BandResult {
    pub band: FrequencyBand,
    /// Inclusive FFT bin range of the band.
    pub bin_lo: usize,
    pub bin_hi: usize,
    /// Grid values; after normalisation, decibels relative to the maximum.
    pub grid: Array2<f64>,
    /// Largest power ratio seen while filling the grid.
    pub max_power: f64,
    pub unmasked: GridPeak,
    pub restricted: GridPeak,
    pub total_power: f64,
    pub scale: f64,
    pub f_stat: f64,
    pub fine: Option<FineGrid>,
}

/// Unnormalised beam power per retained bin, kept for band scanning.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumCube {
    /// Shape `(bins, rows, cols)`.
    pub power: Array3<f64>,
    /// Summed squared magnitude over stations, per bin.
    pub total_power: Vec<f64>,
    pub first_bin: usize,
}

impl SpectrumCube {
    pub fn num_bins(&self) -> usize {
        self.total_power.len()
    }

    pub fn last_bin(&self) -> usize {
        self.first_bin + self.num_bins() - 1
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FkResult {
    pub num_stations: usize,
    pub stations: Vec<String>,
    pub network: String,
    pub windowed: bool,
    /// Window start relative to the earliest trace start, seconds.
    pub time_shift: f64,
    pub window_start: f64,
    pub window_end: f64,
    pub sample_interval: f64,
    pub df: f64,
    pub nfft: usize,
    pub first_bin: usize,
    pub last_bin: usize,
    pub geometry: GridGeometry,
    pub reference: ReferencePoint,
    pub taper: TaperKind,
    pub output_power: bool,
    pub bands: Vec<BandResult>,
    pub cube: Option<SpectrumCube>,
    pub notes: Vec<String>,
}

/// What a computation produced.
#[derive(Debug, Clone, PartialEq)]
pub enum FkOutcome {
    Computed(FkResult),
    /// Too few traces survived window alignment; nothing was evaluated.
    Skipped { usable_traces: usize },
}

impl FkOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, FkOutcome::Skipped { .. })
    }

    pub fn result(&self) -> Option<&FkResult> {
        match self {
            FkOutcome::Computed(result) => Some(result),
            FkOutcome::Skipped { .. } => None,
        }
    }
}
