use crate::math::stats::fit_paraboloid;
use crate::prelude::{EngineResult, FkError, SignalMask};
use crate::result::{azimuth_deg, GridGeometry, GridPeak};
use ndarray::Array2;

/// Maps grid indices to slowness for a square grid with uniform spacing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridFrame {
    pub size: usize,
    pub origin_x: f64,
    pub origin_y: f64,
    pub spacing: f64,
}

impl GridFrame {
    pub fn sx(&self, col: usize) -> f64 {
        self.origin_x + col as f64 * self.spacing
    }

    pub fn sy(&self, row: usize) -> f64 {
        self.origin_y + row as f64 * self.spacing
    }

    pub fn is_interior(&self, row: usize, col: usize) -> bool {
        row >= 1 && col >= 1 && row + 1 < self.size && col + 1 < self.size
    }
}

impl From<GridGeometry> for GridFrame {
    fn from(geometry: GridGeometry) -> Self {
        Self {
            size: geometry.size,
            origin_x: geometry.coordinate(0),
            origin_y: geometry.coordinate(0),
            spacing: geometry.d_slowness,
        }
    }
}

/// Finds grid maxima, optionally inside a signal-region mask.
pub struct PeakLocator;

impl PeakLocator {
    /// Eligibility grid for `mask`, or `None` when every bound is
    /// unconstrained.
    pub fn build_mask(
        mask: &SignalMask,
        geometry: GridGeometry,
    ) -> EngineResult<Option<Array2<bool>>> {
        if mask.is_unconstrained() {
            return Ok(None);
        }
        let smin = if mask.slowness_min < 0.0 {
            0.0
        } else {
            mask.slowness_min
        };
        let smax = if mask.slowness_max < 0.0 {
            std::f64::consts::SQRT_2 * geometry.slowness_max
        } else {
            mask.slowness_max
        };
        let az_min = if mask.azimuth_min < 0.0 {
            0.0
        } else {
            mask.azimuth_min
        };
        let az_max = if mask.azimuth_max < 0.0 {
            360.0
        } else {
            mask.azimuth_max
        };

        let n = geometry.size;
        let eligible = Array2::from_shape_fn((n, n), |(row, col)| {
            let sx = geometry.coordinate(col);
            let sy = geometry.coordinate(row);
            let slowness = (sx * sx + sy * sy).sqrt();
            let az = azimuth_deg(sx, sy);
            let in_azimuth = if az_min <= az_max {
                az >= az_min && az <= az_max
            } else {
                // wraps through north
                az >= az_min || az <= az_max
            };
            slowness >= smin && slowness <= smax && in_azimuth
        });

        if !eligible.iter().any(|&cell| cell) {
            return Err(FkError::InvalidArguments(format!(
                "signal mask slowness [{}, {}] azimuth [{}, {}] excludes every grid cell",
                smin, smax, az_min, az_max
            )));
        }
        Ok(Some(eligible))
    }

    /// Largest eligible cell as `(row, col, value)`. The search starts at
    /// cell 0, or at the first eligible cell when cell 0 is masked out.
    pub fn locate(
        values: &Array2<f64>,
        mask: Option<&Array2<bool>>,
    ) -> Option<(usize, usize, f64)> {
        let ncols = values.ncols();
        let eligible = |idx: usize| mask.map_or(true, |m| m[[idx / ncols, idx % ncols]]);

        let start = (0..values.len()).find(|&idx| eligible(idx))?;
        let mut best = start;
        let mut best_value = values[[start / ncols, start % ncols]];
        for (idx, &value) in values.iter().enumerate().skip(start + 1) {
            if value > best_value && eligible(idx) {
                best = idx;
                best_value = value;
            }
        }
        Some((best / ncols, best % ncols, best_value))
    }

    /// Sub-cell slowness of an interior peak from a 3x3 paraboloid fit.
    /// Offsets larger than one cell are discarded.
    pub fn refine(values: &Array2<f64>, frame: &GridFrame, row: usize, col: usize) -> (f64, f64) {
        let coarse = (frame.sx(col), frame.sy(row));
        if !frame.is_interior(row, col) {
            return coarse;
        }
        let mut z = [[0.0; 3]; 3];
        for (r, line) in z.iter_mut().enumerate() {
            for (c, value) in line.iter_mut().enumerate() {
                *value = values[[row + r - 1, col + c - 1]];
            }
        }
        match fit_paraboloid(&z) {
            Some((x0, y0)) if x0.abs() <= 1.0 && y0.abs() <= 1.0 => (
                coarse.0 + x0 * frame.spacing,
                coarse.1 + y0 * frame.spacing,
            ),
            _ => coarse,
        }
    }

    /// Locates and refines the maximum of `values`.
    pub fn find(
        values: &Array2<f64>,
        frame: &GridFrame,
        mask: Option<&Array2<bool>>,
    ) -> Option<GridPeak> {
        let (row, col, value) = Self::locate(values, mask)?;
        let (sx, sy) = Self::refine(values, frame, row, col);
        Some(GridPeak {
            row,
            col,
            value,
            sx,
            sy,
        })
    }
}
