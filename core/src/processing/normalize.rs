use crate::prelude::WHITENING_EPSILON;
use crate::result::BandResult;
use ndarray::Array2;

/// Cells below `max * DB_FLOOR` are clamped there before taking logs.
const DB_FLOOR: f64 = 1.0e-30;

/// Turns power ratios into display values and detection statistics.
pub struct StatisticNormalizer;

impl StatisticNormalizer {
    /// `(N - 1) * v / (1 - v + eps)`.
    pub fn f_statistic(num_stations: usize, power: f64) -> f64 {
        num_stations.saturating_sub(1) as f64 * power / (1.0 - power + WHITENING_EPSILON)
    }

    /// Power ratio as-is, or whitened `v / (1 - v + eps)`.
    pub fn convert(power: f64, output_power: bool) -> f64 {
        if output_power {
            power
        } else {
            power / (1.0 - power + WHITENING_EPSILON)
        }
    }

    /// Rescales to `10 - 10 log10(max / value)`, so the maximum reads 10.
    pub fn to_decibels(values: &mut Array2<f64>) {
        let max = values.iter().copied().fold(f64::MIN, f64::max);
        if !(max > 0.0) {
            values.fill(10.0);
            return;
        }
        let floor = max * DB_FLOOR;
        values.mapv_inplace(|v| 10.0 - 10.0 * (max / v.max(floor)).log10());
    }

    fn rescale(values: &mut Array2<f64>, output_power: bool) {
        values.mapv_inplace(|v| Self::convert(v, output_power));
        Self::to_decibels(values);
    }

    /// Computes the band's F-statistic and rescales its coarse and fine
    /// grids in place. Peak values stay power ratios.
    pub fn normalize_band(band: &mut BandResult, num_stations: usize, output_power: bool) {
        band.f_stat = Self::f_statistic(num_stations, band.restricted.value);
        Self::rescale(&mut band.grid, output_power);
        if let Some(fine) = band.fine.as_mut() {
            Self::rescale(&mut fine.values, output_power);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decibel_grid_peaks_at_exactly_ten() {
        let mut values = Array2::from_shape_vec((2, 2), vec![0.1, 0.4, 0.8, 0.2]).unwrap();
        StatisticNormalizer::to_decibels(&mut values);
        assert_eq!(values[[1, 0]], 10.0);
        assert!((values[[0, 1]] - (10.0 - 10.0 * 2f64.log10())).abs() < 1e-12);
        assert!(values.iter().all(|&v| v <= 10.0));
    }

    #[test]
    fn zero_cells_stay_finite() {
        let mut values = Array2::from_shape_vec((1, 3), vec![0.0, 1.0, 0.5]).unwrap();
        StatisticNormalizer::to_decibels(&mut values);
        assert!(values.iter().all(|v| v.is_finite()));
        assert!((values[[0, 0]] + 290.0).abs() < 1e-9);
    }

    #[test]
    fn f_statistic_grows_with_coherence() {
        let low = StatisticNormalizer::f_statistic(10, 0.2);
        let high = StatisticNormalizer::f_statistic(10, 0.9);
        assert!((low - 9.0 * 0.2 / (0.8 + WHITENING_EPSILON)).abs() < 1e-12);
        assert!(high > low);
        assert!(StatisticNormalizer::f_statistic(10, 1.0).is_finite());
    }

    #[test]
    fn whitening_respects_output_flag() {
        assert_eq!(StatisticNormalizer::convert(0.5, true), 0.5);
        assert!((StatisticNormalizer::convert(0.5, false) - 0.5 / (0.5 + 1e-6)).abs() < 1e-12);
    }
}
