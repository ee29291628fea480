pub struct StatsHelper;

impl StatsHelper {
    pub fn mean(samples: &[f64]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        samples.iter().sum::<f64>() / samples.len() as f64
    }

    /// Removes the mean in place.
    pub fn demean(samples: &mut [f64]) {
        let mean = Self::mean(samples);
        for value in samples.iter_mut() {
            *value -= mean;
        }
    }
}

/// Stationary point of a least-squares paraboloid
/// `a + bx + cy + dx^2 + ey^2 + fxy` through a 3x3 neighbourhood, where
/// `z[row][col]` sits at `x = col - 1`, `y = row - 1`.
///
/// Returns `None` when the fit is singular.
pub fn fit_paraboloid(z: &[[f64; 3]; 3]) -> Option<(f64, f64)> {
    let mut sx = 0.0;
    let mut sy = 0.0;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (row, values) in z.iter().enumerate() {
        let y = row as f64 - 1.0;
        for (col, &value) in values.iter().enumerate() {
            let x = col as f64 - 1.0;
            sx += x * value;
            sy += y * value;
            sxy += x * y * value;
            sxx += (x * x - 2.0 / 3.0) * value;
            syy += (y * y - 2.0 / 3.0) * value;
        }
    }
    let b = sx / 6.0;
    let c = sy / 6.0;
    let f = sxy / 4.0;
    let d = sxx / 2.0;
    let e = syy / 2.0;

    let det = 4.0 * d * e - f * f;
    if det == 0.0 {
        return None;
    }
    let x0 = (f * c - 2.0 * e * b) / det;
    let y0 = (f * b - 2.0 * d * c) / det;
    if x0.is_finite() && y0.is_finite() {
        Some((x0, y0))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demean_zeroes_the_mean() {
        let mut samples = vec![1.0, 2.0, 3.0, 6.0];
        StatsHelper::demean(&mut samples);
        assert!(StatsHelper::mean(&samples).abs() < 1e-12);
        assert_eq!(StatsHelper::mean(&[]), 0.0);
    }

    #[test]
    fn paraboloid_recovers_offset_peak() {
        let (px, py) = (0.3, -0.2);
        let mut z = [[0.0; 3]; 3];
        for (row, values) in z.iter_mut().enumerate() {
            for (col, value) in values.iter_mut().enumerate() {
                let x = col as f64 - 1.0;
                let y = row as f64 - 1.0;
                *value = 5.0 - (x - px).powi(2) - 2.0 * (y - py).powi(2);
            }
        }
        let (x0, y0) = fit_paraboloid(&z).unwrap();
        assert!((x0 - px).abs() < 1e-9);
        assert!((y0 - py).abs() < 1e-9);
    }

    #[test]
    fn flat_neighbourhood_is_singular() {
        let z = [[1.0; 3]; 3];
        assert!(fit_paraboloid(&z).is_none());
    }
}
