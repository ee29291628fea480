use num_complex::Complex64;
use rustfft::{num_traits::Zero, Fft, FftPlanner};

/// Helper that wraps the `rustfft` planner for reuse across traces.
pub struct FftHelper {
    fft: std::sync::Arc<dyn Fft<f64>>,
    buffer: Vec<Complex64>,
}

impl FftHelper {
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        let buffer = vec![Complex64::zero(); size];
        Self { fft, buffer }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Forward transform of a real sequence, zero-padded to the plan length.
    /// The returned slice is valid until the next call.
    pub fn forward_real(&mut self, input: &[f64]) -> &[Complex64] {
        for (idx, slot) in self.buffer.iter_mut().enumerate() {
            *slot = match input.get(idx) {
                Some(&value) => Complex64::new(value, 0.0),
                None => Complex64::zero(),
            };
        }
        self.fft.process(&mut self.buffer);
        &self.buffer
    }
}

/// Smallest power of two not below `n`.
pub fn fft_length(n: usize) -> usize {
    n.max(1).next_power_of_two()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fft_helper_returns_plan_length() {
        let mut helper = FftHelper::new(8);
        let output = helper.forward_real(&[1.0, 0.0, -1.0, 0.0]);
        assert_eq!(output.len(), 8);
    }

    #[test]
    fn impulse_has_flat_spectrum() {
        let mut helper = FftHelper::new(4);
        let output = helper.forward_real(&[1.0]);
        for bin in output {
            assert!((bin.re - 1.0).abs() < 1e-12);
            assert!(bin.im.abs() < 1e-12);
        }
    }

    #[test]
    fn fft_length_rounds_up() {
        assert_eq!(fft_length(500), 512);
        assert_eq!(fft_length(512), 512);
        assert_eq!(fft_length(0), 1);
    }
}
