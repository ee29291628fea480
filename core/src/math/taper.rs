use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Apodization applied to each trace before the transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TaperKind {
    None,
    Hann,
    Hamming,
    /// Half-cosine ramps over the given percentages of each end.
    Cosine {
        begin_pct: f64,
        end_pct: f64,
    },
    Parzen,
    Welch,
    Blackman,
}

impl TaperKind {
    /// Maps a taper code to its kind; `None` for codes nobody knows.
    pub fn from_code(code: i32, begin_pct: f64, end_pct: f64) -> Option<Self> {
        match code {
            0 => Some(TaperKind::None),
            1 => Some(TaperKind::Hann),
            2 => Some(TaperKind::Hamming),
            3 => Some(TaperKind::Cosine { begin_pct, end_pct }),
            4 => Some(TaperKind::Parzen),
            5 => Some(TaperKind::Welch),
            6 => Some(TaperKind::Blackman),
            _ => None,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            TaperKind::None => 0,
            TaperKind::Hann => 1,
            TaperKind::Hamming => 2,
            TaperKind::Cosine { .. } => 3,
            TaperKind::Parzen => 4,
            TaperKind::Welch => 5,
            TaperKind::Blackman => 6,
        }
    }
}

/// Multiplies `data` by the taper window in place.
pub fn apply_taper(kind: TaperKind, data: &mut [f64]) {
    let n = data.len();
    if n < 2 {
        return;
    }
    let last = (n - 1) as f64;
    match kind {
        TaperKind::None => {}
        TaperKind::Hann => {
            for (i, value) in data.iter_mut().enumerate() {
                *value *= 0.5 - 0.5 * (2.0 * PI * i as f64 / last).cos();
            }
        }
        TaperKind::Hamming => {
            for (i, value) in data.iter_mut().enumerate() {
                *value *= 0.54 - 0.46 * (2.0 * PI * i as f64 / last).cos();
            }
        }
        TaperKind::Blackman => {
            for (i, value) in data.iter_mut().enumerate() {
                let arg = 2.0 * PI * i as f64 / last;
                *value *= 0.42 - 0.5 * arg.cos() + 0.08 * (2.0 * arg).cos();
            }
        }
        TaperKind::Welch => {
            let half = last / 2.0;
            for (i, value) in data.iter_mut().enumerate() {
                let r = (i as f64 - half) / half;
                *value *= 1.0 - r * r;
            }
        }
        TaperKind::Parzen => {
            let half = last / 2.0;
            let width = n as f64 / 2.0;
            for (i, value) in data.iter_mut().enumerate() {
                let r = (i as f64 - half).abs() / width;
                let w = if r <= 0.5 {
                    1.0 - 6.0 * r * r * (1.0 - r)
                } else {
                    2.0 * (1.0 - r).powi(3)
                };
                *value *= w;
            }
        }
        TaperKind::Cosine { begin_pct, end_pct } => {
            let ramp_len = |pct: f64| -> usize {
                let len = (pct.clamp(0.0, 50.0) / 100.0 * n as f64).round() as usize;
                len.min(n / 2)
            };
            let nb = ramp_len(begin_pct);
            for i in 0..nb {
                data[i] *= 0.5 - 0.5 * (PI * i as f64 / nb as f64).cos();
            }
            let ne = ramp_len(end_pct);
            for i in 0..ne {
                data[n - 1 - i] *= 0.5 - 0.5 * (PI * i as f64 / ne as f64).cos();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_code_has_no_kind() {
        assert_eq!(TaperKind::from_code(42, 5.0, 5.0), None);
        assert_eq!(TaperKind::from_code(1, 5.0, 5.0), Some(TaperKind::Hann));
        assert_eq!(TaperKind::Hann.code(), 1);
    }

    #[test]
    fn hann_zeroes_the_ends() {
        let mut data = vec![1.0; 9];
        apply_taper(TaperKind::Hann, &mut data);
        assert!(data[0].abs() < 1e-12);
        assert!(data[8].abs() < 1e-12);
        assert!((data[4] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn cosine_taper_leaves_the_middle_alone() {
        let mut data = vec![1.0; 100];
        apply_taper(
            TaperKind::Cosine {
                begin_pct: 10.0,
                end_pct: 20.0,
            },
            &mut data,
        );
        assert_eq!(data[0], 0.0);
        assert_eq!(data[99], 0.0);
        assert!(data[5] < 1.0);
        assert!(data[85] < 1.0);
        assert_eq!(data[10], 1.0);
        assert_eq!(data[79], 1.0);
    }

    #[test]
    fn no_taper_is_identity() {
        let mut data = vec![2.0, -1.0, 3.0];
        apply_taper(TaperKind::None, &mut data);
        assert_eq!(data, vec![2.0, -1.0, 3.0]);
    }
}
