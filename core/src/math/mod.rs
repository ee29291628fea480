pub mod fft;
pub mod recurrence;
pub mod stats;
pub mod taper;

pub use fft::FftHelper;
pub use recurrence::AxisTable;
pub use stats::StatsHelper;
pub use taper::{apply_taper, TaperKind};
