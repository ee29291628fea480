pub mod band_scan;
pub mod beamform;
pub mod buffer_pool;
pub mod engine;
pub mod fine_grid;
pub mod normalize;
pub mod peak;
pub mod spectrum;

#[cfg(test)]
pub(crate) mod test_support;

pub use band_scan::{BandScan, BandScanner, ScanPosition};
pub use beamform::{BandGrid, BeamformGrid};
pub use buffer_pool::ScratchArena;
pub use engine::FkEngine;
pub use fine_grid::{FineGridRefiner, FINE_GRID_SIZE};
pub use normalize::StatisticNormalizer;
pub use peak::{GridFrame, PeakLocator};
pub use spectrum::{SpectralAnalyzer, Spectrum, WindowAlignment};
