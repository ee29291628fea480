//! Frequency-wavenumber (FK) beamforming for seismic and infrasound arrays.
//!
//! Traces are transformed once, beam power is accumulated over a square
//! slowness grid per frequency band, and the coherent peak is located,
//! refined and normalised. Results can be persisted in a flat binary record.

pub mod array;
pub mod math;
pub mod prelude;
pub mod processing;
pub mod result;
pub mod telemetry;

pub use array::{ArrayGeometry, ReferencePoint, Trace};
pub use prelude::{
    EngineResult, FkConfig, FkError, FrequencyBand, SignalMask, StationLocation, TaperSpec,
    TimeWindow, TraceSource,
};
pub use processing::{BandScan, FkEngine};
pub use result::{FkOutcome, FkRecord, FkResult, ResultCodec};
