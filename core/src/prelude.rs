use serde::{Deserialize, Serialize};

/// Maximum number of frequency bands evaluated in one computation.
pub const MAX_BANDS: usize = 4;

/// Largest grid dimension accepted by the engine and by persisted records.
pub const MAX_NUM_SLOWNESS: usize = 4097;

/// Guard added to `1 - v` when whitening beam power.
pub const WHITENING_EPSILON: f64 = 1.0e-6;

/// Fewest usable traces for which a coarse grid is evaluated.
pub const MIN_USABLE_TRACES: usize = 4;

/// Common error type for FK computations.
#[derive(thiserror::Error, Debug)]
pub enum FkError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("inconsistent sampling: {0}")]
    InconsistentSampling(String),
    #[error("data gap: {0}")]
    DataGap(String),
    #[error("allocation failure: {0}")]
    AllocationFailure(String),
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt record: {0}")]
    CorruptRecord(String),
}

pub type EngineResult<T> = Result<T, FkError>;

/// One frequency band, in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBand {
    pub fmin: f64,
    pub fmax: f64,
}

impl FrequencyBand {
    pub fn new(fmin: f64, fmax: f64) -> Self {
        Self { fmin, fmax }
    }
}

/// Taper selection as handed over by the caller: an integer kind code plus
/// the begin/end percentages used by the cosine taper.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaperSpec {
    pub code: i32,
    pub begin_pct: f64,
    pub end_pct: f64,
}

impl Default for TaperSpec {
    fn default() -> Self {
        Self {
            code: 3,
            begin_pct: 5.0,
            end_pct: 5.0,
        }
    }
}

/// Signal-region bounds. Any negative bound is unconstrained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalMask {
    pub slowness_min: f64,
    pub slowness_max: f64,
    pub azimuth_min: f64,
    pub azimuth_max: f64,
}

impl SignalMask {
    pub fn unconstrained() -> Self {
        Self {
            slowness_min: -1.0,
            slowness_max: -1.0,
            azimuth_min: -1.0,
            azimuth_max: -1.0,
        }
    }

    pub fn is_unconstrained(&self) -> bool {
        self.slowness_min < 0.0
            && self.slowness_max < 0.0
            && self.azimuth_min < 0.0
            && self.azimuth_max < 0.0
    }
}

impl Default for SignalMask {
    fn default() -> Self {
        Self::unconstrained()
    }
}

/// Explicit analysis window, in epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub tmin: f64,
    pub tmax: f64,
}

impl TimeWindow {
    pub fn new(tmin: f64, tmax: f64) -> Self {
        Self { tmin, tmax }
    }
}

/// Immutable input to one FK computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FkConfig {
    pub slowness_max: f64,
    pub num_slowness: usize,
    pub bands: Vec<FrequencyBand>,
    pub taper: TaperSpec,
    pub mask: SignalMask,
    pub full_spectrum: bool,
    pub fine_grid: bool,
    pub output_power: bool,
    /// Relative tolerance when comparing sample intervals across traces.
    pub sampling_tolerance: f64,
}

impl Default for FkConfig {
    fn default() -> Self {
        Self {
            slowness_max: 0.4,
            num_slowness: 41,
            bands: vec![FrequencyBand::new(1.0, 5.0)],
            taper: TaperSpec::default(),
            mask: SignalMask::unconstrained(),
            full_spectrum: false,
            fine_grid: false,
            output_power: false,
            sampling_tolerance: 1.0e-4,
        }
    }
}

impl FkConfig {
    /// Parses a JSON document as handed over by the display layer.
    pub fn from_json(text: &str) -> EngineResult<Self> {
        serde_json::from_str(text)
            .map_err(|err| FkError::InvalidArguments(format!("config json: {}", err)))
    }

    /// Grid dimension actually used: even requests grow by one so the grid
    /// has a zero-slowness centre row and column.
    pub fn grid_size(&self) -> usize {
        if self.num_slowness % 2 == 0 {
            self.num_slowness + 1
        } else {
            self.num_slowness
        }
    }

    pub fn d_slowness(&self) -> f64 {
        2.0 * self.slowness_max / (self.grid_size() - 1) as f64
    }

    /// Checks grid geometry and band list.
    pub fn validate(&self) -> EngineResult<()> {
        if !(self.slowness_max > 0.0) || !self.slowness_max.is_finite() {
            return Err(FkError::InvalidArguments(format!(
                "slowness_max must be positive, got {}",
                self.slowness_max
            )));
        }
        if self.grid_size() < 3 || self.grid_size() > MAX_NUM_SLOWNESS {
            return Err(FkError::InvalidArguments(format!(
                "num_slowness must describe a grid between 3x3 and {}x{}, got {}",
                MAX_NUM_SLOWNESS, MAX_NUM_SLOWNESS, self.num_slowness
            )));
        }
        self.validate_bands()
    }

    pub(crate) fn validate_bands(&self) -> EngineResult<()> {
        if self.bands.is_empty() || self.bands.len() > MAX_BANDS {
            return Err(FkError::InvalidArguments(format!(
                "band count must be within 1..={}, got {}",
                MAX_BANDS,
                self.bands.len()
            )));
        }
        for (idx, band) in self.bands.iter().enumerate() {
            if !(band.fmin >= 0.0) || !(band.fmin < band.fmax) {
                return Err(FkError::InvalidArguments(format!(
                    "band {} requires 0 <= fmin < fmax, got [{}, {}]",
                    idx, band.fmin, band.fmax
                )));
            }
        }
        Ok(())
    }
}

/// Geographic and local position of a station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationLocation {
    pub lat: f64,
    pub lon: f64,
    /// Offset north of the array reference point, km.
    pub dnorth: f64,
    /// Offset east of the array reference point, km.
    pub deast: f64,
    pub reference_station: Option<String>,
}

/// Sentinel for an unknown latitude or longitude.
pub const UNKNOWN_COORDINATE: f64 = -999.0;

impl StationLocation {
    pub fn geographic(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            dnorth: 0.0,
            deast: 0.0,
            reference_station: None,
        }
    }

    pub fn has_offset(&self) -> bool {
        self.dnorth != 0.0 || self.deast != 0.0
    }

    pub fn has_geographic(&self) -> bool {
        self.lat >= -90.0
            && self.lat != UNKNOWN_COORDINATE
            && self.lon >= -180.0
            && self.lon != UNKNOWN_COORDINATE
    }
}

/// Read access to one sensor channel. Storage layers implement this to feed
/// the engine without copying samples.
pub trait TraceSource {
    fn station(&self) -> &str;
    fn network(&self) -> &str;
    fn location(&self) -> &StationLocation;
    /// Epoch time of the first sample.
    fn start_time(&self) -> f64;
    fn sample_interval(&self) -> f64;
    fn samples(&self) -> &[f64];
    /// Sample indices at which a new contiguous segment begins.
    fn segment_starts(&self) -> &[usize];

    fn len(&self) -> usize {
        self.samples().len()
    }

    fn is_empty(&self) -> bool {
        self.samples().is_empty()
    }

    /// True when a discontinuity falls inside `[first, last]`.
    fn spans_gap(&self, first: usize, last: usize) -> bool {
        self.segment_starts()
            .iter()
            .any(|&start| start > first && start <= last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_grid_request_grows_to_odd() {
        let config = FkConfig {
            slowness_max: 0.5,
            num_slowness: 20,
            ..Default::default()
        };
        assert_eq!(config.grid_size(), 21);
        let half = config.d_slowness() * (config.grid_size() - 1) as f64 / 2.0;
        assert!((half - config.slowness_max).abs() < 1e-12);
    }

    #[test]
    fn inverted_band_is_rejected() {
        let config = FkConfig {
            bands: vec![FrequencyBand::new(5.0, 2.0)],
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(FkError::InvalidArguments(_))
        ));
    }

    #[test]
    fn band_count_is_bounded() {
        let mut config = FkConfig {
            bands: Vec::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
        config.bands = vec![FrequencyBand::new(1.0, 2.0); MAX_BANDS + 1];
        assert!(config.validate().is_err());
    }

    #[test]
    fn oversized_grid_is_rejected() {
        let mut config = FkConfig {
            num_slowness: MAX_NUM_SLOWNESS,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        config.num_slowness = MAX_NUM_SLOWNESS + 1;
        assert!(matches!(
            config.validate(),
            Err(FkError::InvalidArguments(_))
        ));
    }

    #[test]
    fn single_point_grid_is_rejected() {
        let config = FkConfig {
            num_slowness: 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let config = FkConfig {
            slowness_max: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_json_fills_defaults() {
        let config = FkConfig::from_json(r#"{"slowness_max": 0.3, "num_slowness": 30}"#).unwrap();
        assert_eq!(config.grid_size(), 31);
        assert_eq!(config.bands.len(), 1);
        assert!(config.mask.is_unconstrained());
    }
}
