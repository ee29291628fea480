use crate::prelude::{StationLocation, TraceSource};
use serde::{Deserialize, Serialize};

/// In-memory waveform channel, the default `TraceSource`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    pub station: String,
    pub network: String,
    pub location: StationLocation,
    pub start_time: f64,
    pub sample_interval: f64,
    pub samples: Vec<f64>,
    #[serde(default)]
    pub segment_starts: Vec<usize>,
}

impl Trace {
    pub fn new(
        station: impl Into<String>,
        location: StationLocation,
        start_time: f64,
        sample_interval: f64,
        samples: Vec<f64>,
    ) -> Self {
        Self {
            station: station.into(),
            network: String::new(),
            location,
            start_time,
            sample_interval,
            samples,
            segment_starts: Vec::new(),
        }
    }

    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = network.into();
        self
    }

    /// Marks a discontinuity: a new segment begins at `index`.
    pub fn with_gap_at(mut self, index: usize) -> Self {
        self.segment_starts.push(index);
        self.segment_starts.sort_unstable();
        self
    }
}

impl TraceSource for Trace {
    fn station(&self) -> &str {
        &self.station
    }

    fn network(&self) -> &str {
        &self.network
    }

    fn location(&self) -> &StationLocation {
        &self.location
    }

    fn start_time(&self) -> f64 {
        self.start_time
    }

    fn sample_interval(&self) -> f64 {
        self.sample_interval
    }

    fn samples(&self) -> &[f64] {
        &self.samples
    }

    fn segment_starts(&self) -> &[usize] {
        &self.segment_starts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gap_detection_uses_segment_starts() {
        let trace = Trace::new(
            "STA",
            StationLocation::geographic(10.0, 20.0),
            0.0,
            0.01,
            vec![0.0; 100],
        )
        .with_gap_at(50);
        assert!(trace.spans_gap(0, 99));
        assert!(trace.spans_gap(49, 50));
        assert!(!trace.spans_gap(50, 99));
        assert!(!trace.spans_gap(0, 49));
    }
}
