use anyhow::Context;
use fkcore::processing::BandScan;
use fkcore::{FkOutcome, FkResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandSummary {
    pub fmin: f64,
    pub fmax: f64,
    pub sx: f64,
    pub sy: f64,
    pub slowness: f64,
    pub azimuth: f64,
    pub power: f64,
    pub f_stat: f64,
    pub refined: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub bandwidth_bins: usize,
    pub positions: usize,
    pub best_f_stat: f64,
}

/// Human-readable digest of one run, written as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FkSummary {
    pub skipped: Option<usize>,
    pub num_stations: usize,
    pub reference: String,
    pub network: String,
    pub window_start: f64,
    pub window_end: f64,
    pub bands: Vec<BandSummary>,
    pub scan: Option<ScanSummary>,
    pub notes: Vec<String>,
}

impl FkSummary {
    pub fn from_outcome(outcome: &FkOutcome, scan: Option<&BandScan>) -> Self {
        match outcome {
            FkOutcome::Computed(result) => Self::from_result(result, scan),
            FkOutcome::Skipped { usable_traces } => Self {
                skipped: Some(*usable_traces),
                num_stations: *usable_traces,
                reference: String::new(),
                network: String::new(),
                window_start: 0.0,
                window_end: 0.0,
                bands: Vec::new(),
                scan: None,
                notes: Vec::new(),
            },
        }
    }

    fn from_result(result: &FkResult, scan: Option<&BandScan>) -> Self {
        let bands = result
            .bands
            .iter()
            .map(|band| BandSummary {
                fmin: band.band.fmin,
                fmax: band.band.fmax,
                sx: band.restricted.sx,
                sy: band.restricted.sy,
                slowness: band.restricted.slowness(),
                azimuth: band.restricted.azimuth(),
                power: band.restricted.value,
                f_stat: band.f_stat,
                refined: band.fine.is_some(),
            })
            .collect();
        Self {
            skipped: None,
            num_stations: result.num_stations,
            reference: result.reference.station.clone(),
            network: result.network.clone(),
            window_start: result.window_start,
            window_end: result.window_end,
            bands,
            scan: scan.map(|scan| ScanSummary {
                bandwidth_bins: scan.bandwidth_bins,
                positions: scan.positions.len(),
                best_f_stat: scan.best_position().f_stat,
            }),
            notes: result.notes.clone(),
        }
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path_ref = path.as_ref();
        let text = serde_json::to_string_pretty(self).context("serialising summary")?;
        fs::write(path_ref, text)
            .with_context(|| format!("writing summary {}", path_ref.display()))?;
        Ok(())
    }
}
