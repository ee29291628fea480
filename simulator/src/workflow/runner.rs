use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use fkcore::processing::BandScan;
use fkcore::telemetry::MetricsSnapshot;
use fkcore::{FkEngine, FkOutcome, TraceSource};

pub struct WorkflowResult {
    pub outcome: FkOutcome,
    pub scan: Option<BandScan>,
    pub metrics: MetricsSnapshot,
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    /// Runs the configured computation. With a scan configured the full
    /// spectrum is retained and the best band replaces the configured ones.
    pub fn execute<S: TraceSource>(&self, traces: &[S]) -> anyhow::Result<WorkflowResult> {
        let mut engine = FkEngine::new();

        let Some(scan_config) = self.config.scan.as_ref() else {
            let outcome = engine
                .compute_single_band(traces, &self.config.fk, self.config.window)
                .context("computing fk grids")?;
            return Ok(WorkflowResult {
                outcome,
                scan: None,
                metrics: engine.metrics(),
            });
        };

        let window = self.config.scan_window();
        let outcome = engine
            .compute_full_spectrum(traces, window.tmin, window.tmax, &self.config.fk)
            .context("computing full spectrum")?;
        let (outcome, scan) = match outcome {
            FkOutcome::Computed(mut result) => {
                let scan = engine
                    .scan_frequency_bands(
                        &mut result,
                        scan_config.bandwidth,
                        scan_config.freq_low,
                        scan_config.freq_high,
                        scan_config.mask.as_ref(),
                    )
                    .context("scanning frequency bands")?;
                (FkOutcome::Computed(result), Some(scan))
            }
            skipped => (skipped, None),
        };

        Ok(WorkflowResult {
            outcome,
            scan,
            metrics: engine.metrics(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::profile::{build_traces, GeneratorConfig};
    use crate::workflow::config::ScanConfig;
    use fkcore::{FkConfig, FrequencyBand};

    fn generator() -> GeneratorConfig {
        GeneratorConfig {
            stations: 8,
            aperture: 2.0,
            sx: 0.1,
            sy: -0.1,
            noise: 0.0,
            ..Default::default()
        }
    }

    fn fk() -> FkConfig {
        FkConfig {
            slowness_max: 0.4,
            num_slowness: 41,
            bands: vec![FrequencyBand::new(1.5, 4.5)],
            ..Default::default()
        }
    }

    #[test]
    fn runner_locates_the_synthetic_wave() {
        let gen = generator();
        let traces = build_traces(&gen).unwrap();
        let runner = Runner::new(WorkflowConfig::from_args(gen, fk(), None));
        let result = runner.execute(&traces).unwrap();
        let fk = result.outcome.result().expect("computed");
        let peak = fk.bands[0].restricted;
        let ds = fk.geometry.d_slowness;
        assert!((peak.sx - 0.1).abs() <= ds, "sx {}", peak.sx);
        assert!((peak.sy + 0.1).abs() <= ds, "sy {}", peak.sy);
        assert!(result.scan.is_none());
        assert_eq!(result.metrics.computed, 1);
    }

    #[test]
    fn runner_scans_when_configured() {
        let gen = generator();
        let traces = build_traces(&gen).unwrap();
        let scan = ScanConfig {
            bandwidth: 1.0,
            freq_low: 0.5,
            freq_high: 8.0,
            mask: None,
        };
        let runner = Runner::new(WorkflowConfig::from_args(gen, fk(), Some(scan)));
        let result = runner.execute(&traces).unwrap();
        let fk = result.outcome.result().expect("computed");
        assert_eq!(fk.bands.len(), 1);
        let scan = result.scan.expect("scan");
        let best = scan.best_position();
        assert!(scan.positions.iter().all(|p| p.f_stat <= best.f_stat));
    }

    #[test]
    fn too_few_stations_are_skipped() {
        let gen = GeneratorConfig {
            stations: 3,
            ..generator()
        };
        let traces = build_traces(&gen).unwrap();
        let runner = Runner::new(WorkflowConfig::from_args(gen, fk(), None));
        let result = runner.execute(&traces).unwrap();
        assert!(result.outcome.is_skipped());
        assert_eq!(result.metrics.skipped, 1);
    }
}
