use crate::generator::profile::GeneratorConfig;
use anyhow::Context;
use fkcore::{FkConfig, SignalMask, TimeWindow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Sliding-band search over a full-spectrum result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    pub bandwidth: f64,
    pub freq_low: f64,
    pub freq_high: f64,
    #[serde(default)]
    pub mask: Option<SignalMask>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub generator: GeneratorConfig,
    pub fk: FkConfig,
    pub window: Option<TimeWindow>,
    pub scan: Option<ScanConfig>,
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(generator: GeneratorConfig, fk: FkConfig, scan: Option<ScanConfig>) -> Self {
        Self {
            generator,
            fk,
            window: None,
            scan,
        }
    }

    /// Analysis window for a full-spectrum run: the configured one, or the
    /// whole synthetic record.
    pub fn scan_window(&self) -> TimeWindow {
        self.window.unwrap_or_else(|| {
            let g = &self.generator;
            let span = g.npts.saturating_sub(1) as f64 * g.sample_interval;
            TimeWindow::new(g.start_time, g.start_time + span)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn config_from_args_keeps_engine_settings() {
        let fk = FkConfig {
            num_slowness: 31,
            ..Default::default()
        };
        let cfg = WorkflowConfig::from_args(GeneratorConfig::default(), fk, None);
        assert_eq!(cfg.fk.grid_size(), 31);
        assert!(cfg.scan.is_none());
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"generator:\n  stations: 6\n  layout: square\nfk:\n  slowness_max: 0.5\n  \
              num_slowness: 20\n  bands:\n    - fmin: 1.0\n      fmax: 4.0\n\
              scan:\n  bandwidth: 1.0\n  freq_low: 0.5\n  freq_high: 6.0\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = WorkflowConfig::load(&path).unwrap();
        assert_eq!(cfg.generator.stations, 6);
        assert_eq!(cfg.fk.grid_size(), 21);
        assert_eq!(cfg.fk.bands.len(), 1);
        assert_eq!(cfg.scan.unwrap().bandwidth, 1.0);
    }

    #[test]
    fn scan_window_defaults_to_the_record() {
        let cfg = WorkflowConfig::default();
        let window = cfg.scan_window();
        let g = &cfg.generator;
        assert_eq!(window.tmin, g.start_time);
        assert!((window.tmax - window.tmin - (g.npts - 1) as f64 * g.sample_interval).abs() < 1e-6);
    }

    #[test]
    fn missing_config_reports_the_path() {
        let err = WorkflowConfig::load("/nonexistent/fk.yaml").unwrap_err();
        assert!(format!("{}", err).contains("/nonexistent/fk.yaml"));
    }
}
