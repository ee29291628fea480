use anyhow::Context;
use clap::Parser;
use fkcore::{FkConfig, FkRecord, FrequencyBand, ResultCodec};
use generator::profile::{build_traces, ArrayLayout, GeneratorConfig};
use log::info;
use report::summary::FkSummary;
use std::path::PathBuf;
use workflow::config::{ScanConfig, WorkflowConfig};
use workflow::runner::Runner;

mod generator;
mod report;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Synthesises array data and runs the FK engine")]
struct Args {
    /// Load a workflow config from YAML; the remaining options are ignored
    #[arg(long)]
    workflow: Option<PathBuf>,
    #[arg(long, default_value_t = 9)]
    stations: usize,
    #[arg(long, value_enum, default_value_t = LayoutArg::Ring)]
    layout: LayoutArg,
    /// Array aperture, km
    #[arg(long, default_value_t = 3.0)]
    aperture: f64,
    /// Injected east slowness, s/km
    #[arg(long, default_value_t = 0.1, allow_negative_numbers = true)]
    sx: f64,
    /// Injected north slowness, s/km
    #[arg(long, default_value_t = 0.05, allow_negative_numbers = true)]
    sy: f64,
    #[arg(long, default_value_t = 0.02)]
    noise: f64,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    #[arg(long, default_value_t = 0.4)]
    slowness_max: f64,
    #[arg(long, default_value_t = 41)]
    num_slowness: usize,
    #[arg(long, default_value_t = 1.0)]
    fmin: f64,
    #[arg(long, default_value_t = 5.0)]
    fmax: f64,
    #[arg(long, default_value_t = false)]
    fine_grid: bool,
    /// Scan for the best band of this width (Hz) instead of using fmin/fmax
    #[arg(long)]
    scan_bandwidth: Option<f64>,
    /// Binary FK record output
    #[arg(long)]
    output: Option<PathBuf>,
    /// JSON summary output
    #[arg(long)]
    summary: Option<PathBuf>,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum LayoutArg {
    Square,
    Ring,
    Line,
}

impl From<LayoutArg> for ArrayLayout {
    fn from(layout: LayoutArg) -> Self {
        match layout {
            LayoutArg::Square => ArrayLayout::Square,
            LayoutArg::Ring => ArrayLayout::Ring,
            LayoutArg::Line => ArrayLayout::Line,
        }
    }
}

fn config_from_args(args: &Args) -> WorkflowConfig {
    let generator = GeneratorConfig {
        layout: args.layout.into(),
        stations: args.stations,
        aperture: args.aperture,
        sx: args.sx,
        sy: args.sy,
        noise: args.noise,
        seed: args.seed,
        ..Default::default()
    };
    let fk = FkConfig {
        slowness_max: args.slowness_max,
        num_slowness: args.num_slowness,
        bands: vec![FrequencyBand::new(args.fmin, args.fmax)],
        fine_grid: args.fine_grid,
        ..Default::default()
    };
    let scan = args.scan_bandwidth.map(|bandwidth| ScanConfig {
        bandwidth,
        freq_low: args.fmin,
        freq_high: args.fmax,
        mask: None,
    });
    WorkflowConfig::from_args(generator, fk, scan)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let workflow_config = match args.workflow.as_ref() {
        Some(path) => WorkflowConfig::load(path)?,
        None => config_from_args(&args),
    };

    let traces = build_traces(&workflow_config.generator).context("generating traces")?;
    info!(
        "generated {} traces, {} samples each",
        traces.len(),
        workflow_config.generator.npts
    );

    let runner = Runner::new(workflow_config);
    let result = runner.execute(&traces)?;
    let summary = FkSummary::from_outcome(&result.outcome, result.scan.as_ref());

    match result.outcome.result() {
        Some(fk) => {
            for band in &summary.bands {
                println!(
                    "[{:.2}, {:.2}] Hz -> slowness {:.4} s/km, azimuth {:.1} deg, power {:.3}, F {:.2}",
                    band.fmin, band.fmax, band.slowness, band.azimuth, band.power, band.f_stat
                );
            }
            if let Some(path) = args.output.as_ref() {
                ResultCodec::save(&FkRecord::from(fk), path)
                    .with_context(|| format!("writing fk record {}", path.display()))?;
            }
        }
        None => println!(
            "Skipped: only {} usable traces",
            summary.skipped.unwrap_or_default()
        ),
    }

    if let Some(path) = args.summary.as_ref() {
        summary.write_json(path)?;
    }
    info!(
        "runs computed {}, skipped {}, failed {}",
        result.metrics.computed, result.metrics.skipped, result.metrics.failed
    );

    Ok(())
}
