use crate::array::{ArrayGeometry, CoordinateResolver};
use crate::prelude::{
    EngineResult, FkConfig, FkError, SignalMask, TimeWindow, TraceSource, MIN_USABLE_TRACES,
};
use crate::processing::band_scan::{BandScan, BandScanner};
use crate::processing::beamform::BeamformGrid;
use crate::processing::buffer_pool::ScratchArena;
use crate::processing::fine_grid::FineGridRefiner;
use crate::processing::normalize::StatisticNormalizer;
use crate::processing::peak::{GridFrame, PeakLocator};
use crate::processing::spectrum::{SpectralAnalyzer, Spectrum, WindowAlignment};
use crate::result::{BandResult, FkOutcome, FkResult, GridGeometry, GridPeak, SpectrumCube};
use crate::telemetry::log::LogManager;
use crate::telemetry::metrics::{MetricsRecorder, MetricsSnapshot};

/// Scratch buffers kept between calls: spectral work area plus two
/// cos/sin tables per slowness axis.
const ARENA_BUFFERS: usize = 8;

/// Everything the grid stages need once the traces are transformed.
struct Prepared {
    alignment: WindowAlignment,
    array: ArrayGeometry,
    spectrum: Spectrum,
    grid: GridGeometry,
}

enum Preparation {
    Ready(Box<Prepared>),
    Skipped(usize),
}

/// Entry point for FK computations. Owns reusable scratch space; one
/// engine serves one caller at a time.
pub struct FkEngine {
    arena: ScratchArena,
    analyzer: SpectralAnalyzer,
    resolver: CoordinateResolver,
    refiner: FineGridRefiner,
    scanner: BandScanner,
    logger: LogManager,
    metrics: MetricsRecorder,
}

impl FkEngine {
    pub fn new() -> Self {
        Self {
            arena: ScratchArena::with_capacity(ARENA_BUFFERS),
            analyzer: SpectralAnalyzer::new(),
            resolver: CoordinateResolver::new(),
            refiner: FineGridRefiner::new(),
            scanner: BandScanner::new(),
            logger: LogManager::new("engine"),
            metrics: MetricsRecorder::new(),
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Coarse grid per configured band (plus fine grids when enabled, and
    /// the spectrum cube when `full_spectrum` is set).
    pub fn compute_single_band<S: TraceSource>(
        &mut self,
        traces: &[S],
        config: &FkConfig,
        window: Option<TimeWindow>,
    ) -> EngineResult<FkOutcome> {
        let outcome = self.run_single_band(traces, config, window);
        self.track(&outcome);
        outcome
    }

    /// Retains the per-bin beam power cube over `[tmin, tmax]` for later
    /// band scanning. No band grids are evaluated.
    pub fn compute_full_spectrum<S: TraceSource>(
        &mut self,
        traces: &[S],
        tmin: f64,
        tmax: f64,
        config: &FkConfig,
    ) -> EngineResult<FkOutcome> {
        let outcome = self.run_full_spectrum(traces, TimeWindow::new(tmin, tmax), config);
        self.track(&outcome);
        outcome
    }

    /// Slides a `bandwidth_hz` band across `[freq_low, freq_high]` of a
    /// full-spectrum result and keeps the best placement as its only band.
    pub fn scan_frequency_bands(
        &mut self,
        result: &mut FkResult,
        bandwidth_hz: f64,
        freq_low: f64,
        freq_high: f64,
        mask: Option<&SignalMask>,
    ) -> EngineResult<BandScan> {
        let scan = self
            .scanner
            .scan(result, bandwidth_hz, freq_low, freq_high, mask);
        if scan.is_err() {
            self.metrics.record_error();
        }
        scan
    }

    fn track(&self, outcome: &EngineResult<FkOutcome>) {
        match outcome {
            Ok(FkOutcome::Computed(_)) => self.metrics.record_computed(),
            Ok(FkOutcome::Skipped { usable_traces }) => {
                self.logger.warn(&format!(
                    "only {} usable traces after window alignment; grid not evaluated",
                    usable_traces
                ));
                self.metrics.record_skipped();
            }
            Err(err) => {
                self.logger.warn(&format!("computation failed: {}", err));
                self.metrics.record_error();
            }
        }
    }

    fn prepare<S: TraceSource>(
        &mut self,
        traces: &[S],
        config: &FkConfig,
        window: Option<TimeWindow>,
    ) -> EngineResult<Preparation> {
        config.validate()?;
        if traces.is_empty() {
            return Err(FkError::InvalidArguments("no input traces".into()));
        }
        let dt = SpectralAnalyzer::check_sampling(traces, config.sampling_tolerance)?;
        let alignment = SpectralAnalyzer::align(traces, window, dt)?;
        if alignment.usable.len() < MIN_USABLE_TRACES {
            return Ok(Preparation::Skipped(alignment.usable.len()));
        }

        let usable: Vec<&S> = alignment.usable.iter().map(|&(idx, _)| &traces[idx]).collect();
        let array = self.resolver.resolve(&usable)?;
        let spectrum = self.analyzer.transform(
            traces,
            &alignment,
            &config.bands,
            &config.taper,
            dt,
            &mut self.arena,
        )?;
        let grid = GridGeometry::new(config.grid_size(), config.slowness_max);

        Ok(Preparation::Ready(Box::new(Prepared {
            alignment,
            array,
            spectrum,
            grid,
        })))
    }

    fn run_single_band<S: TraceSource>(
        &mut self,
        traces: &[S],
        config: &FkConfig,
        window: Option<TimeWindow>,
    ) -> EngineResult<FkOutcome> {
        let prepared = match self.prepare(traces, config, window)? {
            Preparation::Ready(prepared) => prepared,
            Preparation::Skipped(usable) => {
                return Ok(FkOutcome::Skipped {
                    usable_traces: usable,
                })
            }
        };
        let mask = PeakLocator::build_mask(&config.mask, prepared.grid)?;

        let beam = BeamformGrid::prepare(
            &prepared.spectrum,
            &prepared.array.positions,
            prepared.grid,
            &mut self.arena,
        )?;
        let evaluated = self.evaluate_bands(&beam, &prepared, config, mask.as_ref());
        let cube = if config.full_spectrum && evaluated.is_ok() {
            Some(beam.cube())
        } else {
            None
        };
        beam.release(&mut self.arena);
        let bands = evaluated?;
        let cube = cube.transpose()?;

        let result = self.assemble(traces, &prepared, config, bands, cube);
        self.logger.record(&format!(
            "{} stations, {} bands, reference {}",
            result.num_stations,
            result.bands.len(),
            result.reference.station
        ));
        Ok(FkOutcome::Computed(result))
    }

    fn run_full_spectrum<S: TraceSource>(
        &mut self,
        traces: &[S],
        window: TimeWindow,
        config: &FkConfig,
    ) -> EngineResult<FkOutcome> {
        let prepared = match self.prepare(traces, config, Some(window))? {
            Preparation::Ready(prepared) => prepared,
            Preparation::Skipped(usable) => {
                return Ok(FkOutcome::Skipped {
                    usable_traces: usable,
                })
            }
        };
        let beam = BeamformGrid::prepare(
            &prepared.spectrum,
            &prepared.array.positions,
            prepared.grid,
            &mut self.arena,
        )?;
        let cube = beam.cube();
        beam.release(&mut self.arena);
        let cube = cube?;

        let result = self.assemble(traces, &prepared, config, Vec::new(), Some(cube));
        self.logger.record(&format!(
            "{} stations, cube bins {}..={}",
            result.num_stations, result.first_bin, result.last_bin
        ));
        Ok(FkOutcome::Computed(result))
    }

    fn evaluate_bands(
        &self,
        beam: &BeamformGrid<'_>,
        prepared: &Prepared,
        config: &FkConfig,
        mask: Option<&ndarray::Array2<bool>>,
    ) -> EngineResult<Vec<BandResult>> {
        let grid = prepared.grid;
        let frame = GridFrame::from(grid);
        let nsta = prepared.spectrum.num_stations();
        let mut bands = Vec::with_capacity(config.bands.len());

        for (band, &(lo, hi)) in config.bands.iter().zip(prepared.spectrum.band_bins.iter()) {
            let power = beam.band(lo, hi)?;
            let empty = || FkError::InvalidArguments("empty slowness grid".into());
            let mut unmasked = PeakLocator::find(&power.values, &frame, None).ok_or_else(empty)?;
            let mut restricted =
                PeakLocator::find(&power.values, &frame, mask).ok_or_else(empty)?;

            let mut fine = None;
            if config.fine_grid && frame.is_interior(restricted.row, restricted.col) {
                fine = self.refiner.evaluate(
                    &prepared.spectrum,
                    &prepared.array.positions,
                    lo,
                    hi,
                    power.scale,
                    (grid.coordinate(restricted.col), grid.coordinate(restricted.row)),
                    grid.d_slowness,
                )?;
                if let Some(fine_grid) = fine.as_ref() {
                    let fine_peak = fine_grid.peak;
                    if fine_peak.value > restricted.value {
                        restricted = GridPeak {
                            value: fine_peak.value,
                            sx: fine_peak.sx,
                            sy: fine_peak.sy,
                            ..restricted
                        };
                    }
                    // the fine cells are also candidates for the unmasked peak
                    if restricted.value > unmasked.value {
                        unmasked = restricted;
                    }
                }
            }

            let mut result = BandResult {
                band: *band,
                bin_lo: lo,
                bin_hi: hi,
                grid: power.values,
                max_power: power.max_power,
                unmasked,
                restricted,
                total_power: power.total_power,
                scale: power.scale,
                f_stat: 0.0,
                fine,
            };
            StatisticNormalizer::normalize_band(&mut result, nsta, config.output_power);
            self.logger.debug(&format!(
                "band [{}, {}] Hz: peak {:.4} at ({:.4}, {:.4}), F {:.3}",
                band.fmin,
                band.fmax,
                result.restricted.value,
                result.restricted.sx,
                result.restricted.sy,
                result.f_stat
            ));
            bands.push(result);
        }
        Ok(bands)
    }

    fn assemble<S: TraceSource>(
        &self,
        traces: &[S],
        prepared: &Prepared,
        config: &FkConfig,
        bands: Vec<BandResult>,
        cube: Option<SpectrumCube>,
    ) -> FkResult {
        let alignment = &prepared.alignment;
        let spectrum = &prepared.spectrum;
        let lead = &traces[alignment.usable[0].0];
        let stations = alignment
            .usable
            .iter()
            .map(|&(idx, _)| traces[idx].station().to_string())
            .collect();

        FkResult {
            num_stations: alignment.usable.len(),
            stations,
            network: lead.network().to_string(),
            windowed: alignment.windowed,
            time_shift: alignment.time_shift,
            window_start: alignment.window_start,
            window_end: alignment.window_start + (alignment.npts - 1) as f64 * spectrum.dt,
            sample_interval: spectrum.dt,
            df: spectrum.df,
            nfft: spectrum.nfft,
            first_bin: spectrum.first_bin,
            last_bin: spectrum.last_bin,
            geometry: prepared.grid,
            reference: prepared.array.reference.clone(),
            taper: spectrum.taper,
            output_power: config.output_power,
            bands,
            cube,
            notes: spectrum.notes.clone(),
        }
    }
}

impl Default for FkEngine {
    fn default() -> Self {
        Self::new()
    }
}
