use crate::math::fft::{fft_length, FftHelper};
use crate::math::stats::StatsHelper;
use crate::math::taper::{apply_taper, TaperKind};
use crate::prelude::{EngineResult, FkError, FrequencyBand, TaperSpec, TimeWindow, TraceSource};
use crate::processing::buffer_pool::{try_zeroed, ScratchArena};
use crate::telemetry::log::LogManager;
use ndarray::Array2;
use num_complex::Complex64;

/// Tolerance, in samples, when converting window bounds to indices.
const INDEX_SLACK: f64 = 1.0e-6;

/// Where each usable trace's analysis window begins.
#[derive(Debug, Clone)]
pub struct WindowAlignment {
    /// `(trace index, first sample)` for every usable trace, in input order.
    pub usable: Vec<(usize, usize)>,
    /// Common window length in samples.
    pub npts: usize,
    pub windowed: bool,
    pub window_start: f64,
    pub time_shift: f64,
}

/// Retained complex spectra, one row per usable trace.
#[derive(Debug, Clone)]
pub struct Spectrum {
    /// Shape `(stations, last_bin - first_bin + 1)`, scaled by `1/nfft`.
    pub data: Array2<Complex64>,
    pub nfft: usize,
    pub dt: f64,
    pub df: f64,
    pub first_bin: usize,
    pub last_bin: usize,
    /// Inclusive bin range per requested band.
    pub band_bins: Vec<(usize, usize)>,
    pub taper: TaperKind,
    pub notes: Vec<String>,
}

impl Spectrum {
    pub fn num_stations(&self) -> usize {
        self.data.nrows()
    }

    pub fn num_bins(&self) -> usize {
        self.data.ncols()
    }

    /// Summed squared magnitude across stations for one retained bin
    /// (absolute bin number).
    pub fn bin_power(&self, bin: usize) -> f64 {
        let col = bin - self.first_bin;
        self.data.column(col).iter().map(|x| x.norm_sqr()).sum()
    }

    /// Summed squared magnitude across stations and the bins `lo..=hi`.
    pub fn band_power(&self, lo: usize, hi: usize) -> f64 {
        (lo..=hi).map(|bin| self.bin_power(bin)).sum()
    }
}

/// Bin range of a band: `floor(fmin/df)..=ceil(fmax/df)` within
/// `[0, nfft/2]`.
pub fn band_bin_range(band: &FrequencyBand, df: f64, nfft: usize) -> (usize, usize) {
    let nyquist = (nfft / 2) as f64;
    let lo = (band.fmin / df).floor().clamp(0.0, nyquist) as usize;
    let hi = (band.fmax / df).ceil().clamp(0.0, nyquist) as usize;
    (lo, hi.max(lo))
}

/// Detrends, tapers and transforms the common analysis window.
pub struct SpectralAnalyzer {
    fft: Option<FftHelper>,
    logger: LogManager,
}

impl SpectralAnalyzer {
    pub fn new() -> Self {
        Self {
            fft: None,
            logger: LogManager::new("spectrum"),
        }
    }

    /// Common sample interval, or `InconsistentSampling` when traces
    /// disagree by more than `tolerance` (relative).
    pub fn check_sampling<S: TraceSource>(traces: &[S], tolerance: f64) -> EngineResult<f64> {
        let first = traces
            .first()
            .ok_or_else(|| FkError::InvalidArguments("no input traces".into()))?;
        let dt = first.sample_interval();
        if !(dt > 0.0) {
            return Err(FkError::InvalidArguments(format!(
                "station {} has sample interval {}",
                first.station(),
                dt
            )));
        }
        for trace in traces.iter().skip(1) {
            if (trace.sample_interval() - dt).abs() > tolerance * dt {
                return Err(FkError::InconsistentSampling(format!(
                    "station {} dt {} differs from {}",
                    trace.station(),
                    trace.sample_interval(),
                    dt
                )));
            }
        }
        Ok(dt)
    }

    /// Finds the usable traces and aligns them on one absolute time span.
    ///
    /// The span is the overlap of every usable trace with the window (or
    /// with each other when no window is given). Each trace is indexed from
    /// the epoch time of the span start, so all stations cover the same
    /// instants to within a sample.
    pub fn align<S: TraceSource>(
        traces: &[S],
        window: Option<TimeWindow>,
        dt: f64,
    ) -> EngineResult<WindowAlignment> {
        if let Some(w) = window {
            if !(w.tmax > w.tmin) {
                return Err(FkError::InvalidArguments(format!(
                    "window end {} is not after start {}",
                    w.tmax, w.tmin
                )));
            }
        }

        // (trace index, covered start, covered end) in epoch seconds
        let mut covered = Vec::new();
        for (idx, trace) in traces.iter().enumerate() {
            let len = trace.len();
            if len == 0 {
                continue;
            }
            let t0 = trace.start_time();
            let t_last = t0 + (len - 1) as f64 * dt;
            let (lo, hi) = match window {
                Some(w) => (w.tmin.max(t0), w.tmax.min(t_last)),
                None => (t0, t_last),
            };
            if lo > hi + INDEX_SLACK * dt {
                continue;
            }
            covered.push((idx, lo, hi));
        }

        if covered.is_empty() {
            return Ok(WindowAlignment {
                usable: Vec::new(),
                npts: 0,
                windowed: window.is_some(),
                window_start: window.map(|w| w.tmin).unwrap_or(0.0),
                time_shift: 0.0,
            });
        }

        let common_start = covered
            .iter()
            .map(|&(_, lo, _)| lo)
            .fold(f64::NEG_INFINITY, f64::max);
        let common_end = covered
            .iter()
            .map(|&(_, _, hi)| hi)
            .fold(f64::INFINITY, f64::min);

        let mut usable = Vec::with_capacity(covered.len());
        let mut npts = usize::MAX;
        for &(idx, _, _) in &covered {
            let trace = &traces[idx];
            let t0 = trace.start_time();
            let first = ((common_start - t0) / dt - INDEX_SLACK).ceil().max(0.0);
            let last = ((common_end - t0) / dt + INDEX_SLACK)
                .floor()
                .min((trace.len() - 1) as f64);
            if last < first {
                // the traces share no common span
                npts = 0;
                usable.push((idx, first as usize));
                continue;
            }
            let (first, last) = (first as usize, last as usize);
            if trace.spans_gap(first, last) {
                return Err(FkError::DataGap(format!(
                    "station {} has a discontinuity inside the analysis window",
                    trace.station()
                )));
            }
            npts = npts.min(last - first + 1);
            usable.push((idx, first));
        }

        let (lead, lead_first) = usable[0];
        let window_start = traces[lead].start_time() + lead_first as f64 * dt;
        let earliest = usable
            .iter()
            .map(|&(idx, _)| traces[idx].start_time())
            .fold(f64::INFINITY, f64::min);

        Ok(WindowAlignment {
            usable,
            npts,
            windowed: window.is_some(),
            window_start,
            time_shift: window_start - earliest,
        })
    }

    /// Transforms every usable trace and keeps the union of the band bins.
    pub fn transform<S: TraceSource>(
        &mut self,
        traces: &[S],
        alignment: &WindowAlignment,
        bands: &[FrequencyBand],
        taper: &TaperSpec,
        dt: f64,
        arena: &mut ScratchArena,
    ) -> EngineResult<Spectrum> {
        if alignment.npts < 2 {
            return Err(FkError::InvalidArguments(format!(
                "analysis window holds {} samples",
                alignment.npts
            )));
        }
        let nfft = fft_length(alignment.npts);
        let df = 1.0 / (nfft as f64 * dt);

        let band_bins: Vec<(usize, usize)> = bands
            .iter()
            .map(|band| band_bin_range(band, df, nfft))
            .collect();
        let first_bin = band_bins.iter().map(|&(lo, _)| lo).min().unwrap_or(0);
        let last_bin = band_bins.iter().map(|&(_, hi)| hi).max().unwrap_or(0);
        let nbins = last_bin - first_bin + 1;

        let mut notes = Vec::new();
        let kind = match TaperKind::from_code(taper.code, taper.begin_pct, taper.end_pct) {
            Some(kind) => kind,
            None => {
                let note = format!("taper code {} unrecognized; no taper applied", taper.code);
                self.logger.warn(&note);
                notes.push(note);
                TaperKind::None
            }
        };

        let fft = match self.fft.take() {
            Some(helper) if helper.len() == nfft => helper,
            _ => FftHelper::new(nfft),
        };
        let fft = self.fft.insert(fft);

        let rows = alignment.usable.len();
        let cells = try_zeroed::<Complex64>(rows * nbins)?;
        let mut data = Array2::from_shape_vec((rows, nbins), cells)
            .map_err(|err| FkError::AllocationFailure(format!("spectrum shape: {}", err)))?;
        let mut work = arena.checkout(alignment.npts)?;
        let scale = 1.0 / nfft as f64;
        for (row, &(idx, first)) in alignment.usable.iter().enumerate() {
            work.copy_from_slice(&traces[idx].samples()[first..first + alignment.npts]);
            StatsHelper::demean(&mut work);
            apply_taper(kind, &mut work);
            let spectrum = fft.forward_real(&work);
            for b in 0..nbins {
                data[[row, b]] = spectrum[first_bin + b] * scale;
            }
        }
        arena.release(work);

        self.logger.debug(&format!(
            "{} traces, npts {}, nfft {}, df {:.5} Hz, bins {}..={}",
            alignment.usable.len(),
            alignment.npts,
            nfft,
            df,
            first_bin,
            last_bin
        ));

        Ok(Spectrum {
            data,
            nfft,
            dt,
            df,
            first_bin,
            last_bin,
            band_bins,
            taper: kind,
            notes,
        })
    }
}

impl Default for SpectralAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::Trace;
    use crate::prelude::StationLocation;

    fn trace(code: &str, start: f64, dt: f64, n: usize) -> Trace {
        let samples = (0..n).map(|i| (i as f64 * 0.3).sin()).collect();
        Trace::new(code, StationLocation::geographic(0.0, 0.0), start, dt, samples)
    }

    #[test]
    fn mismatched_sampling_is_rejected() {
        let traces = vec![trace("A", 0.0, 0.01, 10), trace("B", 0.0, 0.02, 10)];
        assert!(matches!(
            SpectralAnalyzer::check_sampling(&traces, 1e-4),
            Err(FkError::InconsistentSampling(_))
        ));
        let traces = vec![trace("A", 0.0, 0.01, 10), trace("B", 0.0, 0.0100001, 10)];
        assert!(SpectralAnalyzer::check_sampling(&traces, 1e-4).is_ok());
    }

    #[test]
    fn window_alignment_takes_the_shortest_overlap() {
        let traces = vec![
            trace("A", 0.0, 0.1, 100),
            trace("B", 0.5, 0.1, 100),
            trace("C", 20.0, 0.1, 100),
        ];
        let alignment =
            SpectralAnalyzer::align(&traces, Some(TimeWindow::new(1.0, 3.0)), 0.1).unwrap();
        assert_eq!(alignment.usable, vec![(0, 10), (1, 5)]);
        assert_eq!(alignment.npts, 21);
        assert!((alignment.window_start - 1.0).abs() < 1e-9);
        assert!(alignment.windowed);
    }

    #[test]
    fn staggered_starts_share_one_absolute_span() {
        let traces = vec![trace("A", 0.0, 0.1, 100), trace("B", 0.5, 0.1, 100)];

        let alignment = SpectralAnalyzer::align(&traces, None, 0.1).unwrap();
        assert_eq!(alignment.usable, vec![(0, 5), (1, 0)]);
        assert_eq!(alignment.npts, 95);
        assert!((alignment.window_start - 0.5).abs() < 1e-9);
        assert!((alignment.time_shift - 0.5).abs() < 1e-9);
        assert!(!alignment.windowed);

        // B starts inside the window, so A is cut to match it
        let alignment =
            SpectralAnalyzer::align(&traces, Some(TimeWindow::new(0.2, 3.0)), 0.1).unwrap();
        assert_eq!(alignment.usable, vec![(0, 5), (1, 0)]);
        assert_eq!(alignment.npts, 26);
        assert!((alignment.window_start - 0.5).abs() < 1e-9);
    }

    #[test]
    fn disjoint_traces_leave_no_common_samples() {
        let traces = vec![trace("A", 0.0, 0.1, 10), trace("B", 5.0, 0.1, 10)];
        let alignment = SpectralAnalyzer::align(&traces, None, 0.1).unwrap();
        assert_eq!(alignment.npts, 0);
    }

    #[test]
    fn gap_inside_window_is_a_data_gap() {
        let traces = vec![trace("A", 0.0, 0.1, 100).with_gap_at(40)];
        assert!(matches!(
            SpectralAnalyzer::align(&traces, Some(TimeWindow::new(3.0, 5.0)), 0.1),
            Err(FkError::DataGap(_))
        ));
        assert!(SpectralAnalyzer::align(&traces, Some(TimeWindow::new(4.5, 6.0)), 0.1).is_ok());
        assert!(SpectralAnalyzer::align(&traces, None, 0.1).is_err());
    }

    #[test]
    fn band_bins_round_outward() {
        let (lo, hi) = band_bin_range(&FrequencyBand::new(1.05, 2.95), 0.1, 256);
        assert_eq!((lo, hi), (10, 30));
        let (lo, hi) = band_bin_range(&FrequencyBand::new(40.0, 90.0), 0.5, 64);
        assert_eq!((lo, hi), (32, 32));
    }

    #[test]
    fn transform_keeps_union_of_bands_and_falls_back_on_unknown_taper() {
        let traces = vec![trace("A", 0.0, 0.01, 200), trace("B", 0.0, 0.01, 200)];
        let alignment = SpectralAnalyzer::align(&traces, None, 0.01).unwrap();
        let bands = vec![FrequencyBand::new(2.0, 4.0), FrequencyBand::new(6.0, 8.0)];
        let taper = TaperSpec {
            code: 99,
            ..Default::default()
        };
        let mut arena = ScratchArena::with_capacity(4);
        let mut analyzer = SpectralAnalyzer::new();
        let spectrum = analyzer
            .transform(&traces, &alignment, &bands, &taper, 0.01, &mut arena)
            .unwrap();
        assert_eq!(spectrum.nfft, 256);
        assert_eq!(spectrum.first_bin, spectrum.band_bins[0].0);
        assert_eq!(spectrum.last_bin, spectrum.band_bins[1].1);
        assert_eq!(spectrum.num_bins(), spectrum.last_bin - spectrum.first_bin + 1);
        assert_eq!(spectrum.taper, TaperKind::None);
        assert_eq!(spectrum.notes.len(), 1);
        assert!(spectrum.band_power(spectrum.first_bin, spectrum.last_bin) > 0.0);
    }
}
