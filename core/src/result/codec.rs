//! Flat binary FK record.
//!
//! Layout, native byte order, no padding:
//!
//! ```text
//! i32 num_stations, f64 time_shift, char[10] network, i32 windowed,
//! i32 num_bands, f64 window_start, f64 window_end, f64 slowness_max,
//! i32 num_slowness, f64 d_slowness, f64[nb] fmin, f64[nb] fmax,
//! char[10] center_station, f64 center_lat, f64 center_lon,
//! f64[nb] local_average, f64[nb] peak_x, f64[nb] peak_y,
//! f64[nb] peak_value, f64 window_end (again),
//! nb x f32[num_slowness * num_slowness] grid
//! ```

use crate::prelude::{EngineResult, FkError, MAX_BANDS, MAX_NUM_SLOWNESS};
use crate::processing::buffer_pool::try_zeroed;
use crate::result::FkResult;
use byteorder::{NativeEndian, ReadBytesExt, WriteBytesExt};
use ndarray::Array2;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Width of the fixed station/network code fields.
pub const CODE_LEN: usize = 10;

/// The persisted view of an `FkResult`.
#[derive(Debug, Clone, PartialEq)]
pub struct FkRecord {
    pub num_stations: i32,
    pub time_shift: f64,
    pub network: String,
    pub windowed: bool,
    pub window_start: f64,
    pub window_end: f64,
    pub slowness_max: f64,
    pub num_slowness: i32,
    pub d_slowness: f64,
    pub fmin: Vec<f64>,
    pub fmax: Vec<f64>,
    pub center_station: String,
    pub center_lat: f64,
    pub center_lon: f64,
    /// Reserved; written as zero.
    pub local_average: Vec<f64>,
    pub peak_x: Vec<f64>,
    pub peak_y: Vec<f64>,
    pub peak_value: Vec<f64>,
    pub grids: Vec<Array2<f32>>,
}

impl FkRecord {
    pub fn num_bands(&self) -> usize {
        self.fmin.len()
    }
}

/// Longest prefix of `code` that fits the fixed field without splitting a
/// character.
fn fixed_code(code: &str) -> String {
    let mut end = code.len().min(CODE_LEN);
    while !code.is_char_boundary(end) {
        end -= 1;
    }
    code[..end].to_string()
}

impl From<&FkResult> for FkRecord {
    fn from(result: &FkResult) -> Self {
        let bands = &result.bands;
        Self {
            num_stations: result.num_stations as i32,
            time_shift: result.time_shift,
            network: fixed_code(&result.network),
            windowed: result.windowed,
            window_start: result.window_start,
            window_end: result.window_end,
            slowness_max: result.geometry.slowness_max,
            num_slowness: result.geometry.size as i32,
            d_slowness: result.geometry.d_slowness,
            fmin: bands.iter().map(|b| b.band.fmin).collect(),
            fmax: bands.iter().map(|b| b.band.fmax).collect(),
            center_station: fixed_code(&result.reference.station),
            center_lat: result.reference.lat,
            center_lon: result.reference.lon,
            local_average: vec![0.0; bands.len()],
            peak_x: bands.iter().map(|b| b.restricted.sx).collect(),
            peak_y: bands.iter().map(|b| b.restricted.sy).collect(),
            peak_value: bands.iter().map(|b| b.restricted.value).collect(),
            grids: bands.iter().map(|b| b.grid.mapv(|v| v as f32)).collect(),
        }
    }
}

/// Reads and writes `FkRecord`s.
pub struct ResultCodec;

impl ResultCodec {
    pub fn write<W: Write>(record: &FkRecord, out: &mut W) -> EngineResult<()> {
        let nb = record.num_bands();
        let n = usize::try_from(record.num_slowness)
            .ok()
            .filter(|&n| n <= MAX_NUM_SLOWNESS)
            .ok_or_else(|| {
                FkError::CorruptRecord(format!(
                    "num_slowness {} outside 0..={}",
                    record.num_slowness, MAX_NUM_SLOWNESS
                ))
            })?;
        let per_band = [
            record.fmax.len(),
            record.local_average.len(),
            record.peak_x.len(),
            record.peak_y.len(),
            record.peak_value.len(),
            record.grids.len(),
        ];
        if nb > MAX_BANDS || per_band.iter().any(|&len| len != nb) {
            return Err(FkError::CorruptRecord(format!(
                "per-band fields disagree on band count {}",
                nb
            )));
        }
        if record.grids.iter().any(|grid| grid.dim() != (n, n)) {
            return Err(FkError::CorruptRecord(format!(
                "grid shape differs from {}x{}",
                n, n
            )));
        }

        out.write_i32::<NativeEndian>(record.num_stations)?;
        out.write_f64::<NativeEndian>(record.time_shift)?;
        write_code(out, &record.network)?;
        out.write_i32::<NativeEndian>(record.windowed as i32)?;
        out.write_i32::<NativeEndian>(nb as i32)?;
        out.write_f64::<NativeEndian>(record.window_start)?;
        out.write_f64::<NativeEndian>(record.window_end)?;
        out.write_f64::<NativeEndian>(record.slowness_max)?;
        out.write_i32::<NativeEndian>(record.num_slowness)?;
        out.write_f64::<NativeEndian>(record.d_slowness)?;
        for value in record.fmin.iter().chain(&record.fmax) {
            out.write_f64::<NativeEndian>(*value)?;
        }
        write_code(out, &record.center_station)?;
        out.write_f64::<NativeEndian>(record.center_lat)?;
        out.write_f64::<NativeEndian>(record.center_lon)?;
        let peaks = record
            .local_average
            .iter()
            .chain(&record.peak_x)
            .chain(&record.peak_y)
            .chain(&record.peak_value);
        for value in peaks {
            out.write_f64::<NativeEndian>(*value)?;
        }
        out.write_f64::<NativeEndian>(record.window_end)?;
        for grid in &record.grids {
            for value in grid.iter() {
                out.write_f32::<NativeEndian>(*value)?;
            }
        }
        Ok(())
    }

    pub fn read<R: Read>(input: &mut R) -> EngineResult<FkRecord> {
        let num_stations = input.read_i32::<NativeEndian>()?;
        let time_shift = input.read_f64::<NativeEndian>()?;
        let network = read_code(input)?;
        let windowed = input.read_i32::<NativeEndian>()? != 0;
        let nb = input.read_i32::<NativeEndian>()?;
        let nb = usize::try_from(nb)
            .ok()
            .filter(|&nb| nb <= MAX_BANDS)
            .ok_or_else(|| FkError::CorruptRecord(format!("band count {}", nb)))?;
        let window_start = input.read_f64::<NativeEndian>()?;
        let window_end = input.read_f64::<NativeEndian>()?;
        let slowness_max = input.read_f64::<NativeEndian>()?;
        let num_slowness = input.read_i32::<NativeEndian>()?;
        let n = usize::try_from(num_slowness)
            .ok()
            .filter(|&n| n <= MAX_NUM_SLOWNESS)
            .ok_or_else(|| FkError::CorruptRecord(format!("num_slowness {}", num_slowness)))?;
        let d_slowness = input.read_f64::<NativeEndian>()?;
        let fmin = read_f64s(input, nb)?;
        let fmax = read_f64s(input, nb)?;
        let center_station = read_code(input)?;
        let center_lat = input.read_f64::<NativeEndian>()?;
        let center_lon = input.read_f64::<NativeEndian>()?;
        let local_average = read_f64s(input, nb)?;
        let peak_x = read_f64s(input, nb)?;
        let peak_y = read_f64s(input, nb)?;
        let peak_value = read_f64s(input, nb)?;
        // duplicate of window_end
        input.read_f64::<NativeEndian>()?;

        let mut grids = Vec::with_capacity(nb);
        for _ in 0..nb {
            let mut values = try_zeroed::<f32>(n * n)?;
            input.read_f32_into::<NativeEndian>(&mut values)?;
            let grid = Array2::from_shape_vec((n, n), values)
                .map_err(|err| FkError::CorruptRecord(format!("grid shape: {}", err)))?;
            grids.push(grid);
        }

        Ok(FkRecord {
            num_stations,
            time_shift,
            network,
            windowed,
            window_start,
            window_end,
            slowness_max,
            num_slowness,
            d_slowness,
            fmin,
            fmax,
            center_station,
            center_lat,
            center_lon,
            local_average,
            peak_x,
            peak_y,
            peak_value,
            grids,
        })
    }

    pub fn save<P: AsRef<Path>>(record: &FkRecord, path: P) -> EngineResult<()> {
        let mut out = BufWriter::new(File::create(path)?);
        Self::write(record, &mut out)?;
        out.flush()?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> EngineResult<FkRecord> {
        let mut input = BufReader::new(File::open(path)?);
        Self::read(&mut input)
    }
}

fn write_code<W: Write>(out: &mut W, code: &str) -> EngineResult<()> {
    let mut field = [0u8; CODE_LEN];
    let code = fixed_code(code);
    field[..code.len()].copy_from_slice(code.as_bytes());
    out.write_all(&field)?;
    Ok(())
}

fn read_code<R: Read>(input: &mut R) -> EngineResult<String> {
    let mut field = [0u8; CODE_LEN];
    input.read_exact(&mut field)?;
    let end = field.iter().position(|&b| b == 0).unwrap_or(CODE_LEN);
    String::from_utf8(field[..end].to_vec())
        .map_err(|err| FkError::CorruptRecord(format!("code field: {}", err)))
}

fn read_f64s<R: Read>(input: &mut R, count: usize) -> EngineResult<Vec<f64>> {
    let mut values = vec![0.0; count];
    input.read_f64_into::<NativeEndian>(&mut values)?;
    Ok(values)
}
