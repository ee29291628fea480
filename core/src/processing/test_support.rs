use crate::array::Trace;
use crate::prelude::StationLocation;
use std::f64::consts::PI;

pub const DT: f64 = 0.01;
pub const NPTS: usize = 1024;

/// Gaussian-enveloped 3 Hz wavelet centred at 5 s.
pub fn wavelet(t: f64) -> f64 {
    let tc = 5.0;
    let sigma = 0.3;
    let u = (t - tc) / sigma;
    (-u * u).exp() * (2.0 * PI * 3.0 * (t - tc)).cos()
}

/// Traces at local offsets `(east_km, north_km)` recording a plane wave
/// whose slowness vector points back to the source at `(px, py)` s/km.
pub fn plane_wave_traces(offsets: &[(f64, f64)], px: f64, py: f64) -> Vec<Trace> {
    offsets
        .iter()
        .enumerate()
        .map(|(idx, &(east, north))| {
            let delay = -(px * east + py * north);
            let samples = (0..NPTS)
                .map(|i| wavelet(i as f64 * DT - delay))
                .collect();
            let location = StationLocation {
                lat: 40.0,
                lon: -110.0,
                dnorth: north,
                deast: east,
                reference_station: Some("REF".into()),
            };
            Trace::new(format!("ST{:02}", idx), location, 1000.0, DT, samples).with_network("XA")
        })
        .collect()
}

/// Corners of a 1 km square centred on the reference point.
pub fn square_offsets() -> Vec<(f64, f64)> {
    vec![(-0.5, -0.5), (0.5, -0.5), (-0.5, 0.5), (0.5, 0.5)]
}

/// Seven-element array: centre-less hexagon plus one outlier.
pub fn hexagon_offsets() -> Vec<(f64, f64)> {
    let mut offsets: Vec<(f64, f64)> = (0..6)
        .map(|k| {
            let angle = k as f64 * PI / 3.0 + 0.2;
            (1.2 * angle.cos(), 1.2 * angle.sin())
        })
        .collect();
    offsets.push((0.3, -0.4));
    offsets
}
