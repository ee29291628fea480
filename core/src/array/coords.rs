use crate::prelude::{EngineResult, FkError, TraceSource};
use crate::telemetry::log::LogManager;

/// Mean Earth radius, km.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Kilometres per degree of arc on the mean sphere.
pub const DEG_TO_KM: f64 = EARTH_RADIUS_KM * std::f64::consts::PI / 180.0;

/// Positions closer than this (degrees) count as the same site.
const DISTINCT_TOLERANCE_DEG: f64 = 1.0e-9;

/// Station that defines the origin of the local planar frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferencePoint {
    pub station: String,
    pub lat: f64,
    pub lon: f64,
}

/// Array-centred planar coordinates, one entry per input trace.
#[derive(Debug, Clone)]
pub struct ArrayGeometry {
    /// `(east_km, north_km)` in input order.
    pub positions: Vec<(f64, f64)>,
    pub reference: ReferencePoint,
}

impl ArrayGeometry {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Converts station locations into the local east/north frame.
pub struct CoordinateResolver {
    logger: LogManager,
}

impl CoordinateResolver {
    pub fn new() -> Self {
        Self {
            logger: LogManager::new("coords"),
        }
    }

    pub fn resolve<S: TraceSource>(&self, traces: &[&S]) -> EngineResult<ArrayGeometry> {
        let first = traces
            .first()
            .ok_or_else(|| FkError::InvalidArguments("no traces to locate".into()))?;

        if traces.iter().all(|trace| trace.location().has_offset()) {
            let location = first.location();
            let station = location
                .reference_station
                .clone()
                .unwrap_or_else(|| first.station().to_string());
            let reference = ReferencePoint {
                station,
                lat: location.lat - location.dnorth / DEG_TO_KM,
                lon: location.lon - location.deast / DEG_TO_KM,
            };
            self.logger.debug(&format!(
                "using stored offsets for {} stations, reference {}",
                traces.len(),
                reference.station
            ));
            let positions = traces
                .iter()
                .map(|trace| (trace.location().deast, trace.location().dnorth))
                .collect();
            return Ok(ArrayGeometry {
                positions,
                reference,
            });
        }

        if let Some(bad) = traces.iter().find(|t| !t.location().has_geographic()) {
            return Err(FkError::InvalidArguments(format!(
                "station {} has no usable location",
                bad.station()
            )));
        }

        // Distinct sites, keeping the first trace seen at each.
        let mut distinct: Vec<usize> = Vec::new();
        for (idx, trace) in traces.iter().enumerate() {
            let loc = trace.location();
            let seen = distinct.iter().any(|&d| {
                let other = traces[d].location();
                (other.lat - loc.lat).abs() < DISTINCT_TOLERANCE_DEG
                    && (other.lon - loc.lon).abs() < DISTINCT_TOLERANCE_DEG
            });
            if !seen {
                distinct.push(idx);
            }
        }
        if distinct.len() < 2 {
            return Err(FkError::InvalidArguments(
                "fewer than two distinct station locations".into(),
            ));
        }

        let sites: Vec<(f64, f64)> = distinct
            .iter()
            .map(|&d| (traces[d].location().lat, traces[d].location().lon))
            .collect();
        let (clat, clon) = spherical_centroid(&sites);

        let mut nearest = 0;
        let mut best = f64::MAX;
        for (idx, &(lat, lon)) in sites.iter().enumerate() {
            let dist = ((lat - clat).powi(2) + (lon - clon).powi(2)).sqrt();
            if dist < best {
                best = dist;
                nearest = idx;
            }
        }
        let ref_trace = traces[distinct[nearest]];
        let reference = ReferencePoint {
            station: ref_trace.station().to_string(),
            lat: ref_trace.location().lat,
            lon: ref_trace.location().lon,
        };
        self.logger.debug(&format!(
            "centroid ({:.5}, {:.5}) -> reference {}",
            clat, clon, reference.station
        ));

        let positions = traces
            .iter()
            .map(|trace| {
                let loc = trace.location();
                local_offset(reference.lat, reference.lon, loc.lat, loc.lon)
            })
            .collect();

        Ok(ArrayGeometry {
            positions,
            reference,
        })
    }
}

impl Default for CoordinateResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Centroid of `(lat, lon)` degree pairs on the unit sphere.
pub fn spherical_centroid(sites: &[(f64, f64)]) -> (f64, f64) {
    let (mut x, mut y, mut z) = (0.0, 0.0, 0.0);
    for &(lat, lon) in sites {
        let (lat, lon) = (lat.to_radians(), lon.to_radians());
        x += lat.cos() * lon.cos();
        y += lat.cos() * lon.sin();
        z += lat.sin();
    }
    let n = sites.len().max(1) as f64;
    let (x, y, z) = (x / n, y / n, z / n);
    if (x * x + y * y + z * z).sqrt() < 1.0e-12 {
        return sites.first().copied().unwrap_or((0.0, 0.0));
    }
    let lat = z.atan2((x * x + y * y).sqrt()).to_degrees();
    let lon = y.atan2(x).to_degrees();
    (lat, lon)
}

/// `(east_km, north_km)` of a site relative to a reference point.
///
/// The site is rotated by the Euler angles (reference longitude, reference
/// colatitude, 90 degrees) so the reference sits on the pole with east along
/// +x and north along +y; the planar position is the arc distance from the
/// pole along the rotated azimuth.
pub fn local_offset(ref_lat: f64, ref_lon: f64, lat: f64, lon: f64) -> (f64, f64) {
    let (lat, lon) = (lat.to_radians(), lon.to_radians());
    let x = lat.cos() * lon.cos();
    let y = lat.cos() * lon.sin();
    let z = lat.sin();

    let phi = ref_lon.to_radians();
    let x1 = x * phi.cos() + y * phi.sin();
    let y1 = -x * phi.sin() + y * phi.cos();

    let colat = (90.0 - ref_lat).to_radians();
    let x2 = x1 * colat.cos() - z * colat.sin();
    let z2 = x1 * colat.sin() + z * colat.cos();

    let east = y1;
    let north = -x2;
    let rho = (east * east + north * north).sqrt();
    if rho < 1.0e-15 {
        return (0.0, 0.0);
    }
    let delta = rho.atan2(z2);
    let arc = EARTH_RADIUS_KM * delta;
    (arc * east / rho, arc * north / rho)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::trace::Trace;
    use crate::prelude::StationLocation;

    fn station(code: &str, location: StationLocation) -> Trace {
        Trace::new(code, location, 0.0, 0.01, vec![0.0; 8])
    }

    #[test]
    fn offsets_are_used_when_every_station_has_one() {
        let mut loc = StationLocation::geographic(40.0, -110.0);
        loc.dnorth = 0.5;
        loc.deast = -0.5;
        loc.reference_station = Some("REF".into());
        let mut other = loc.clone();
        other.dnorth = -0.5;
        other.deast = 0.5;
        let traces = vec![station("A1", loc), station("A2", other)];
        let refs: Vec<&Trace> = traces.iter().collect();

        let geometry = CoordinateResolver::new().resolve(&refs).unwrap();
        assert_eq!(geometry.positions, vec![(-0.5, 0.5), (0.5, -0.5)]);
        assert_eq!(geometry.reference.station, "REF");
        assert!((geometry.reference.lat - (40.0 - 0.5 / DEG_TO_KM)).abs() < 1e-12);
    }

    #[test]
    fn co_located_stations_are_rejected() {
        let traces: Vec<Trace> = (0..4)
            .map(|i| station(&format!("S{}", i), StationLocation::geographic(10.0, 20.0)))
            .collect();
        let refs: Vec<&Trace> = traces.iter().collect();
        assert!(matches!(
            CoordinateResolver::new().resolve(&refs),
            Err(FkError::InvalidArguments(_))
        ));
    }

    #[test]
    fn unknown_location_is_rejected() {
        let traces = vec![
            station("A", StationLocation::geographic(10.0, 20.0)),
            station("B", StationLocation::geographic(-999.0, 20.0)),
        ];
        let refs: Vec<&Trace> = traces.iter().collect();
        assert!(CoordinateResolver::new().resolve(&refs).is_err());
    }

    #[test]
    fn centre_station_of_a_line_becomes_reference() {
        let traces = vec![
            station("W", StationLocation::geographic(0.0, -0.02)),
            station("C", StationLocation::geographic(0.0, 0.0)),
            station("E", StationLocation::geographic(0.0, 0.02)),
        ];
        let refs: Vec<&Trace> = traces.iter().collect();
        let geometry = CoordinateResolver::new().resolve(&refs).unwrap();
        assert_eq!(geometry.reference.station, "C");
        let (east, north) = geometry.positions[2];
        assert!((east - 0.02 * DEG_TO_KM).abs() < 1e-6);
        assert!(north.abs() < 1e-9);
        assert!(geometry.positions[0].0 < 0.0);
    }

    #[test]
    fn local_offset_points_north_and_east() {
        let (east, north) = local_offset(45.0, 10.0, 45.01, 10.0);
        assert!(east.abs() < 1e-9);
        assert!((north - 0.01 * DEG_TO_KM).abs() < 1e-6);

        let (east, north) = local_offset(45.0, 10.0, 45.0, 10.01);
        assert!(east > 0.0);
        assert!(north.abs() < 0.01);
        let expected = 0.01 * DEG_TO_KM * 45f64.to_radians().cos();
        assert!((east - expected).abs() < 1e-3);
    }
}
