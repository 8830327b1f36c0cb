//! Geographic value object and geodesic math.
//!
//! # Responsibility
//! - Define the `GeoPoint` value object (WGS84 degrees).
//! - Provide great-circle distance and the degree window used by the
//!   radius prefilter.
//!
//! # Invariants
//! - `latitude` is degrees north, `longitude` degrees east.
//! - The prefilter window always contains every point within the radius.

use serde::{Deserialize, Serialize};

/// Mean earth radius in meters (WGS84).
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Smallest meters-per-degree-of-latitude on the WGS84 ellipsoid.
///
/// Using the minimum keeps the derived degree window conservative, so the
/// window scan never excludes a point the exact distance check would keep.
const MIN_METERS_PER_DEGREE_LAT: f64 = 110_574.0;

/// Meters per degree of longitude at the equator.
const METERS_PER_DEGREE_LON_EQUATOR: f64 = 111_320.0;

/// Immutable geographic coordinate in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Degrees north, in `[-90, 90]`.
    pub latitude: f64,
    /// Degrees east, in `[-180, 180]`.
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Great-circle distance between two points in meters (haversine).
pub fn geodesic_distance_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// Axis-aligned degree window guaranteed to contain every point within
/// `radius_meters` of `center`.
///
/// Returns `(south_west, north_east)`. Near the poles, or when the window
/// would cross the antimeridian, the longitude range opens to the full
/// `[-180, 180]` so the exact distance predicate stays the only filter.
pub fn bounding_window(center: GeoPoint, radius_meters: f64) -> (GeoPoint, GeoPoint) {
    let lat_delta = radius_meters / MIN_METERS_PER_DEGREE_LAT;
    let south = (center.latitude - lat_delta).max(-90.0);
    let north = (center.latitude + lat_delta).min(90.0);

    // Longitude degrees shrink with cos(lat); widen with the latitude in the
    // window closest to a pole to stay conservative.
    let worst_lat = south.abs().max(north.abs());
    let meters_per_lon_degree = METERS_PER_DEGREE_LON_EQUATOR * worst_lat.to_radians().cos();

    let (west, east) = if worst_lat >= 89.9 || meters_per_lon_degree <= f64::EPSILON {
        (-180.0, 180.0)
    } else {
        let lon_delta = radius_meters / meters_per_lon_degree;
        let west = center.longitude - lon_delta;
        let east = center.longitude + lon_delta;
        if west < -180.0 || east > 180.0 {
            (-180.0, 180.0)
        } else {
            (west, east)
        }
    };

    (GeoPoint::new(south, west), GeoPoint::new(north, east))
}
