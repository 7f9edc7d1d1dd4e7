//! Coordinates and great-circle distance.
//!
//! All distances are in meters on a sphere of radius [`EARTH_RADIUS_METERS`].
//! Latitude/longitude are WGS84 degrees.

use geo::{Coord, Point};
use serde::{Deserialize, Serialize};

use crate::error::{HazardError, Result};

pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A validated (latitude, longitude) pair.
///
/// Construction goes through [`GeoPoint::new`], so a `GeoPoint` is always
/// finite and in range. Deserializing runs the same check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPoint")]
pub struct GeoPoint {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct RawPoint {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawPoint> for GeoPoint {
    type Error = HazardError;

    fn try_from(raw: RawPoint) -> Result<Self> {
        GeoPoint::new(raw.latitude, raw.longitude)
    }
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(HazardError::validation(format!(
                "latitude must be within [-90, 90], got {}",
                latitude
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(HazardError::validation(format!(
                "longitude must be within [-180, 180], got {}",
                longitude
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        haversine_distance(self, other)
    }
}

// geo works in (x = lon, y = lat)
impl From<GeoPoint> for Coord<f64> {
    fn from(p: GeoPoint) -> Self {
        Coord {
            x: p.longitude,
            y: p.latitude,
        }
    }
}

impl From<GeoPoint> for Point<f64> {
    fn from(p: GeoPoint) -> Self {
        Point::new(p.longitude, p.latitude)
    }
}

impl TryFrom<Coord<f64>> for GeoPoint {
    type Error = HazardError;

    fn try_from(c: Coord<f64>) -> Result<Self> {
        GeoPoint::new(c.y, c.x)
    }
}

/// Haversine distance in meters.
///
/// `a` is clamped to [0, 1] so rounding near antipodal points cannot
/// produce NaN.
pub fn haversine_distance(from: &GeoPoint, to: &GeoPoint) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let delta_lat = (to.latitude - from.latitude).to_radians();
    let delta_lon = (to.longitude - from.longitude).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let a = a.clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_METERS * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Checks a radius or buffer given in meters: finite and strictly positive.
pub fn validate_distance(name: &str, meters: f64) -> Result<f64> {
    if meters.is_finite() && meters > 0.0 {
        Ok(meters)
    } else {
        Err(HazardError::validation(format!(
            "{} must be a positive number of meters, got {}",
            name, meters
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn p(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon).unwrap()
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        for point in [p(37.5, 127.0), p(-89.9, 179.9), p(0.0, 0.0), p(90.0, -180.0)] {
            assert_eq!(haversine_distance(&point, &point), 0.0);
        }
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = p(37.5665, 126.9780);
        let b = p(35.1796, 129.0756);
        assert_relative_eq!(
            haversine_distance(&a, &b),
            haversine_distance(&b, &a),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_known_distance() {
        // Seoul to Busan, roughly 325 km great-circle
        let d = haversine_distance(&p(37.5665, 126.9780), &p(35.1796, 129.0756));
        assert!(d > 320_000.0 && d < 330_000.0, "got {}", d);
    }

    #[test]
    fn test_small_offset_north() {
        let d = haversine_distance(&p(37.5, 127.0), &p(37.5005, 127.0));
        assert_relative_eq!(d, 55.6, epsilon = 0.5);
    }

    #[test]
    fn test_antipodal_points_are_finite() {
        let d = haversine_distance(&p(0.0, 0.0), &p(0.0, 180.0));
        assert!(d.is_finite());
        assert_relative_eq!(d, std::f64::consts::PI * EARTH_RADIUS_METERS, epsilon = 1.0);
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(GeoPoint::new(90.1, 0.0).is_err());
        assert!(GeoPoint::new(-91.0, 0.0).is_err());
        assert!(GeoPoint::new(0.0, 180.5).is_err());
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
        assert!(GeoPoint::new(0.0, f64::INFINITY).is_err());
        assert!(GeoPoint::new(90.0, -180.0).is_ok());
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: GeoPoint = serde_json::from_str(r#"{"latitude":37.5,"longitude":127.0}"#).unwrap();
        assert_eq!(ok, p(37.5, 127.0));

        let bad = serde_json::from_str::<GeoPoint>(r#"{"latitude":137.5,"longitude":127.0}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_validate_distance() {
        assert_eq!(validate_distance("radius", 10.0), Ok(10.0));
        assert!(validate_distance("radius", 0.0).is_err());
        assert!(validate_distance("radius", -5.0).is_err());
        assert!(validate_distance("buffer", f64::NAN).is_err());
    }
}
