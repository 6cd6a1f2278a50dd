//! Geographic primitives: validated WGS84 points and great-circle distance.

use serde::{Deserialize, Serialize};

use super::error::DispatchError;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// A validated WGS84 coordinate pair.
///
/// Construction rejects non-finite or out-of-range values, so downstream code
/// (GeoIndex, scoring) never has to re-check. Deserialization goes through the
/// same validation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPoint")]
pub struct GeoPoint {
    lat: f64,
    lon: f64,
}

#[derive(Deserialize)]
struct RawPoint {
    lat: f64,
    lon: f64,
}

impl TryFrom<RawPoint> for GeoPoint {
    type Error = DispatchError;

    fn try_from(raw: RawPoint) -> Result<Self, Self::Error> {
        GeoPoint::new(raw.lat, raw.lon)
    }
}

impl GeoPoint {
    /// Validate and construct a point.
    ///
    /// # Errors
    ///
    /// `DispatchError::InvalidCoordinates` for non-finite values or values
    /// outside [-90, 90] / [-180, 180].
    pub fn new(lat: f64, lon: f64) -> Result<Self, DispatchError> {
        if !lat.is_finite() || !lon.is_finite() || !(-90.0..=90.0).contains(&lat)
            || !(-180.0..=180.0).contains(&lon)
        {
            return Err(DispatchError::InvalidCoordinates { lat, lon });
        }
        Ok(Self { lat, lon })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// Great-circle distance to another point in kilometers (Haversine).
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let dlat = (other.lat - self.lat).to_radians();
        let dlon = (other.lon - self.lon).to_radians();

        let a = (dlat / 2.0).sin().powi(2)
            + self.lat.to_radians().cos() * other.lat.to_radians().cos() * (dlon / 2.0).sin().powi(2);

        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_KM * c
    }
}
