use serde::{Deserialize, Serialize};

use crate::error::{GeoError, Result};

/// A geographic point in degrees.
///
/// Latitude is positive north of the equator, longitude positive east of
/// Greenwich. Construct through [`Coordinate::new`], which rejects anything
/// outside lat [-90, 90] / lon [-180, 180] instead of wrapping it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        let coord = Self { lat, lon };
        coord.validate()?;
        Ok(coord)
    }

    /// Build a coordinate from arbitrary finite degrees.
    ///
    /// Latitudes past a pole are folded back over it (shifting longitude by
    /// 180°) and longitude is wrapped into [-180, 180].
    pub fn normalized(lat: f64, lon: f64) -> Result<Self> {
        if !lat.is_finite() || !lon.is_finite() {
            return Err(GeoError::InvalidCoordinate { lat, lon });
        }

        // Fold latitude into [-90, 90] on a 360° period.
        let mut lat = (lat + 90.0).rem_euclid(360.0) - 90.0;
        let mut lon = lon;
        if lat > 90.0 {
            lat = 180.0 - lat;
            lon += 180.0;
        }

        Ok(Self {
            lat,
            lon: wrap_longitude(lon),
        })
    }

    /// Check the range invariant; also guards values built through the public fields.
    pub fn validate(&self) -> Result<()> {
        let in_range = self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon);
        if in_range {
            Ok(())
        } else {
            Err(GeoError::InvalidCoordinate {
                lat: self.lat,
                lon: self.lon,
            })
        }
    }

    /// (lat, lon) in radians.
    pub fn to_radians(&self) -> (f64, f64) {
        (self.lat.to_radians(), self.lon.to_radians())
    }
}

impl From<Coordinate> for (f64, f64) {
    fn from(c: Coordinate) -> Self {
        (c.lat, c.lon)
    }
}

impl TryFrom<(f64, f64)> for Coordinate {
    type Error = GeoError;

    fn try_from((lat, lon): (f64, f64)) -> Result<Self> {
        Self::new(lat, lon)
    }
}

/// Wrap a longitude in degrees into [-180, 180], leaving in-range values untouched.
pub fn wrap_longitude(lon: f64) -> f64 {
    if (-180.0..=180.0).contains(&lon) {
        lon
    } else {
        (lon + 180.0).rem_euclid(360.0) - 180.0
    }
}

/// Check every coordinate in a collection before any work starts.
pub(crate) fn validate_all(coords: &[Coordinate]) -> Result<()> {
    coords.iter().try_for_each(Coordinate::validate)
}
