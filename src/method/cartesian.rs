//! Flat approximation.
//!
//! Treats the world as a cylinder: degrees of latitude and longitude are both
//! scaled by the equatorial km-per-degree of the spherical model, and the
//! longitude difference is taken the short way round. The error grows with
//! distance and with latitude (a degree of longitude near a pole is counted as
//! if it were on the equator), so this is only a cheap estimate for small
//! extents. It is not a substitute for [`Haversine`](super::Haversine).

use crate::coord::{wrap_longitude, Coordinate};
use crate::error::{GeoError, Result};
use crate::settings::CalculationSettings;

use super::GeodesicModel;

pub struct Cartesian;

impl Cartesian {
    /// Absolute (Δlat, Δlon) in degrees, Δlon in [0, 180].
    fn deltas(a: &Coordinate, b: &Coordinate) -> (f64, f64) {
        let dlat = (a.lat - b.lat).abs();
        let mut dlon = (a.lon - b.lon).abs();
        if dlon > 180.0 {
            dlon = 360.0 - dlon;
        }
        (dlat, dlon)
    }
}

impl GeodesicModel for Cartesian {
    fn distance(a: &Coordinate, b: &Coordinate, settings: &CalculationSettings) -> Result<f64> {
        let (dlat, dlon) = Self::deltas(a, b);
        Ok((dlat * dlat + dlon * dlon).sqrt() * settings.km_per_degree())
    }

    /// Moves in the (lat, lon) plane. There is no way to continue a straight
    /// line over a pole on a cylinder, so a destination past ±90° latitude is
    /// an [`GeoError::InvalidCoordinate`].
    fn offset(
        start: &Coordinate,
        distance: f64,
        bearing: f64,
        settings: &CalculationSettings,
    ) -> Result<Coordinate> {
        let degrees = distance / settings.km_per_degree();
        let (sin_theta, cos_theta) = bearing.to_radians().sin_cos();

        let lat = start.lat + degrees * cos_theta;
        let lon = wrap_longitude(start.lon + degrees * sin_theta);
        if !(-90.0..=90.0).contains(&lat) {
            return Err(GeoError::InvalidCoordinate { lat, lon });
        }

        Ok(Coordinate { lat, lon })
    }

    fn lower_bound(a: &Coordinate, b: &Coordinate, settings: &CalculationSettings) -> f64 {
        (a.lat - b.lat).abs() * settings.km_per_degree()
    }
}
