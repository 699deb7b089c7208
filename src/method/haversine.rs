//! Great-circle distance on a sphere.
//!
//! Closed form, no iteration. `h` is clamped into [0, 1] so rounding at
//! antipodal points cannot push `asin` out of its domain.

use crate::coord::{wrap_longitude, Coordinate};
use crate::error::Result;
use crate::settings::CalculationSettings;

use super::GeodesicModel;

pub struct Haversine;

impl Haversine {
    /// Central angle in radians between two points.
    pub fn central_angle(a: &Coordinate, b: &Coordinate) -> f64 {
        let (lat1, lon1) = a.to_radians();
        let (lat2, lon2) = b.to_radians();

        // Halved differences taken as absolute values so (a, b) and (b, a)
        // produce identical bits.
        let half_dlat = (lat2 - lat1).abs() / 2.0;
        let half_dlon = (lon2 - lon1).abs() / 2.0;

        let h = half_dlat.sin().powi(2) + lat1.cos() * lat2.cos() * half_dlon.sin().powi(2);

        2.0 * h.clamp(0.0, 1.0).sqrt().asin()
    }
}

impl GeodesicModel for Haversine {
    fn distance(a: &Coordinate, b: &Coordinate, settings: &CalculationSettings) -> Result<f64> {
        Ok(settings.spherical_radius * Self::central_angle(a, b))
    }

    fn offset(
        start: &Coordinate,
        distance: f64,
        bearing: f64,
        settings: &CalculationSettings,
    ) -> Result<Coordinate> {
        let (lat1, lon1) = start.to_radians();
        let (sin_theta, cos_theta) = bearing.to_radians().sin_cos();
        let (sin_delta, cos_delta) = (distance / settings.spherical_radius).sin_cos();
        let (sin_lat1, cos_lat1) = lat1.sin_cos();

        let sin_lat2 = (sin_lat1 * cos_delta + cos_lat1 * sin_delta * cos_theta).clamp(-1.0, 1.0);
        let lat2 = sin_lat2.asin();
        let lon2 = lon1
            + (sin_theta * sin_delta * cos_lat1).atan2(cos_delta - sin_lat1 * sin_lat2);

        Ok(Coordinate {
            lat: lat2.to_degrees().clamp(-90.0, 90.0),
            lon: wrap_longitude(lon2.to_degrees()),
        })
    }

    fn lower_bound(a: &Coordinate, b: &Coordinate, settings: &CalculationSettings) -> f64 {
        settings.spherical_radius * (a.lat - b.lat).abs().to_radians()
    }
}
