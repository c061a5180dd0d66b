//! Great-circle distance for ranking facilities.

use crate::facility::Coordinates;
use std::f64::consts::PI;

const DEG: f64 = PI / 180.0;

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance in kilometers between two coordinates.
///
/// Total for any finite pair. The `min(1.0)` clamp keeps `asin` defined when
/// rounding pushes the intermediate term slightly above 1 for antipodes.
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let dlat = (b.lat - a.lat) * DEG;
    let dlon = (b.lon - a.lon) * DEG;
    let h = (dlat / 2.0).sin().powi(2)
        + (a.lat * DEG).cos() * (b.lat * DEG).cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const COIMBATORE: Coordinates = Coordinates::new(11.100824, 77.026695);

    #[test]
    fn test_zero_distance_to_self() {
        assert_eq!(haversine_km(COIMBATORE, COIMBATORE), 0.0);
    }

    #[test]
    fn test_symmetric() {
        let chennai = Coordinates::new(13.0827, 80.2707);
        assert_relative_eq!(
            haversine_km(COIMBATORE, chennai),
            haversine_km(chennai, COIMBATORE),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_known_distance() {
        // London to Paris is roughly 344 km along the great circle.
        let london = Coordinates::new(51.5074, -0.1278);
        let paris = Coordinates::new(48.8566, 2.3522);
        assert_relative_eq!(haversine_km(london, paris), 343.5, epsilon = 1.0);
    }

    #[test]
    fn test_one_degree_latitude() {
        let a = Coordinates::new(0.0, 0.0);
        let b = Coordinates::new(1.0, 0.0);
        assert_relative_eq!(haversine_km(a, b), EARTH_RADIUS_KM * DEG, epsilon = 1e-6);
    }

    #[test]
    fn test_antipodes_finite() {
        let d = haversine_km(Coordinates::new(0.0, 0.0), Coordinates::new(0.0, 180.0));
        assert_relative_eq!(d, PI * EARTH_RADIUS_KM, epsilon = 1e-6);
    }
}
