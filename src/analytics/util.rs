//! Small numeric helpers shared by the aggregation pipeline.

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Great-circle (haversine) distance between two WGS-84 coordinates, in km.
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// Rounds to one decimal place, matching the precision the reporting
/// surfaces expose.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_empty_is_zero() {
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn test_mean_normal_values() {
        assert_eq!(mean(&[2.0, 4.0, 6.0]), 4.0);
    }

    #[test]
    fn test_haversine_zero_for_identical_points() {
        assert_eq!(haversine_km(44.8, 20.4, 44.8, 20.4), 0.0);
    }

    #[test]
    fn test_haversine_known_distance() {
        // Belgrade to Novi Sad, roughly 72 km as the crow flies.
        let d = haversine_km(44.7866, 20.4489, 45.2671, 19.8335);
        assert!((d - 72.0).abs() < 2.0, "got {d}");
    }

    #[test]
    fn test_haversine_one_degree_latitude() {
        // One degree of latitude is about 111 km everywhere.
        let d = haversine_km(44.0, 20.0, 45.0, 20.0);
        assert!((d - 111.2).abs() < 0.5, "got {d}");
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(33.333), 33.3);
        assert_eq!(round1(66.666), 66.7);
    }
}
