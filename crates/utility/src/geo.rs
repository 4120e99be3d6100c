pub const EARTH_RADIUS_KM: f64 = 6371.0;

pub const MIN_LATITUDE: f64 = -90.0;
pub const MAX_LATITUDE: f64 = 90.0;
pub const MIN_LONGITUDE: f64 = -180.0;
pub const MAX_LONGITUDE: f64 = 180.0;

fn to_radians(degrees: f64) -> f64 {
    degrees * std::f64::consts::PI / 180.0
}

pub fn is_valid_latitude(latitude: f64) -> bool {
    latitude.is_finite() && (MIN_LATITUDE..=MAX_LATITUDE).contains(&latitude)
}

pub fn is_valid_longitude(longitude: f64) -> bool {
    longitude.is_finite() && (MIN_LONGITUDE..=MAX_LONGITUDE).contains(&longitude)
}

/// Finite and inside the WGS84 degree ranges.
pub fn is_valid_coordinate(latitude: f64, longitude: f64) -> bool {
    is_valid_latitude(latitude) && is_valid_longitude(longitude)
}

pub fn clamp_latitude(latitude: f64) -> f64 {
    latitude.clamp(MIN_LATITUDE, MAX_LATITUDE)
}

/// Wraps a longitude into `[-180, 180]`.
pub fn wrap_longitude(longitude: f64) -> f64 {
    if (MIN_LONGITUDE..=MAX_LONGITUDE).contains(&longitude) {
        return longitude;
    }
    let wrapped = (longitude + 180.0).rem_euclid(360.0) - 180.0;
    // rem_euclid maps +180 onto -180, keep the sign of the input
    if wrapped == MIN_LONGITUDE && longitude > 0.0 {
        MAX_LONGITUDE
    } else {
        wrapped
    }
}

pub fn haversine_distance(
    latitude_1: f64,
    longitude_1: f64,
    latitude2: f64,
    longitude_2: f64,
) -> f64 {
    let lat1_rad = to_radians(latitude_1);
    let lon1_rad = to_radians(longitude_1);
    let lat2_rad = to_radians(latitude2);
    let lon2_rad = to_radians(longitude_2);

    let dlat = lat2_rad - lat1_rad;
    let dlon = lon2_rad - lon1_rad;

    let a = (dlat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Length in kilometers of the polyline through `points` (latitude, longitude).
pub fn path_length_km<I>(points: I) -> f64
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let mut points = points.into_iter();
    let Some(mut last) = points.next() else {
        return 0.0;
    };
    let mut total = 0.0;
    for next in points {
        total += haversine_distance(last.0, last.1, next.0, next.1);
        last = next;
    }
    total
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        assert_abs_diff_eq!(
            haversine_distance(0.0, 0.0, 1.0, 0.0),
            111.19,
            epsilon = 0.01
        );
    }

    #[test]
    fn path_length_sums_legs() {
        let legs = [(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)];
        assert_abs_diff_eq!(path_length_km(legs), 222.39, epsilon = 0.01);
        assert_eq!(path_length_km(Vec::new()), 0.0);
    }

    #[test]
    fn rejects_out_of_range_and_nan() {
        assert!(is_valid_coordinate(54.32, 10.13));
        assert!(is_valid_coordinate(-90.0, 180.0));
        assert!(!is_valid_coordinate(90.5, 0.0));
        assert!(!is_valid_coordinate(0.0, -181.0));
        assert!(!is_valid_coordinate(f64::NAN, 0.0));
        assert!(!is_valid_coordinate(0.0, f64::INFINITY));
    }

    #[test]
    fn wraps_longitude() {
        assert_eq!(wrap_longitude(10.0), 10.0);
        assert_abs_diff_eq!(wrap_longitude(190.0), -170.0, epsilon = 1e-9);
        assert_abs_diff_eq!(wrap_longitude(-190.0), 170.0, epsilon = 1e-9);
        assert_eq!(wrap_longitude(540.0), 180.0);
    }
}
