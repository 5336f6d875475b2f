//! Great-circle geometry on a spherical Earth.

use access_map_geography_models::GeoPoint;

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two points, in kilometers, on a sphere of the
/// given radius.
///
/// Accurate to roughly 0.5% against the ellipsoid for the sub-500 km
/// distances this crate deals with.
#[must_use]
pub fn haversine_km(a: GeoPoint, b: GeoPoint, earth_radius_km: f64) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);

    // Clamp guards asin against h drifting past 1.0 for antipodal points.
    2.0 * earth_radius_km * h.sqrt().min(1.0).asin()
}

/// Projects a point onto the unit sphere as Cartesian `[x, y, z]`.
///
/// Straight-line (chord) distance between two projected points is a
/// monotone function of their great-circle distance, which lets an R-tree
/// over these coordinates answer nearest/within-radius queries exactly.
#[must_use]
pub fn unit_vector(p: GeoPoint) -> [f64; 3] {
    let lat = p.lat.to_radians();
    let lon = p.lon.to_radians();
    [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
}

/// Squared chord length on the unit sphere for a surface distance.
///
/// Distances at or beyond half the circumference map to the sphere's
/// diameter (chord 2, squared 4).
#[must_use]
pub fn chord_squared_for_km(distance_km: f64, earth_radius_km: f64) -> f64 {
    let theta = (distance_km / earth_radius_km).clamp(0.0, std::f64::consts::PI);
    let chord = 2.0 * (theta / 2.0).sin();
    chord * chord
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon).unwrap()
    }

    #[test]
    fn known_city_pair() {
        // New York to London, roughly 5,570 km
        let d = haversine_km(p(40.7128, -74.0060), p(51.5074, -0.1278), EARTH_RADIUS_KM);
        assert!((d - 5570.0).abs() < 50.0, "got {d}");
    }

    #[test]
    fn symmetric_and_zero_only_at_same_point() {
        let pairs = [
            (p(0.0, 0.0), p(0.0, 1.0)),
            (p(34.0522, -118.2437), p(33.9416, -118.4085)),
            (p(-33.86, 151.21), p(35.68, 139.69)),
            (p(89.9, 10.0), p(-89.9, -170.0)),
        ];
        for (a, b) in pairs {
            let ab = haversine_km(a, b, EARTH_RADIUS_KM);
            let ba = haversine_km(b, a, EARTH_RADIUS_KM);
            assert_eq!(ab, ba, "asymmetric for {a:?} / {b:?}");
            assert!(ab > 0.0);
            assert_eq!(haversine_km(a, a, EARTH_RADIUS_KM), 0.0);
        }
    }

    #[test]
    fn one_degree_of_longitude_at_equator() {
        let d = haversine_km(p(0.0, 0.0), p(0.0, 1.0), EARTH_RADIUS_KM);
        assert!((d - 111.195).abs() < 0.01, "got {d}");
    }

    #[test]
    fn chord_is_monotone_in_distance() {
        let mut previous = -1.0;
        for km in [0.0, 1.0, 10.0, 100.0, 1000.0, 10_000.0, 20_015.0, 30_000.0] {
            let c = chord_squared_for_km(km, EARTH_RADIUS_KM);
            assert!(c >= previous);
            previous = c;
        }
        assert!((chord_squared_for_km(1e9, EARTH_RADIUS_KM) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn chord_matches_projected_points() {
        let a = p(10.0, 20.0);
        let b = p(12.0, 25.0);
        let (ua, ub) = (unit_vector(a), unit_vector(b));
        let direct: f64 = ua.iter().zip(ub.iter()).map(|(x, y)| (x - y).powi(2)).sum();
        let via_km = chord_squared_for_km(haversine_km(a, b, EARTH_RADIUS_KM), EARTH_RADIUS_KM);
        assert!((direct - via_km).abs() < 1e-12);
    }
}
