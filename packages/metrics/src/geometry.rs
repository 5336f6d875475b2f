//! Extent statistics over a set of area centroids.

use access_map_cluster_models::BoundingBox;
use access_map_distance::haversine_km;
use access_map_geography_models::GeoPoint;
use geo::{BoundingRect, Centroid, MultiPoint, Point};

/// Centroid, bounding box, and spread of a point set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    /// Mean position.
    pub centroid: Option<GeoPoint>,
    /// Lat/lon bounding box.
    pub bounding_box: Option<BoundingBox>,
    /// Largest pairwise great-circle distance, in km.
    pub spread_km: f64,
}

impl Extent {
    /// Computes the extent of `points`; an empty set has no centroid and
    /// zero spread.
    #[must_use]
    pub fn of(points: &[GeoPoint], earth_radius_km: f64) -> Self {
        let multi: MultiPoint<f64> = points
            .iter()
            .map(|p| Point::new(p.lon, p.lat))
            .collect::<Vec<_>>()
            .into();

        let centroid = multi.centroid().map(|c| GeoPoint {
            lat: c.y(),
            lon: c.x(),
        });
        let bounding_box = multi.bounding_rect().map(|rect| BoundingBox {
            min_lat: rect.min().y,
            min_lon: rect.min().x,
            max_lat: rect.max().y,
            max_lon: rect.max().x,
        });

        let mut spread_km: f64 = 0.0;
        for (i, a) in points.iter().enumerate() {
            for b in &points[i + 1..] {
                spread_km = spread_km.max(haversine_km(*a, *b, earth_radius_km));
            }
        }

        Self {
            centroid,
            bounding_box,
            spread_km,
        }
    }
}

#[cfg(test)]
mod tests {
    use access_map_distance::EARTH_RADIUS_KM;

    use super::*;

    #[test]
    fn centroid_is_mean_position() {
        let extent = Extent::of(
            &[GeoPoint { lat: 0.0, lon: 0.0 }, GeoPoint { lat: 2.0, lon: 4.0 }],
            EARTH_RADIUS_KM,
        );
        let centroid = extent.centroid.unwrap();
        assert!((centroid.lat - 1.0).abs() < 1e-12);
        assert!((centroid.lon - 2.0).abs() < 1e-12);
        let bbox = extent.bounding_box.unwrap();
        assert!((bbox.max_lon - 4.0).abs() < 1e-12);
        assert!(extent.spread_km > 490.0 && extent.spread_km < 500.0, "{}", extent.spread_km);
    }

    #[test]
    fn empty_set_has_no_centroid() {
        let extent = Extent::of(&[], EARTH_RADIUS_KM);
        assert!(extent.centroid.is_none());
        assert!(extent.bounding_box.is_none());
        assert!(extent.spread_km.abs() < f64::EPSILON);
    }

    #[test]
    fn single_point_has_zero_spread() {
        let extent = Extent::of(&[GeoPoint { lat: 10.0, lon: 10.0 }], EARTH_RADIUS_KM);
        assert!(extent.spread_km.abs() < f64::EPSILON);
        assert!(extent.centroid.is_some());
    }
}
