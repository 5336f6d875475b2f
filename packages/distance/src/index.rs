//! R-tree index over facility positions.
//!
//! Positions are stored as unit-sphere Cartesian points, so chord distance
//! in the tree orders candidates the same way great-circle distance does.
//! Every candidate the tree returns is re-checked with the haversine
//! formula, which keeps results identical to a linear scan.

use access_map_geography_models::GeoPoint;
use rstar::RTree;
use rstar::primitives::GeomWithData;

use crate::geodesic::{chord_squared_for_km, haversine_km, unit_vector};

/// Relative padding applied to chord pre-filters so that floating-point
/// disagreement between chord and haversine never drops a boundary point.
const CHORD_PADDING: f64 = 1e-9;

/// Starting search radius for nearest-neighbor expansion.
const INITIAL_SEARCH_KM: f64 = 5.0;

type Entry = GeomWithData<[f64; 3], usize>;

/// Spatial index of one facility kind.
///
/// Entries carry the facility's position in the caller's facility list;
/// that position doubles as the input-order tie-breaker.
pub struct KindIndex {
    tree: RTree<Entry>,
    positions: Vec<(usize, GeoPoint)>,
    earth_radius_km: f64,
}

impl KindIndex {
    /// Builds an index from `(input_position, point)` pairs.
    pub fn build(points: Vec<(usize, GeoPoint)>, earth_radius_km: f64) -> Self {
        let entries: Vec<Entry> = points
            .iter()
            .enumerate()
            .map(|(slot, (_, point))| GeomWithData::new(unit_vector(*point), slot))
            .collect();

        Self {
            tree: RTree::bulk_load(entries),
            positions: points,
            earth_radius_km,
        }
    }

    /// Number of indexed facilities.
    pub const fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns `true` if no facilities are indexed.
    pub const fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Finds the nearest facility to `point`.
    ///
    /// Returns `(input_position, distance_km)`. Among facilities at exactly
    /// the same haversine distance the lowest input position wins.
    pub fn nearest(&self, point: GeoPoint) -> Option<(usize, f64)> {
        if self.is_empty() {
            return None;
        }

        let query = unit_vector(point);
        let mut search_km = INITIAL_SEARCH_KM;

        loop {
            let limit = padded(chord_squared_for_km(search_km, self.earth_radius_km));
            let best = self
                .tree
                .locate_within_distance(query, limit)
                .map(|entry| {
                    let (input, position) = self.positions[entry.data];
                    (input, haversine_km(point, position, self.earth_radius_km))
                })
                .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

            if best.is_some() || limit >= 4.0 {
                return best;
            }

            search_km *= 4.0;
        }
    }

    /// Counts facilities within `radius_km` of `point`, boundary inclusive.
    pub fn count_within(&self, point: GeoPoint, radius_km: f64) -> usize {
        let query = unit_vector(point);
        let limit = padded(chord_squared_for_km(radius_km, self.earth_radius_km));

        self.tree
            .locate_within_distance(query, limit)
            .filter(|entry| {
                let (_, position) = self.positions[entry.data];
                haversine_km(point, position, self.earth_radius_km) <= radius_km
            })
            .count()
    }
}

fn padded(chord_squared: f64) -> f64 {
    chord_squared.mul_add(1.0 + CHORD_PADDING, 1e-15)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geodesic::EARTH_RADIUS_KM;

    fn p(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon).unwrap()
    }

    #[test]
    fn nearest_matches_linear_scan() {
        let points: Vec<(usize, GeoPoint)> = (0..60_u32)
            .map(|i| {
                let f = f64::from(i);
                (i as usize, p(30.0 + (f * 0.37) % 10.0, -120.0 + (f * 1.13) % 25.0))
            })
            .collect();
        let index = KindIndex::build(points.clone(), EARTH_RADIUS_KM);

        for query in [p(34.0, -118.0), p(0.0, 0.0), p(-45.0, 170.0), p(39.9, -96.5)] {
            let (found, distance) = index.nearest(query).unwrap();
            for (input, position) in &points {
                let d = haversine_km(query, *position, EARTH_RADIUS_KM);
                assert!(distance <= d, "{found} at {distance} beats {input} at {d}");
            }
        }
    }

    #[test]
    fn ties_go_to_first_input() {
        let index = KindIndex::build(
            vec![(3, p(0.0, 1.0)), (7, p(0.0, -1.0)), (9, p(0.0, 1.0))],
            EARTH_RADIUS_KM,
        );
        let (found, _) = index.nearest(p(0.0, 0.0)).unwrap();
        assert_eq!(found, 3);
    }

    #[test]
    fn empty_index_has_no_nearest() {
        let index = KindIndex::build(Vec::new(), EARTH_RADIUS_KM);
        assert!(index.nearest(p(0.0, 0.0)).is_none());
        assert_eq!(index.count_within(p(0.0, 0.0), 100.0), 0);
    }

    #[test]
    fn radius_count_is_boundary_inclusive() {
        let facility = p(0.0, 0.5);
        let query = p(0.0, 0.0);
        let exact = haversine_km(query, facility, EARTH_RADIUS_KM);
        let index = KindIndex::build(vec![(0, facility)], EARTH_RADIUS_KM);
        assert_eq!(index.count_within(query, exact), 1);
        assert_eq!(index.count_within(query, exact - 1e-6), 0);
    }
}
