//! Per-group summaries, independent of any clustering.

use std::collections::BTreeMap;

use access_map_cluster_models::{GroupSummary, RadiusMean};
use access_map_distance::{AccessibilityRecord, Resolution};
use access_map_facility_models::FacilityKind;
use access_map_geography_models::{Area, GeoPoint};

use crate::{AreaView, Extent, join, per_kind_distances};

/// Summarizes each group of `areas`, ordered by group key.
#[must_use]
pub fn group_summaries(
    areas: &[Area],
    accessibility: &[AccessibilityRecord],
    earth_radius_km: f64,
) -> Vec<GroupSummary> {
    let joined = join(areas, accessibility, &[]);

    let mut groups: BTreeMap<&str, Vec<AreaView<'_>>> = BTreeMap::new();
    for area in areas {
        if let Some(view) = joined.get(area.id.as_str()) {
            groups.entry(area.group_key()).or_default().push(*view);
        }
    }

    groups
        .into_iter()
        .map(|(group, members)| summarize(group, &members, earth_radius_km))
        .collect()
}

fn summarize(group: &str, members: &[AreaView<'_>], earth_radius_km: f64) -> GroupSummary {
    let resolved: Vec<&AccessibilityRecord> = members
        .iter()
        .filter_map(|m| m.accessibility)
        .filter(|r| r.resolution == Resolution::Resolved)
        .collect();
    let positions: Vec<GeoPoint> = members.iter().filter_map(|m| m.area.position()).collect();
    let extent = Extent::of(&positions, earth_radius_km);

    let travel_weighted_distance_km = FacilityKind::all()
        .iter()
        .map(|&kind| {
            let (distances, minutes): (Vec<f64>, Vec<f64>) = resolved
                .iter()
                .filter_map(|r| r.nearest(kind))
                .map(|n| (n.distance_km, n.estimated_travel_minutes))
                .unzip();
            (
                kind,
                access_map_stats::weighted_mean(&distances, &minutes).ok(),
            )
        })
        .collect();

    let radii: Vec<f64> = resolved
        .first()
        .map(|r| r.radius_counts.iter().map(|c| c.radius_km).collect())
        .unwrap_or_default();
    let radius_means = radii
        .iter()
        .enumerate()
        .filter_map(|(i, &radius_km)| {
            #[allow(clippy::cast_precision_loss)]
            let counts: Vec<f64> = resolved
                .iter()
                .filter_map(|r| r.radius_counts.get(i))
                .map(|c| c.total as f64)
                .collect();
            access_map_stats::mean(&counts)
                .ok()
                .map(|mean_count| RadiusMean {
                    radius_km,
                    mean_count,
                })
        })
        .collect();

    GroupSummary {
        group: group.to_string(),
        area_count: members.len(),
        resolved_count: resolved.len(),
        centroid: extent.centroid,
        bounding_box: extent.bounding_box,
        spread_km: extent.spread_km,
        bounding_radius_km: extent.spread_km / 2.0,
        nearest_distance_km: per_kind_distances(members),
        travel_weighted_distance_km,
        radius_means,
    }
}

#[cfg(test)]
mod tests {
    use access_map_distance::EARTH_RADIUS_KM;

    use super::*;
    use crate::test_support::{access, area};

    #[test]
    fn summarizes_each_group() {
        let areas = vec![
            area("a", "east", 0.0, 1.0, 1.0),
            area("b", "east", 1.0, 1.0, 1.0),
            area("c", "west", 30.0, 1.0, 1.0),
        ];
        let accessibility = vec![
            access("a", "east", 10.0, 2),
            access("b", "east", 30.0, 0),
            access("c", "west", 5.0, 1),
        ];
        let summaries = group_summaries(&areas, &accessibility, EARTH_RADIUS_KM);
        assert_eq!(summaries.len(), 2);

        let east = &summaries[0];
        assert_eq!(east.group, "east");
        assert_eq!(east.area_count, 2);
        assert_eq!(east.resolved_count, 2);
        assert!((east.bounding_radius_km * 2.0 - east.spread_km).abs() < 1e-12);
        assert!(east.spread_km > 110.0 && east.spread_km < 112.0);

        let airport = east.nearest_distance_km[&FacilityKind::Airport];
        assert!((airport.median - 20.0).abs() < 1e-12);

        // (10·15 + 30·45) / 60
        let weighted = east.travel_weighted_distance_km[&FacilityKind::Airport].unwrap();
        assert!((weighted - 25.0).abs() < 1e-9);
        assert_eq!(east.travel_weighted_distance_km[&FacilityKind::Heliport], None);

        assert_eq!(east.radius_means.len(), 1);
        assert!((east.radius_means[0].mean_count - 1.0).abs() < 1e-12);
    }

    #[test]
    fn unresolved_areas_count_but_do_not_contribute() {
        let mut lost = area("x", "east", 0.0, 1.0, 1.0);
        lost.latitude = None;
        let mut record = access("x", "east", 1.0, 0);
        record.resolution = Resolution::Unresolved;
        record.distances.clear();
        record.radius_counts.clear();

        let summaries = group_summaries(&[lost], &[record], EARTH_RADIUS_KM);
        assert_eq!(summaries[0].area_count, 1);
        assert_eq!(summaries[0].resolved_count, 0);
        assert!(summaries[0].centroid.is_none());
        assert!(summaries[0].radius_means.is_empty());
    }
}
