#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Distance engine.
//!
//! For every area and every facility kind, finds the nearest facility by
//! great-circle (haversine) distance, estimates a travel time from it, and
//! counts facilities within each configured radius.
//!
//! Data-quality problems are recovered locally: an area without a usable
//! centroid is reported as [`Resolution::Unresolved`], facilities without
//! usable coordinates are left out of the index and listed by
//! [`DistanceEngine::unresolved_facilities`], and a kind with no facilities
//! yields `None` for the nearest facility rather than an error.

pub mod geodesic;
mod index;

use std::collections::BTreeMap;

use access_map_facility::RuleTable;
use access_map_facility_models::{Facility, FacilityCategory, FacilityKind};
use access_map_geography_models::{Area, GeoPoint};
use serde::{Deserialize, Serialize};

pub use geodesic::{EARTH_RADIUS_KM, haversine_km};

use crate::index::KindIndex;

/// Errors raised when a [`DistanceConfig`] is invalid.
#[derive(Debug, thiserror::Error)]
pub enum DistanceError {
    /// A radius threshold is zero, negative, or not finite.
    #[error("Invalid radius threshold {radius_km} km: must be positive and finite")]
    InvalidRadius {
        /// The rejected radius.
        radius_km: f64,
    },

    /// The travel-time factor is zero, negative, or not finite.
    #[error("Invalid travel-time factor {minutes_per_km} min/km: must be positive and finite")]
    InvalidTravelFactor {
        /// The rejected factor.
        minutes_per_km: f64,
    },

    /// The Earth radius is zero, negative, or not finite.
    #[error("Invalid earth radius {earth_radius_km} km")]
    InvalidEarthRadius {
        /// The rejected radius.
        earth_radius_km: f64,
    },
}

/// Distance engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceConfig {
    /// Radius thresholds for facility counts, in kilometers.
    pub radii_km: Vec<f64>,
    /// Minutes of travel per kilometer of great-circle distance.
    ///
    /// 1.5 min/km corresponds to an urban average of 40 km/h. The resulting
    /// travel time is an estimate, not a routed drive time.
    pub minutes_per_km: f64,
    /// Sphere radius used by the haversine formula.
    pub earth_radius_km: f64,
}

impl Default for DistanceConfig {
    fn default() -> Self {
        Self {
            radii_km: vec![10.0, 20.0, 30.0],
            minutes_per_km: 1.5,
            earth_radius_km: EARTH_RADIUS_KM,
        }
    }
}

impl DistanceConfig {
    /// Checks every numeric parameter.
    ///
    /// # Errors
    ///
    /// Returns [`DistanceError`] naming the first invalid parameter.
    pub fn validate(&self) -> Result<(), DistanceError> {
        if let Some(&radius_km) = self
            .radii_km
            .iter()
            .find(|r| !r.is_finite() || **r <= 0.0)
        {
            return Err(DistanceError::InvalidRadius { radius_km });
        }
        if !self.minutes_per_km.is_finite() || self.minutes_per_km <= 0.0 {
            return Err(DistanceError::InvalidTravelFactor {
                minutes_per_km: self.minutes_per_km,
            });
        }
        if !self.earth_radius_km.is_finite() || self.earth_radius_km <= 0.0 {
            return Err(DistanceError::InvalidEarthRadius {
                earth_radius_km: self.earth_radius_km,
            });
        }
        Ok(())
    }

    /// Converts a distance into the estimated travel time in minutes.
    #[must_use]
    pub fn estimate_travel_minutes(&self, distance_km: f64) -> f64 {
        distance_km * self.minutes_per_km
    }
}

/// Whether an area could take part in distance computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// The area had a valid centroid.
    Resolved,
    /// The centroid was missing or invalid; no distances were computed.
    Unresolved,
}

/// The nearest facility of one kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearestFacility {
    /// Facility identifier.
    pub facility_id: String,
    /// Facility name, if known.
    pub facility_name: Option<String>,
    /// Category assigned by the rule table.
    pub category: FacilityCategory,
    /// Great-circle distance in kilometers.
    pub distance_km: f64,
    /// Estimated travel time (distance × fixed factor), in minutes.
    pub estimated_travel_minutes: f64,
}

/// Nearest-facility result for one (area, kind) pair.
///
/// `nearest` is `None` when no facility of that kind exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistanceRecord {
    /// Area identifier.
    pub area_id: String,
    /// Facility kind searched.
    pub kind: FacilityKind,
    /// Nearest facility, if any.
    pub nearest: Option<NearestFacility>,
}

/// Facility counts within one radius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RadiusCount {
    /// Radius threshold in kilometers.
    pub radius_km: f64,
    /// Counts per facility kind.
    pub by_kind: BTreeMap<FacilityKind, usize>,
    /// Count across all kinds.
    pub total: usize,
}

impl RadiusCount {
    /// Count for one kind (zero when absent).
    #[must_use]
    pub fn count(&self, kind: FacilityKind) -> usize {
        self.by_kind.get(&kind).copied().unwrap_or(0)
    }
}

/// One accessibility row per area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessibilityRecord {
    /// Area identifier.
    pub area_id: String,
    /// Area group label.
    pub group: Option<String>,
    /// Whether distances were computed.
    pub resolution: Resolution,
    /// One record per facility kind (empty when unresolved).
    pub distances: Vec<DistanceRecord>,
    /// One entry per configured radius (empty when unresolved).
    pub radius_counts: Vec<RadiusCount>,
}

impl AccessibilityRecord {
    /// Nearest facility of a kind, if the area is resolved and one exists.
    #[must_use]
    pub fn nearest(&self, kind: FacilityKind) -> Option<&NearestFacility> {
        self.distances
            .iter()
            .find(|d| d.kind == kind)
            .and_then(|d| d.nearest.as_ref())
    }

    /// Derived attributes exposed to scoring and clustering:
    /// `nearest_<kind>_km` and `nearest_<kind>_minutes`.
    #[must_use]
    pub fn derived_attributes(&self) -> BTreeMap<String, f64> {
        let mut map = BTreeMap::new();
        for record in &self.distances {
            if let Some(nearest) = &record.nearest {
                map.insert(distance_attribute(record.kind), nearest.distance_km);
                map.insert(
                    travel_time_attribute(record.kind),
                    nearest.estimated_travel_minutes,
                );
            }
        }
        map
    }
}

/// Name of the derived nearest-distance attribute for a kind.
#[must_use]
pub fn distance_attribute(kind: FacilityKind) -> String {
    format!("nearest_{kind}_km")
}

/// Name of the derived travel-time attribute for a kind.
#[must_use]
pub fn travel_time_attribute(kind: FacilityKind) -> String {
    format!("nearest_{kind}_minutes")
}

/// All derived attribute names the engine can produce.
#[must_use]
pub fn derived_attribute_names() -> Vec<String> {
    FacilityKind::all()
        .iter()
        .flat_map(|&kind| [distance_attribute(kind), travel_time_attribute(kind)])
        .collect()
}

struct IndexedFacility {
    id: String,
    name: Option<String>,
    category: FacilityCategory,
}

/// Nearest-facility and radius-count engine over a fixed facility set.
pub struct DistanceEngine {
    config: DistanceConfig,
    facilities: Vec<IndexedFacility>,
    indexes: BTreeMap<FacilityKind, KindIndex>,
    unresolved_facilities: Vec<String>,
}

impl DistanceEngine {
    /// Validates the configuration, classifies every facility, and builds
    /// one spatial index per facility kind.
    ///
    /// # Errors
    ///
    /// Returns [`DistanceError`] if the configuration is invalid.
    pub fn new(
        config: DistanceConfig,
        facilities: &[Facility],
        rules: &RuleTable,
    ) -> Result<Self, DistanceError> {
        config.validate()?;

        let mut by_kind: BTreeMap<FacilityKind, Vec<(usize, GeoPoint)>> = FacilityKind::all()
            .iter()
            .map(|&kind| (kind, Vec::new()))
            .collect();
        let mut indexed = Vec::with_capacity(facilities.len());
        let mut unresolved_facilities = Vec::new();

        for facility in facilities {
            let Some(position) = facility.position() else {
                log::warn!(
                    "Facility {} has missing or invalid coordinates; excluded",
                    facility.id
                );
                unresolved_facilities.push(facility.id.clone());
                continue;
            };

            let slot = indexed.len();
            indexed.push(IndexedFacility {
                id: facility.id.clone(),
                name: facility.name.clone(),
                category: rules.classify_facility(facility),
            });
            by_kind
                .entry(facility.kind)
                .or_default()
                .push((slot, position));
        }

        let indexes: BTreeMap<FacilityKind, KindIndex> = by_kind
            .into_iter()
            .map(|(kind, points)| (kind, KindIndex::build(points, config.earth_radius_km)))
            .collect();

        for (kind, index) in &indexes {
            log::info!("Indexed {} {kind} facilities", index.len());
        }

        Ok(Self {
            config,
            facilities: indexed,
            indexes,
            unresolved_facilities,
        })
    }

    /// The validated configuration.
    #[must_use]
    pub const fn config(&self) -> &DistanceConfig {
        &self.config
    }

    /// Identifiers of facilities excluded for bad coordinates.
    #[must_use]
    pub fn unresolved_facilities(&self) -> &[String] {
        &self.unresolved_facilities
    }

    /// Number of indexed facilities of a kind.
    #[must_use]
    pub fn facility_count(&self, kind: FacilityKind) -> usize {
        self.indexes.get(&kind).map_or(0, KindIndex::len)
    }

    /// Finds the nearest facility of `kind` to `point`.
    ///
    /// Exactly equidistant facilities resolve to the one that appeared
    /// first in the input.
    #[must_use]
    pub fn nearest(&self, point: GeoPoint, kind: FacilityKind) -> Option<NearestFacility> {
        let (slot, distance_km) = self.indexes.get(&kind)?.nearest(point)?;
        let facility = &self.facilities[slot];

        Some(NearestFacility {
            facility_id: facility.id.clone(),
            facility_name: facility.name.clone(),
            category: facility.category,
            distance_km,
            estimated_travel_minutes: self.config.estimate_travel_minutes(distance_km),
        })
    }

    /// Counts facilities of `kind` within `radius_km` of `point` (inclusive).
    #[must_use]
    pub fn count_within(&self, point: GeoPoint, kind: FacilityKind, radius_km: f64) -> usize {
        self.indexes
            .get(&kind)
            .map_or(0, |index| index.count_within(point, radius_km))
    }

    /// Computes the accessibility row for one area.
    #[must_use]
    pub fn accessibility(&self, area: &Area) -> AccessibilityRecord {
        let Some(point) = area.position() else {
            return AccessibilityRecord {
                area_id: area.id.clone(),
                group: area.group.clone(),
                resolution: Resolution::Unresolved,
                distances: Vec::new(),
                radius_counts: Vec::new(),
            };
        };

        let distances = FacilityKind::all()
            .iter()
            .map(|&kind| DistanceRecord {
                area_id: area.id.clone(),
                kind,
                nearest: self.nearest(point, kind),
            })
            .collect();

        let radius_counts = self
            .config
            .radii_km
            .iter()
            .map(|&radius_km| {
                let by_kind: BTreeMap<FacilityKind, usize> = FacilityKind::all()
                    .iter()
                    .map(|&kind| (kind, self.count_within(point, kind, radius_km)))
                    .collect();
                let total = by_kind.values().sum();
                RadiusCount {
                    radius_km,
                    by_kind,
                    total,
                }
            })
            .collect();

        AccessibilityRecord {
            area_id: area.id.clone(),
            group: area.group.clone(),
            resolution: Resolution::Resolved,
            distances,
            radius_counts,
        }
    }

    /// Computes accessibility rows for every area, in input order.
    #[must_use]
    pub fn accessibility_table(&self, areas: &[Area]) -> Vec<AccessibilityRecord> {
        let records: Vec<AccessibilityRecord> =
            areas.iter().map(|area| self.accessibility(area)).collect();

        let unresolved = records
            .iter()
            .filter(|r| r.resolution == Resolution::Unresolved)
            .count();
        if unresolved > 0 {
            log::warn!("{unresolved} of {} areas are unresolved", records.len());
        }
        log::info!("Computed accessibility for {} areas", records.len());

        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area(id: &str, lat: f64, lon: f64) -> Area {
        Area {
            id: id.to_string(),
            latitude: Some(lat),
            longitude: Some(lon),
            group: Some("test".to_string()),
            attributes: BTreeMap::new(),
        }
    }

    fn facility(id: &str, lat: f64, lon: f64, kind: FacilityKind) -> Facility {
        Facility {
            id: id.to_string(),
            latitude: Some(lat),
            longitude: Some(lon),
            kind,
            ownership_code: "PU".to_string(),
            name: Some(format!("{id} field")),
        }
    }

    fn engine(facilities: &[Facility], radii_km: Vec<f64>) -> DistanceEngine {
        let config = DistanceConfig {
            radii_km,
            ..DistanceConfig::default()
        };
        DistanceEngine::new(config, facilities, &RuleTable::default_rules()).unwrap()
    }

    #[test]
    fn three_area_scenario() {
        let engine = engine(
            &[facility("F1", 0.0, 0.5, FacilityKind::Airport)],
            vec![10.0, 100.0, 2000.0],
        );
        let areas = [area("A1", 0.0, 0.0), area("A2", 0.0, 1.0), area("A3", 10.0, 10.0)];
        let table = engine.accessibility_table(&areas);

        let d: Vec<f64> = table
            .iter()
            .map(|r| r.nearest(FacilityKind::Airport).unwrap().distance_km)
            .collect();
        // A1 and A2 sit at the same distance either side of the facility.
        assert!(d[0] <= d[1] && d[1] < d[2], "distances {d:?}");

        // The 10 km ring catches none of them: the facility is ~55.6 km away.
        let within = |r: &AccessibilityRecord, i: usize| r.radius_counts[i].total;
        assert_eq!(table.iter().filter(|r| within(r, 0) > 0).count(), 0);
        assert_eq!(table.iter().filter(|r| within(r, 1) > 0).count(), 2);
        assert_eq!(table.iter().filter(|r| within(r, 2) > 0).count(), 3);
    }

    #[test]
    fn nearest_is_no_farther_than_any_same_kind_facility() {
        let facilities: Vec<Facility> = (0..25_u32)
            .map(|i| {
                let f = f64::from(i);
                facility(
                    &format!("F{i}"),
                    33.5 + (f * 0.13) % 1.2,
                    -118.9 + (f * 0.29) % 1.5,
                    if i % 3 == 0 {
                        FacilityKind::Heliport
                    } else {
                        FacilityKind::Airport
                    },
                )
            })
            .collect();
        let engine = engine(&facilities, vec![10.0]);
        let a = area("90012", 34.06, -118.24);
        let point = a.position().unwrap();

        for kind in [FacilityKind::Airport, FacilityKind::Heliport] {
            let nearest = engine.nearest(point, kind).unwrap();
            for f in facilities.iter().filter(|f| f.kind == kind) {
                let d = haversine_km(point, f.position().unwrap(), EARTH_RADIUS_KM);
                assert!(nearest.distance_km <= d);
            }
        }
    }

    #[test]
    fn travel_time_uses_configured_factor() {
        let engine = engine(&[facility("F1", 0.0, 0.5, FacilityKind::Airport)], vec![]);
        let nearest = engine
            .nearest(GeoPoint::new(0.0, 0.0).unwrap(), FacilityKind::Airport)
            .unwrap();
        assert!((nearest.estimated_travel_minutes - nearest.distance_km * 1.5).abs() < 1e-9);
        assert_eq!(nearest.category, FacilityCategory::Public);
    }

    #[test]
    fn empty_kind_yields_no_nearest() {
        let engine = engine(&[facility("F1", 0.0, 0.5, FacilityKind::Airport)], vec![30.0]);
        let record = engine.accessibility(&area("A1", 0.0, 0.0));
        assert_eq!(record.resolution, Resolution::Resolved);
        assert!(record.nearest(FacilityKind::Helistop).is_none());
        assert_eq!(record.distances.len(), FacilityKind::all().len());
        assert_eq!(record.radius_counts[0].count(FacilityKind::Helistop), 0);
        assert!(
            !record
                .derived_attributes()
                .contains_key("nearest_helistop_km")
        );
    }

    #[test]
    fn unresolved_records_are_flagged_not_dropped() {
        let mut bad_facility = facility("BAD", 0.0, 0.0, FacilityKind::Airport);
        bad_facility.latitude = None;
        let engine = engine(
            &[bad_facility, facility("OK", 0.0, 0.1, FacilityKind::Airport)],
            vec![10.0],
        );
        assert_eq!(engine.unresolved_facilities(), ["BAD".to_string()]);
        assert_eq!(engine.facility_count(FacilityKind::Airport), 1);

        let mut bad_area = area("A1", 0.0, 0.0);
        bad_area.longitude = Some(200.0);
        let table = engine.accessibility_table(&[bad_area, area("A2", 0.0, 0.0)]);
        assert_eq!(table.len(), 2);
        assert_eq!(table[0].resolution, Resolution::Unresolved);
        assert!(table[0].distances.is_empty());
        assert_eq!(table[1].resolution, Resolution::Resolved);
    }

    #[test]
    fn rejects_invalid_config() {
        let rules = RuleTable::default_rules();
        let bad_radius = DistanceConfig {
            radii_km: vec![10.0, -1.0],
            ..DistanceConfig::default()
        };
        assert!(matches!(
            DistanceEngine::new(bad_radius, &[], &rules),
            Err(DistanceError::InvalidRadius { .. })
        ));
        let bad_factor = DistanceConfig {
            minutes_per_km: 0.0,
            ..DistanceConfig::default()
        };
        assert!(matches!(
            DistanceEngine::new(bad_factor, &[], &rules),
            Err(DistanceError::InvalidTravelFactor { .. })
        ));
    }

    #[test]
    fn derived_attribute_names_cover_all_kinds() {
        let names = derived_attribute_names();
        assert_eq!(names.len(), 6);
        assert!(names.contains(&"nearest_airport_km".to_string()));
        assert!(names.contains(&"nearest_heliport_minutes".to_string()));
    }
}
