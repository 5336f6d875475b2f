#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Cluster metrics aggregator.
//!
//! Turns cluster assignments plus the per-area accessibility and score
//! records into one [`ClusterMetrics`] row per (group, algorithm, label),
//! and summarizes each group independently of clustering.

pub mod geometry;
pub mod summary;

use std::collections::{BTreeMap, BTreeSet};

use access_map_cluster_models::{
    ClusterAlgorithm, ClusterAssignment, ClusterLabel, ClusterMetrics, DistanceSummary,
    WeightedCompositeMean,
};
use access_map_distance::AccessibilityRecord;
use access_map_facility_models::FacilityKind;
use access_map_geography_models::{Area, GeoPoint, attributes};
use access_map_scoring::CompositeScore;
use serde::{Deserialize, Serialize};

pub use geometry::Extent;
pub use summary::group_summaries;

/// Metrics configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// A weighting or summed attribute is not provided by the input.
    #[error("Metrics reference unknown attribute '{0}'")]
    UnknownAttribute(String),

    /// An averaged score is not configured in scoring.
    #[error("Metrics reference unknown score '{0}'")]
    UnknownScore(String),

    /// Two weightings share a label.
    #[error("Duplicate weighting label '{0}'")]
    DuplicateWeighting(String),
}

/// A per-area weight: an attribute, or the ratio of two attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weighting {
    /// Label reported next to the weighted statistic.
    pub label: String,
    /// Attribute providing the weight (or its numerator).
    pub numerator: String,
    /// Optional denominator attribute, for ratio weights.
    #[serde(default)]
    pub denominator: Option<String>,
}

impl Weighting {
    fn attribute(label: &str, name: &str) -> Self {
        Self {
            label: label.to_string(),
            numerator: name.to_string(),
            denominator: None,
        }
    }

    /// Weight for one area, or `None` if an input is missing or the
    /// denominator is zero.
    #[must_use]
    pub fn weight(&self, area: &Area) -> Option<f64> {
        let numerator = area.attribute(&self.numerator)?;
        match &self.denominator {
            None => Some(numerator),
            Some(denominator) => {
                let denominator = area.attribute(denominator)?;
                (denominator != 0.0).then(|| numerator / denominator)
            }
        }
    }
}

/// Aggregation configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Attributes summed per cluster.
    pub summed_attributes: Vec<String>,
    /// Scores averaged per cluster (simple and weighted).
    pub scores: Vec<String>,
    /// Weightings for the weighted means.
    pub weightings: Vec<Weighting>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            summed_attributes: vec![
                attributes::TOTAL_EMPLOYMENT.to_string(),
                attributes::ESTIMATED_REVENUE_M.to_string(),
                attributes::HOUSEHOLDS_200K.to_string(),
            ],
            scores: vec![
                "corporate_power".to_string(),
                "corporate_score".to_string(),
                "household_wealth".to_string(),
                "combined".to_string(),
            ],
            weightings: vec![
                Weighting::attribute("employment", attributes::TOTAL_EMPLOYMENT),
                Weighting::attribute("revenue", attributes::ESTIMATED_REVENUE_M),
                Weighting {
                    label: "revenue_per_employee".to_string(),
                    numerator: attributes::ESTIMATED_REVENUE_M.to_string(),
                    denominator: Some(attributes::TOTAL_EMPLOYMENT.to_string()),
                },
            ],
        }
    }
}

impl MetricsConfig {
    /// Checks every reference against the attributes and scores the run
    /// will provide.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError`] for the first unknown reference or
    /// duplicate weighting label.
    pub fn validate(
        &self,
        known_attributes: &BTreeSet<String>,
        known_scores: &BTreeSet<String>,
    ) -> Result<(), MetricsError> {
        let weighting_attributes = self.weightings.iter().flat_map(|w| {
            std::iter::once(&w.numerator).chain(w.denominator.as_ref())
        });
        if let Some(unknown) = self
            .summed_attributes
            .iter()
            .chain(weighting_attributes)
            .find(|a| !known_attributes.contains(*a))
        {
            return Err(MetricsError::UnknownAttribute(unknown.clone()));
        }
        if let Some(unknown) = self.scores.iter().find(|s| !known_scores.contains(*s)) {
            return Err(MetricsError::UnknownScore(unknown.clone()));
        }
        let mut labels = BTreeSet::new();
        if let Some(duplicate) = self
            .weightings
            .iter()
            .find(|w| !labels.insert(w.label.as_str()))
        {
            return Err(MetricsError::DuplicateWeighting(duplicate.label.clone()));
        }
        Ok(())
    }
}

/// Everything known about one area, joined by identifier.
#[derive(Debug, Clone, Copy)]
pub struct AreaView<'a> {
    /// Input area.
    pub area: &'a Area,
    /// Accessibility row, if computed.
    pub accessibility: Option<&'a AccessibilityRecord>,
    /// Scores, if computed.
    pub score: Option<&'a CompositeScore>,
}

impl AreaView<'_> {
    fn nearest_km(&self, kind: FacilityKind) -> Option<f64> {
        self.accessibility?.nearest(kind).map(|n| n.distance_km)
    }

    fn travel_minutes(&self, kind: FacilityKind) -> Option<f64> {
        self.accessibility?
            .nearest(kind)
            .map(|n| n.estimated_travel_minutes)
    }

    fn score(&self, name: &str) -> Option<f64> {
        self.score?.value(name)
    }
}

/// Joins areas with their accessibility and score rows by area id.
#[must_use]
pub fn join<'a>(
    areas: &'a [Area],
    accessibility: &'a [AccessibilityRecord],
    scores: &'a [CompositeScore],
) -> BTreeMap<&'a str, AreaView<'a>> {
    let by_access: BTreeMap<&str, &AccessibilityRecord> = accessibility
        .iter()
        .map(|r| (r.area_id.as_str(), r))
        .collect();
    let by_score: BTreeMap<&str, &CompositeScore> =
        scores.iter().map(|s| (s.area_id.as_str(), s)).collect();

    areas
        .iter()
        .map(|area| {
            let id = area.id.as_str();
            (
                id,
                AreaView {
                    area,
                    accessibility: by_access.get(id).copied(),
                    score: by_score.get(id).copied(),
                },
            )
        })
        .collect()
}

/// Min/mean/median/max of `values`, or `None` if empty.
#[must_use]
pub fn distance_summary(values: &[f64]) -> Option<DistanceSummary> {
    let (min, max) = access_map_stats::min_max(values)?;
    Some(DistanceSummary {
        min,
        mean: access_map_stats::mean(values).ok()?,
        median: access_map_stats::median(values).ok()?,
        max,
    })
}

pub(crate) fn per_kind_distances(
    members: &[AreaView<'_>],
) -> BTreeMap<FacilityKind, DistanceSummary> {
    FacilityKind::all()
        .iter()
        .filter_map(|&kind| {
            let values: Vec<f64> = members.iter().filter_map(|m| m.nearest_km(kind)).collect();
            distance_summary(&values).map(|s| (kind, s))
        })
        .collect()
}

/// Builds cluster metric rows from assignments.
#[derive(Debug, Clone)]
pub struct ClusterMetricsAggregator {
    config: MetricsConfig,
    earth_radius_km: f64,
}

impl ClusterMetricsAggregator {
    /// Creates an aggregator; `earth_radius_km` is used for spreads.
    #[must_use]
    pub const fn new(config: MetricsConfig, earth_radius_km: f64) -> Self {
        Self {
            config,
            earth_radius_km,
        }
    }

    /// One row per (group, algorithm, label), ordered by those keys.
    /// Noise is aggregated like any other label. Assignments naming an
    /// unknown area are skipped.
    #[must_use]
    pub fn aggregate(
        &self,
        assignments: &[ClusterAssignment],
        areas: &BTreeMap<&str, AreaView<'_>>,
    ) -> Vec<ClusterMetrics> {
        let mut clusters: BTreeMap<(&str, ClusterAlgorithm, ClusterLabel), Vec<AreaView<'_>>> =
            BTreeMap::new();
        for assignment in assignments {
            let Some(view) = areas.get(assignment.area_id.as_str()) else {
                log::warn!(
                    "Assignment for unknown area {} skipped",
                    assignment.area_id
                );
                continue;
            };
            clusters
                .entry((
                    assignment.group.as_str(),
                    assignment.algorithm,
                    assignment.label,
                ))
                .or_default()
                .push(*view);
        }

        let rows: Vec<ClusterMetrics> = clusters
            .into_iter()
            .map(|((group, algorithm, label), members)| {
                self.cluster_row(group, algorithm, label, &members)
            })
            .collect();
        log::info!("Aggregated {} cluster metric rows", rows.len());
        rows
    }

    fn cluster_row(
        &self,
        group: &str,
        algorithm: ClusterAlgorithm,
        label: ClusterLabel,
        members: &[AreaView<'_>],
    ) -> ClusterMetrics {
        let positions: Vec<GeoPoint> = members.iter().filter_map(|m| m.area.position()).collect();
        let extent = Extent::of(&positions, self.earth_radius_km);

        let mean_travel_minutes = FacilityKind::all()
            .iter()
            .filter_map(|&kind| {
                let values: Vec<f64> =
                    members.iter().filter_map(|m| m.travel_minutes(kind)).collect();
                access_map_stats::mean(&values).ok().map(|mean| (kind, mean))
            })
            .collect();

        let attribute_sums = self
            .config
            .summed_attributes
            .iter()
            .map(|name| {
                let sum = members.iter().filter_map(|m| m.area.attribute(name)).sum();
                (name.clone(), sum)
            })
            .collect();

        let composite_means = self
            .config
            .scores
            .iter()
            .map(|name| {
                let values: Vec<f64> = members.iter().filter_map(|m| m.score(name)).collect();
                (name.clone(), access_map_stats::mean(&values).ok())
            })
            .collect();

        let weighted_composite_means = self
            .config
            .scores
            .iter()
            .flat_map(|name| {
                self.config.weightings.iter().map(move |weighting| {
                    let (values, weights): (Vec<f64>, Vec<f64>) = members
                        .iter()
                        .filter_map(|m| Some((m.score(name)?, weighting.weight(m.area)?)))
                        .filter(|(_, w)| w.is_finite())
                        .unzip();
                    WeightedCompositeMean {
                        composite: name.clone(),
                        weighting: weighting.label.clone(),
                        value: access_map_stats::weighted_mean(&values, &weights).ok(),
                    }
                })
            })
            .collect();

        ClusterMetrics {
            group: group.to_string(),
            algorithm,
            label,
            member_count: members.len(),
            centroid: extent.centroid,
            bounding_box: extent.bounding_box,
            spread_km: extent.spread_km,
            nearest_distance_km: per_kind_distances(members),
            mean_travel_minutes,
            attribute_sums,
            composite_means,
            weighted_composite_means,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::BTreeMap;

    use access_map_distance::{
        AccessibilityRecord, DistanceRecord, NearestFacility, RadiusCount, Resolution,
    };
    use access_map_facility_models::{FacilityCategory, FacilityKind};
    use access_map_geography_models::Area;
    use access_map_scoring::{CompositeScore, CompositeValue};

    pub fn area(id: &str, group: &str, lat: f64, employment: f64, revenue: f64) -> Area {
        Area {
            id: id.to_string(),
            latitude: Some(lat),
            longitude: Some(0.0),
            group: Some(group.to_string()),
            attributes: [
                ("total_employment".to_string(), employment),
                ("estimated_revenue_m".to_string(), revenue),
            ]
            .into_iter()
            .collect(),
        }
    }

    pub fn access(id: &str, group: &str, airport_km: f64, within_10: usize) -> AccessibilityRecord {
        let mut by_kind = BTreeMap::new();
        by_kind.insert(FacilityKind::Airport, within_10);
        AccessibilityRecord {
            area_id: id.to_string(),
            group: Some(group.to_string()),
            resolution: Resolution::Resolved,
            distances: vec![DistanceRecord {
                area_id: id.to_string(),
                kind: FacilityKind::Airport,
                nearest: Some(NearestFacility {
                    facility_id: "F".to_string(),
                    facility_name: None,
                    category: FacilityCategory::Public,
                    distance_km: airport_km,
                    estimated_travel_minutes: airport_km * 1.5,
                }),
            }],
            radius_counts: vec![RadiusCount {
                radius_km: 10.0,
                by_kind,
                total: within_10,
            }],
        }
    }

    pub fn score(id: &str, value: f64) -> CompositeScore {
        CompositeScore {
            area_id: id.to_string(),
            group: None,
            components: BTreeMap::new(),
            composites: [(
                "corporate_power".to_string(),
                Some(CompositeValue {
                    unit: value,
                    scaled: value * 100.0,
                }),
            )]
            .into_iter()
            .collect(),
            combined: BTreeMap::new(),
        }
    }
}
