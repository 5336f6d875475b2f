#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Batch analysis pipeline.
//!
//! Runs the passes in order (distance, scoring, clustering, aggregation)
//! over fully loaded area and facility record sets. Configuration problems
//! are rejected by [`Pipeline::new`] before any computation; data-quality
//! problems are recovered and reported as [`Diagnostic`]s; a clustering
//! failure in one group is recorded as a [`GroupError`] and the remaining
//! groups still complete.

pub mod config;
pub mod diagnostics;
pub mod progress;

use std::collections::{BTreeMap, BTreeSet};

use access_map_cluster::{ClusterError, ClusteringEngine, FeatureInput, GroupClustering};
use access_map_cluster_models::{
    ClusterAssignment, ClusterMetrics, Dendrogram, GroupSummary,
};
use access_map_distance::{AccessibilityRecord, DistanceEngine, DistanceError, Resolution};
use access_map_facility::{RuleError, RuleTable};
use access_map_facility_models::{Facility, FacilityKind};
use access_map_geography_models::Area;
use access_map_metrics::{ClusterMetricsAggregator, MetricsError};
use access_map_scoring::{CompositeIndexCalculator, ScoreTable, ScoringError, ScoringRow};
use serde::{Deserialize, Serialize};

pub use config::AnalysisConfig;
pub use diagnostics::{Diagnostic, DiagnosticKind, GroupError};
pub use progress::{NullProgress, ProgressCallback, null_progress};

/// Errors that stop a run before it starts.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// I/O error reading configuration.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed configuration document.
    #[error("Configuration parse error: {0}")]
    Config(#[from] toml::de::Error),

    /// Invalid facility rule table.
    #[error(transparent)]
    Rules(#[from] RuleError),

    /// Invalid distance parameters.
    #[error(transparent)]
    Distance(#[from] DistanceError),

    /// Invalid scoring definitions.
    #[error(transparent)]
    Scoring(#[from] ScoringError),

    /// Invalid clustering parameters.
    #[error(transparent)]
    Cluster(#[from] ClusterError),

    /// Invalid metrics definitions.
    #[error(transparent)]
    Metrics(#[from] MetricsError),

    /// A clustering feature names an unknown attribute or score.
    #[error("Clustering feature '{0}' references an unknown attribute or score")]
    UnknownFeature(String),
}

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutput {
    /// One row per area, in input order (duplicates removed).
    pub accessibility: Vec<AccessibilityRecord>,
    /// Scores and selections.
    pub scores: ScoreTable,
    /// Every (area, algorithm) assignment.
    pub assignments: Vec<ClusterAssignment>,
    /// Hierarchical merge trees, one per clustered group.
    pub dendrograms: Vec<Dendrogram>,
    /// One row per (group, algorithm, label).
    pub cluster_metrics: Vec<ClusterMetrics>,
    /// One row per group.
    pub group_summaries: Vec<GroupSummary>,
    /// Recovered data-quality conditions.
    pub diagnostics: Vec<Diagnostic>,
    /// Groups whose clustering failed.
    pub group_errors: Vec<GroupError>,
}

/// A validated pipeline, ready to run batches.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: AnalysisConfig,
    rules: RuleTable,
    scoring: CompositeIndexCalculator,
    clustering: ClusteringEngine,
    metrics: ClusterMetricsAggregator,
}

impl Pipeline {
    /// Validates every configuration section.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] naming the first invalid setting.
    pub fn new(config: AnalysisConfig) -> Result<Self, PipelineError> {
        let rules = config.rule_table();
        rules.validate()?;
        config.distance.validate()?;

        let known_attributes = config.known_attributes();
        let scoring = CompositeIndexCalculator::new(config.scoring.clone(), &known_attributes)?;
        let clustering = ClusteringEngine::new(config.clustering.clone())?;
        config.validate_features()?;
        config
            .metrics
            .validate(&known_attributes, &config.known_scores())?;
        let metrics =
            ClusterMetricsAggregator::new(config.metrics.clone(), config.distance.earth_radius_km);

        Ok(Self {
            config,
            rules,
            scoring,
            clustering,
            metrics,
        })
    }

    /// The validated configuration.
    #[must_use]
    pub const fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// The rule table in effect.
    #[must_use]
    pub const fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Runs every pass over `areas` and `facilities`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Distance`] only if the distance
    /// configuration is rejected, which [`Pipeline::new`] already rules
    /// out; data problems never fail a run.
    pub fn run(
        &self,
        areas: &[Area],
        facilities: &[Facility],
        progress: &dyn ProgressCallback,
    ) -> Result<AnalysisOutput, PipelineError> {
        let mut diagnostics = Vec::new();
        let areas = dedupe(areas, &mut diagnostics);

        progress.set_message("Computing distances".to_string());
        let engine = DistanceEngine::new(self.config.distance.clone(), facilities, &self.rules)?;
        for id in engine.unresolved_facilities() {
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::UnresolvedFacility,
                    "missing or invalid coordinates; excluded from distances",
                )
                .for_record(id),
            );
        }
        for &kind in FacilityKind::all() {
            if engine.facility_count(kind) == 0 {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::EmptyFacilityKind,
                    format!("no {kind} facilities; nearest {kind} is unknown for every area"),
                ));
            }
        }
        let accessibility = engine.accessibility_table(&areas);
        for record in &accessibility {
            if record.resolution == Resolution::Unresolved {
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::UnresolvedArea,
                        "missing or invalid centroid; excluded from distances and clustering",
                    )
                    .for_record(&record.area_id),
                );
            }
        }

        progress.set_message("Scoring areas".to_string());
        let rows: Vec<ScoringRow> = areas
            .iter()
            .zip(&accessibility)
            .map(|(area, record)| ScoringRow::from_area(area, record.derived_attributes()))
            .collect();
        let scores = self.scoring.score(&rows);
        for degenerate in &scores.degenerate {
            let mut diagnostic = Diagnostic::new(
                DiagnosticKind::DegenerateNormalization,
                format!(
                    "component {} has zero range; every score set to {}",
                    degenerate.component,
                    access_map_scoring::NEUTRAL_SCORE
                ),
            );
            if let Some(group) = &degenerate.group {
                diagnostic = diagnostic.in_group(group);
            }
            diagnostics.push(diagnostic);
        }

        let inputs: Vec<FeatureInput> = rows
            .iter()
            .zip(&areas)
            .zip(&scores.scores)
            .map(|((row, area), score)| {
                let mut values = row.attributes.clone();
                for name in self.scoring.config().score_names() {
                    if let Some(value) = score.value(name) {
                        values.insert(name.to_string(), value);
                    }
                }
                FeatureInput {
                    area_id: area.id.clone(),
                    group: area.group_key().to_string(),
                    position: area.position(),
                    values,
                }
            })
            .collect();

        let clustered = self.cluster(&inputs, progress, &mut diagnostics);

        progress.set_message("Aggregating metrics".to_string());
        let joined = access_map_metrics::join(&areas, &accessibility, &scores.scores);
        let cluster_metrics = self.metrics.aggregate(&clustered.assignments, &joined);
        let group_summaries = access_map_metrics::group_summaries(
            &areas,
            &accessibility,
            self.config.distance.earth_radius_km,
        );

        progress.finish(format!(
            "Analyzed {} areas in {} groups",
            areas.len(),
            group_summaries.len()
        ));
        log::info!(
            "Run complete: {} assignments, {} cluster rows, {} diagnostics, {} group errors",
            clustered.assignments.len(),
            cluster_metrics.len(),
            diagnostics.len(),
            clustered.errors.len()
        );

        Ok(AnalysisOutput {
            accessibility,
            scores,
            assignments: clustered.assignments,
            dendrograms: clustered.dendrograms,
            cluster_metrics,
            group_summaries,
            diagnostics,
            group_errors: clustered.errors,
        })
    }

    fn cluster(
        &self,
        inputs: &[FeatureInput],
        progress: &dyn ProgressCallback,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Clustered {
        let mut groups: BTreeMap<&str, Vec<FeatureInput>> = BTreeMap::new();
        for input in inputs {
            groups
                .entry(input.group.as_str())
                .or_default()
                .push(input.clone());
        }

        let cross_group = self.clustering.runs_cross_group();
        progress.set_message("Clustering groups".to_string());
        progress.set_total((groups.len() + usize::from(cross_group)) as u64);

        let mut clustered = Clustered::default();
        for (group, members) in &groups {
            log::debug!("Clustering {} areas in {group}", members.len());
            clustered.absorb(group, self.clustering.cluster_group(group, members), diagnostics);
            progress.inc(1);
        }

        if cross_group {
            clustered.absorb(
                access_map_cluster_models::ALL_GROUPS,
                self.clustering.cluster_across_groups(inputs),
                diagnostics,
            );
            progress.inc(1);
        }

        clustered
    }
}

#[derive(Default)]
struct Clustered {
    assignments: Vec<ClusterAssignment>,
    dendrograms: Vec<Dendrogram>,
    errors: Vec<GroupError>,
}

impl Clustered {
    fn absorb(
        &mut self,
        group: &str,
        result: Result<GroupClustering, ClusterError>,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        match result {
            Ok(result) => {
                for id in &result.excluded {
                    diagnostics.push(
                        Diagnostic::new(
                            DiagnosticKind::ExcludedFromClustering,
                            "missing a feature value",
                        )
                        .in_group(group)
                        .for_record(id),
                    );
                }
                for note in result.notes {
                    diagnostics.push(
                        Diagnostic::new(DiagnosticKind::ClusterFallback, note).in_group(group),
                    );
                }
                self.assignments.extend(result.assignments);
                self.dendrograms.extend(result.dendrogram);
            }
            Err(e) => {
                log::error!("Clustering failed for group {group}: {e}");
                self.errors.push(GroupError {
                    group: group.to_string(),
                    message: e.to_string(),
                });
            }
        }
    }
}

/// Keeps the first area for each identifier.
fn dedupe(areas: &[Area], diagnostics: &mut Vec<Diagnostic>) -> Vec<Area> {
    let mut seen = BTreeSet::new();
    areas
        .iter()
        .filter(|area| {
            let first = seen.insert(area.id.as_str());
            if !first {
                log::warn!("Duplicate area id {}; keeping the first occurrence", area.id);
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::DuplicateArea,
                        "duplicate identifier; later occurrence dropped",
                    )
                    .for_record(&area.id),
                );
            }
            first
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use access_map_cluster_models::{ALL_GROUPS, ClusterAlgorithm};
    use access_map_distance::distance_attribute;
    use access_map_geography_models::attributes;
    use access_map_scoring::WeightedTerm;

    use super::*;

    fn area(id: &str, group: &str, lat: f64, lon: f64, revenue: f64, employment: f64) -> Area {
        let attributes: BTreeMap<String, f64> = [
            (attributes::ESTIMATED_REVENUE_M, revenue),
            (attributes::TOTAL_EMPLOYMENT, employment),
            (attributes::INDUSTRY_SHARE_PCT, employment / 10.0),
            (attributes::WEALTH_RATIO, lat.abs() + 1.0),
            (attributes::HOUSEHOLDS_200K, employment * 2.0),
            (attributes::HOUSEHOLDS_200K_PER_KM2, lon.abs() + 1.0),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        Area {
            id: id.to_string(),
            latitude: Some(lat),
            longitude: Some(lon),
            group: Some(group.to_string()),
            attributes,
        }
    }

    fn airport(id: &str, lat: f64, lon: f64) -> Facility {
        Facility {
            id: id.to_string(),
            latitude: Some(lat),
            longitude: Some(lon),
            kind: FacilityKind::Airport,
            ownership_code: "PU".to_string(),
            name: Some(format!("{id} Airport")),
        }
    }

    fn pipeline_with_radii(radii_km: Vec<f64>) -> Pipeline {
        let mut config = AnalysisConfig::default();
        config.distance.radii_km = radii_km;
        Pipeline::new(config).unwrap()
    }

    #[test]
    fn three_area_scenario_distances_and_radius_counts() {
        let pipeline = pipeline_with_radii(vec![10.0, 100.0, 2000.0]);
        let areas = vec![
            area("1", "g", 0.0, 0.0, 10.0, 100.0),
            area("2", "g", 0.0, 1.0, 20.0, 200.0),
            area("3", "g", 10.0, 10.0, 30.0, 300.0),
        ];
        let output = pipeline
            .run(&areas, &[airport("F", 0.0, 0.5)], &NullProgress)
            .unwrap();

        let distances: Vec<f64> = output
            .accessibility
            .iter()
            .map(|r| r.nearest(FacilityKind::Airport).unwrap().distance_km)
            .collect();
        assert!(distances[0] <= distances[1] + 1e-9, "{distances:?}");
        assert!(distances[1] < distances[2], "{distances:?}");
        assert!((distances[0] - 55.6).abs() < 0.1, "{distances:?}");

        let within = |radius_index: usize| {
            output
                .accessibility
                .iter()
                .filter(|r| r.radius_counts[radius_index].total > 0)
                .count()
        };
        assert_eq!(within(0), 0);
        assert_eq!(within(1), 2);
        assert_eq!(within(2), 3);

        let travel = output.accessibility[0]
            .nearest(FacilityKind::Airport)
            .unwrap()
            .estimated_travel_minutes;
        assert!((travel - distances[0] * 1.5).abs() < 1e-9);
    }

    #[test]
    fn identical_revenue_scores_identically() {
        let pipeline = pipeline_with_radii(vec![10.0]);
        let areas = vec![
            area("a", "g", 40.0, -74.0, 55.0, 10.0),
            area("b", "g", 41.0, -73.0, 55.0, 9000.0),
            area("c", "g", 42.0, -72.0, 5.0, 300.0),
        ];
        let output = pipeline
            .run(&areas, &[airport("F", 40.5, -73.5)], &NullProgress)
            .unwrap();
        let revenue = |i: usize| output.scores.scores[i].components["revenue_norm"];
        assert_eq!(revenue(0), revenue(1));
        assert_eq!(revenue(0), Some(1.0));
        assert_eq!(revenue(2), Some(0.0));
    }

    #[test]
    fn single_area_group_gets_one_cluster_per_algorithm() {
        let pipeline = pipeline_with_radii(vec![10.0]);
        let mut areas: Vec<Area> = (0..12)
            .map(|i| {
                let x = f64::from(i);
                area(&format!("big-{i}"), "big", 40.0 + x * 0.05, -74.0 + x * 0.03, x, x * 10.0)
            })
            .collect();
        areas.push(area("lonely", "solo", 34.0, -118.0, 1.0, 1.0));

        let output = pipeline
            .run(&areas, &[airport("F", 40.3, -73.8)], &NullProgress)
            .unwrap();
        assert!(output.group_errors.is_empty());

        let solo: Vec<&ClusterAssignment> = output
            .assignments
            .iter()
            .filter(|a| a.group == "solo")
            .collect();
        assert_eq!(solo.len(), 3);
        assert!(solo.iter().all(|a| a.label == 0));
        assert!(
            output
                .diagnostics
                .iter()
                .any(|d| d.kind == DiagnosticKind::ClusterFallback
                    && d.group.as_deref() == Some("solo"))
        );

        let cross: Vec<&ClusterAssignment> = output
            .assignments
            .iter()
            .filter(|a| a.algorithm == ClusterAlgorithm::CrossGroupKMeans)
            .collect();
        assert_eq!(cross.len(), 13);
        assert!(cross.iter().all(|a| a.group == ALL_GROUPS && a.label < 2));

        assert!(output.dendrograms.iter().any(|d| d.group == "big"));
        assert_eq!(output.group_summaries.len(), 2);

        let noise_rows = output
            .cluster_metrics
            .iter()
            .filter(|m| m.algorithm == ClusterAlgorithm::Dbscan)
            .map(|m| m.member_count)
            .sum::<usize>();
        assert_eq!(noise_rows, 13);
    }

    #[test]
    fn unresolved_and_duplicate_areas_are_diagnosed() {
        let pipeline = pipeline_with_radii(vec![10.0]);
        let mut lost = area("lost", "g", 0.0, 0.0, 1.0, 1.0);
        lost.latitude = None;
        let areas = vec![
            area("a", "g", 40.0, -74.0, 1.0, 1.0),
            area("a", "g", 50.0, -70.0, 2.0, 2.0),
            lost,
            area("b", "g", 40.1, -74.1, 3.0, 3.0),
        ];
        let mut bad_facility = airport("X", 0.0, 0.0);
        bad_facility.longitude = Some(400.0);

        let output = pipeline
            .run(&areas, &[airport("F", 40.0, -74.0), bad_facility], &NullProgress)
            .unwrap();

        assert_eq!(output.accessibility.len(), 3);
        let lost_row = output
            .accessibility
            .iter()
            .find(|r| r.area_id == "lost")
            .unwrap();
        assert_eq!(lost_row.resolution, Resolution::Unresolved);
        assert!(lost_row.distances.is_empty());

        let kinds: Vec<DiagnosticKind> = output.diagnostics.iter().map(|d| d.kind).collect();
        assert!(kinds.contains(&DiagnosticKind::DuplicateArea));
        assert!(kinds.contains(&DiagnosticKind::UnresolvedArea));
        assert!(kinds.contains(&DiagnosticKind::UnresolvedFacility));
        assert!(kinds.contains(&DiagnosticKind::EmptyFacilityKind));
        assert!(kinds.contains(&DiagnosticKind::ExcludedFromClustering));

        assert!(
            output
                .assignments
                .iter()
                .all(|a| a.area_id != "lost")
        );
    }

    #[test]
    fn missing_facility_kind_yields_null_nearest_not_error() {
        let pipeline = pipeline_with_radii(vec![10.0]);
        let areas = vec![area("a", "g", 40.0, -74.0, 1.0, 1.0)];
        let output = pipeline.run(&areas, &[], &NullProgress).unwrap();
        let record = &output.accessibility[0];
        assert_eq!(record.resolution, Resolution::Resolved);
        assert!(record.nearest(FacilityKind::Airport).is_none());
        assert_eq!(
            output.scores.scores[0]
                .components
                .get("airport_distance_sq")
                .copied()
                .flatten(),
            None
        );
        assert!(
            !record
                .derived_attributes()
                .contains_key(&distance_attribute(FacilityKind::Airport))
        );
    }

    #[test]
    fn invalid_weights_fail_before_running() {
        let mut config = AnalysisConfig::default();
        config.scoring.composites[0].terms = vec![
            WeightedTerm::new("revenue_norm", 0.5),
            WeightedTerm::new("employment_norm", 0.3),
        ];
        assert!(matches!(
            Pipeline::new(config),
            Err(PipelineError::Scoring(ScoringError::WeightSum { .. }))
        ));
    }

    #[test]
    fn unknown_component_attribute_fails_before_running() {
        let mut config = AnalysisConfig::default();
        config
            .areas
            .attribute_columns
            .retain(|c| c != attributes::WEALTH_RATIO);
        assert!(matches!(
            Pipeline::new(config),
            Err(PipelineError::Scoring(ScoringError::UnknownAttribute { .. }))
        ));
    }

    #[test]
    fn failed_group_is_recorded_and_others_kept() {
        let mut clustered = Clustered::default();
        let mut diagnostics = Vec::new();
        clustered.absorb(
            "ok",
            Ok(GroupClustering {
                group: "ok".to_string(),
                assignments: vec![ClusterAssignment {
                    area_id: "a".to_string(),
                    group: "ok".to_string(),
                    algorithm: ClusterAlgorithm::KMeans,
                    label: 0,
                }],
                ..GroupClustering::default()
            }),
            &mut diagnostics,
        );
        clustered.absorb(
            "bad",
            Err(ClusterError::NonFiniteFeature {
                group: "bad".to_string(),
                area_id: "b".to_string(),
            }),
            &mut diagnostics,
        );
        assert_eq!(clustered.assignments.len(), 1);
        assert_eq!(clustered.errors.len(), 1);
        assert_eq!(clustered.errors[0].group, "bad");
    }
}
