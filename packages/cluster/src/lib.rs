#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Clustering engine.
//!
//! Three interchangeable strategies share the [`ClusterStrategy`]
//! interface: partitional ([`KMeans`]), density-based ([`Dbscan`]) and
//! agglomerative ([`Agglomerative`]). The [`ClusteringEngine`] builds
//! feature vectors per group and runs every configured strategy, plus the
//! optional cross-group k-means baseline.

pub mod dbscan;
pub mod features;
pub mod hierarchical;
pub mod kmeans;

use std::collections::BTreeMap;

use access_map_cluster_models::{
    ALL_GROUPS, ClusterAlgorithm, ClusterAssignment, ClusterLabel, Dendrogram, MergeStep,
    NOISE_LABEL, SINGLE_CLUSTER_LABEL,
};
use serde::{Deserialize, Serialize};

pub use dbscan::Dbscan;
pub use features::{FeatureConfig, FeatureField, FeatureInput, FeatureMatrix};
pub use hierarchical::{Agglomerative, Linkage};
pub use kmeans::KMeans;

/// Clustering configuration errors and per-group failures.
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    /// A derived K rule with a zero divisor or zero minimum.
    #[error("Invalid K rule: divisor {divisor} and minimum {min} must both be positive")]
    InvalidKRule {
        /// Group-size divisor.
        divisor: usize,
        /// Lower bound on K.
        min: usize,
    },

    /// A fixed K of zero.
    #[error("Fixed K must be positive")]
    ZeroK,

    /// DBSCAN neighbourhood radius is not positive and finite.
    #[error("Invalid DBSCAN eps {0}: must be positive and finite")]
    InvalidEps(f64),

    /// DBSCAN minimum neighbourhood size of zero.
    #[error("DBSCAN min_samples must be at least 1")]
    InvalidMinSamples,

    /// k-means iteration cap of zero.
    #[error("k-means max_iterations must be at least 1")]
    InvalidIterations,

    /// No feature fields configured.
    #[error("At least one feature field is required")]
    NoFeatures,

    /// A feature value became non-finite in a group.
    #[error("Non-finite feature value for area {area_id} in group {group}")]
    NonFiniteFeature {
        /// Group being clustered.
        group: String,
        /// Offending area.
        area_id: String,
    },
}

/// How many clusters a partitional or hierarchical run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum KRule {
    /// `K = max(min, floor(n / divisor))`.
    Derived {
        /// Group-size divisor.
        divisor: usize,
        /// Lower bound on K.
        min: usize,
    },
    /// A fixed K.
    Fixed {
        /// Number of clusters.
        k: usize,
    },
}

impl Default for KRule {
    fn default() -> Self {
        Self::Derived { divisor: 5, min: 2 }
    }
}

impl KRule {
    /// K for a group of `n` points.
    #[must_use]
    pub fn k_for(self, n: usize) -> usize {
        match self {
            Self::Derived { divisor, min } => min.max(n / divisor.max(1)),
            Self::Fixed { k } => k,
        }
    }

    fn validate(self) -> Result<(), ClusterError> {
        match self {
            Self::Derived { divisor, min } if divisor == 0 || min == 0 => {
                Err(ClusterError::InvalidKRule { divisor, min })
            }
            Self::Fixed { k: 0 } => Err(ClusterError::ZeroK),
            Self::Derived { .. } | Self::Fixed { .. } => Ok(()),
        }
    }
}

/// Labels produced by one strategy run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Clustering {
    /// One label per input vector.
    pub labels: Vec<ClusterLabel>,
    /// Merge tree, for hierarchical runs.
    pub merges: Option<Vec<MergeStep>>,
    /// Set when the run fell back to a single cluster.
    pub note: Option<String>,
}

impl Clustering {
    fn single(n: usize, note: String) -> Self {
        Self {
            labels: vec![SINGLE_CLUSTER_LABEL; n],
            merges: None,
            note: Some(note),
        }
    }
}

/// Common interface of every clustering algorithm.
pub trait ClusterStrategy {
    /// Identifier reported on assignments.
    fn algorithm(&self) -> ClusterAlgorithm;

    /// Fewest points the algorithm needs for a group of `n`.
    fn min_points(&self, n: usize) -> usize;

    /// Runs the algorithm on at least [`Self::min_points`] points.
    fn cluster(&self, points: &[Vec<f64>]) -> Clustering;

    /// Assigns one label per point, falling back to a single cluster
    /// (label 0) when there are too few points.
    fn assign(&self, points: &[Vec<f64>]) -> Clustering {
        if points.is_empty() {
            return Clustering::default();
        }
        let required = self.min_points(points.len());
        if points.len() < required {
            return Clustering::single(
                points.len(),
                format!(
                    "{} needs {required} points but got {}; assigned a single cluster",
                    self.algorithm(),
                    points.len()
                ),
            );
        }
        self.cluster(points)
    }
}

/// Squared Euclidean distance between two feature vectors.
#[must_use]
pub fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Renumbers cluster labels `0, 1, …` by first appearance. Noise stays noise.
#[must_use]
pub fn renumber(labels: &[ClusterLabel]) -> Vec<ClusterLabel> {
    let mut mapping: BTreeMap<ClusterLabel, ClusterLabel> = BTreeMap::new();
    labels
        .iter()
        .map(|&label| {
            if label == NOISE_LABEL {
                return NOISE_LABEL;
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            let next = mapping.len() as ClusterLabel;
            *mapping.entry(label).or_insert(next)
        })
        .collect()
}

/// Partitional clustering parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KMeansConfig {
    /// K rule.
    pub k_rule: KRule,
    /// Iteration cap.
    pub max_iterations: usize,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            k_rule: KRule::default(),
            max_iterations: 300,
        }
    }
}

/// Density-based clustering parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbscanConfig {
    /// Neighbourhood radius.
    pub eps: f64,
    /// Minimum neighbourhood size (point included).
    pub min_samples: usize,
}

impl Default for DbscanConfig {
    fn default() -> Self {
        let Dbscan { eps, min_samples } = Dbscan::default();
        Self { eps, min_samples }
    }
}

/// Hierarchical clustering parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchicalConfig {
    /// Flat cut K rule.
    pub k_rule: KRule,
    /// Linkage criterion.
    pub linkage: Linkage,
}

fn default_algorithms() -> Vec<ClusterAlgorithm> {
    ClusterAlgorithm::all().to_vec()
}

/// Full clustering configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    /// Algorithms to run. [`ClusterAlgorithm::CrossGroupKMeans`] enables
    /// the run over every group at once.
    pub algorithms: Vec<ClusterAlgorithm>,
    /// k-means parameters (also used by the cross-group run).
    pub kmeans: KMeansConfig,
    /// DBSCAN parameters.
    pub dbscan: DbscanConfig,
    /// Hierarchical parameters.
    pub hierarchical: HierarchicalConfig,
    /// Feature vector fields.
    pub features: FeatureConfig,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            algorithms: default_algorithms(),
            kmeans: KMeansConfig::default(),
            dbscan: DbscanConfig::default(),
            hierarchical: HierarchicalConfig::default(),
            features: FeatureConfig::default(),
        }
    }
}

impl ClusteringConfig {
    /// Checks every parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError`] for the first invalid parameter.
    pub fn validate(&self) -> Result<(), ClusterError> {
        self.kmeans.k_rule.validate()?;
        self.hierarchical.k_rule.validate()?;
        if self.kmeans.max_iterations == 0 {
            return Err(ClusterError::InvalidIterations);
        }
        if !self.dbscan.eps.is_finite() || self.dbscan.eps <= 0.0 {
            return Err(ClusterError::InvalidEps(self.dbscan.eps));
        }
        if self.dbscan.min_samples == 0 {
            return Err(ClusterError::InvalidMinSamples);
        }
        if self.features.fields.is_empty() {
            return Err(ClusterError::NoFeatures);
        }
        Ok(())
    }
}

/// Everything one clustering call produced for a group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupClustering {
    /// Group label ([`ALL_GROUPS`] for the cross-group run).
    pub group: String,
    /// Assignments, grouped by algorithm, each in input order.
    pub assignments: Vec<ClusterAssignment>,
    /// Hierarchical merge tree, if one was built.
    pub dendrogram: Option<Dendrogram>,
    /// Areas left out for missing feature values.
    pub excluded: Vec<String>,
    /// Fallback notes.
    pub notes: Vec<String>,
}

/// Runs the configured strategies over feature vectors.
#[derive(Debug, Clone)]
pub struct ClusteringEngine {
    config: ClusteringConfig,
}

impl ClusteringEngine {
    /// Validates `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError`] if the configuration is invalid.
    pub fn new(config: ClusteringConfig) -> Result<Self, ClusterError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The validated configuration.
    #[must_use]
    pub const fn config(&self) -> &ClusteringConfig {
        &self.config
    }

    /// Strategy for a within-group algorithm. The cross-group algorithm
    /// needs a group count; see [`Self::cross_group_strategy`].
    #[must_use]
    pub fn strategy(&self, algorithm: ClusterAlgorithm) -> Box<dyn ClusterStrategy> {
        match algorithm {
            ClusterAlgorithm::KMeans => Box::new(KMeans::new(
                self.config.kmeans.k_rule,
                self.config.kmeans.max_iterations,
            )),
            ClusterAlgorithm::Dbscan => Box::new(Dbscan {
                eps: self.config.dbscan.eps,
                min_samples: self.config.dbscan.min_samples,
            }),
            ClusterAlgorithm::Hierarchical => Box::new(Agglomerative {
                k_rule: self.config.hierarchical.k_rule,
                linkage: self.config.hierarchical.linkage,
            }),
            ClusterAlgorithm::CrossGroupKMeans => Box::new(self.cross_group_strategy(1)),
        }
    }

    /// k-means with K fixed to `group_count`.
    #[must_use]
    pub const fn cross_group_strategy(&self, group_count: usize) -> KMeans {
        KMeans::cross_group(group_count, self.config.kmeans.max_iterations)
    }

    /// Whether the cross-group baseline is configured.
    #[must_use]
    pub fn runs_cross_group(&self) -> bool {
        self.config
            .algorithms
            .contains(&ClusterAlgorithm::CrossGroupKMeans)
    }

    /// Runs every configured within-group algorithm over one group.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::NonFiniteFeature`] if a feature value is not
    /// finite after standardization.
    pub fn cluster_group(
        &self,
        group: &str,
        inputs: &[FeatureInput],
    ) -> Result<GroupClustering, ClusterError> {
        let strategies: Vec<Box<dyn ClusterStrategy>> = self
            .config
            .algorithms
            .iter()
            .filter(|&&a| a != ClusterAlgorithm::CrossGroupKMeans)
            .map(|&a| self.strategy(a))
            .collect();
        self.run(group, inputs, &strategies)
    }

    /// Runs the cross-group k-means over every area, with K equal to the
    /// number of distinct groups among `inputs`.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::NonFiniteFeature`] if a feature value is not
    /// finite after standardization.
    pub fn cluster_across_groups(
        &self,
        inputs: &[FeatureInput],
    ) -> Result<GroupClustering, ClusterError> {
        let mut groups: Vec<&str> = inputs.iter().map(|i| i.group.as_str()).collect();
        groups.sort_unstable();
        groups.dedup();
        log::info!(
            "Cross-group k-means over {} areas with K={}",
            inputs.len(),
            groups.len()
        );
        let strategy: Box<dyn ClusterStrategy> =
            Box::new(self.cross_group_strategy(groups.len().max(1)));
        self.run(ALL_GROUPS, inputs, &[strategy])
    }

    fn run(
        &self,
        group: &str,
        inputs: &[FeatureInput],
        strategies: &[Box<dyn ClusterStrategy>],
    ) -> Result<GroupClustering, ClusterError> {
        let matrix = self.config.features.build(group, inputs);
        if let Some(bad) = matrix
            .vectors
            .iter()
            .find(|v| v.values.iter().any(|x| !x.is_finite()))
        {
            return Err(ClusterError::NonFiniteFeature {
                group: group.to_string(),
                area_id: bad.area_id.clone(),
            });
        }
        let rows = matrix.rows();

        let mut result = GroupClustering {
            group: group.to_string(),
            excluded: matrix.excluded.clone(),
            ..GroupClustering::default()
        };

        for strategy in strategies {
            let algorithm = strategy.algorithm();
            let clustering = strategy.assign(&rows);

            if let Some(note) = clustering.note {
                log::debug!("{group}: {note}");
                result.notes.push(note);
            }
            if let Some(merges) = clustering.merges {
                result.dendrogram = Some(Dendrogram {
                    group: group.to_string(),
                    leaves: matrix.vectors.iter().map(|v| v.area_id.clone()).collect(),
                    merges,
                });
            }

            result.assignments.extend(
                matrix
                    .vectors
                    .iter()
                    .zip(clustering.labels)
                    .map(|(vector, label)| ClusterAssignment {
                        area_id: vector.area_id.clone(),
                        group: group.to_string(),
                        algorithm,
                        label,
                    }),
            );
        }

        log::debug!(
            "Clustered {} areas in {group} ({} excluded)",
            rows.len(),
            result.excluded.len()
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use access_map_geography_models::GeoPoint;

    use super::*;

    fn inputs(group: &str, n: usize) -> Vec<FeatureInput> {
        (0..n)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let x = i as f64;
                FeatureInput {
                    area_id: format!("{group}-{i}"),
                    group: group.to_string(),
                    position: Some(GeoPoint {
                        lat: 40.0 + (x * 0.3).sin(),
                        lon: -74.0 + (x * 0.7).cos(),
                    }),
                    values: [("nearest_airport_km".to_string(), x * 1.7)]
                        .into_iter()
                        .collect(),
                }
            })
            .collect()
    }

    #[test]
    fn derived_k_matches_documented_examples() {
        let rule = KRule::default();
        assert_eq!(rule.k_for(37), 7);
        assert_eq!(rule.k_for(4), 2);
        assert_eq!(rule.k_for(1), 2);
        assert_eq!(KRule::Fixed { k: 7 }.k_for(100), 7);
    }

    #[test]
    fn renumber_orders_by_first_appearance() {
        assert_eq!(renumber(&[5, 5, 2, -1, 9, 2]), vec![0, 0, 1, -1, 2, 1]);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let mut config = ClusteringConfig::default();
        config.dbscan.eps = 0.0;
        assert!(matches!(
            ClusteringEngine::new(config),
            Err(ClusterError::InvalidEps(_))
        ));

        let mut config = ClusteringConfig::default();
        config.kmeans.k_rule = KRule::Fixed { k: 0 };
        assert!(matches!(
            ClusteringEngine::new(config),
            Err(ClusterError::ZeroK)
        ));

        let mut config = ClusteringConfig::default();
        config.features.fields.clear();
        assert!(matches!(
            ClusteringEngine::new(config),
            Err(ClusterError::NoFeatures)
        ));
    }

    #[test]
    fn single_area_group_is_one_cluster_for_every_algorithm() {
        let engine = ClusteringEngine::new(ClusteringConfig::default()).unwrap();
        let result = engine.cluster_group("solo", &inputs("solo", 1)).unwrap();
        assert_eq!(result.assignments.len(), 3);
        assert!(result.assignments.iter().all(|a| a.label == 0));
        assert_eq!(result.notes.len(), 3);
    }

    #[test]
    fn every_area_gets_one_label_per_algorithm() {
        let engine = ClusteringEngine::new(ClusteringConfig::default()).unwrap();
        let result = engine.cluster_group("g", &inputs("g", 37)).unwrap();
        for algorithm in [
            ClusterAlgorithm::KMeans,
            ClusterAlgorithm::Dbscan,
            ClusterAlgorithm::Hierarchical,
        ] {
            let count = result
                .assignments
                .iter()
                .filter(|a| a.algorithm == algorithm)
                .count();
            assert_eq!(count, 37, "{algorithm}");
        }
        let dendrogram = result.dendrogram.unwrap();
        assert_eq!(dendrogram.leaves.len(), 37);
        assert_eq!(dendrogram.merges.len(), 36);

        let hierarchical: std::collections::BTreeSet<_> = result
            .assignments
            .iter()
            .filter(|a| a.algorithm == ClusterAlgorithm::Hierarchical)
            .map(|a| a.label)
            .collect();
        assert_eq!(hierarchical.len(), 7);
    }

    #[test]
    fn cross_group_uses_group_count() {
        let engine = ClusteringEngine::new(ClusteringConfig::default()).unwrap();
        let mut all = inputs("a", 6);
        all.extend(inputs("b", 6));
        let result = engine.cluster_across_groups(&all).unwrap();
        assert_eq!(result.group, ALL_GROUPS);
        assert_eq!(result.assignments.len(), 12);
        assert!(
            result
                .assignments
                .iter()
                .all(|a| a.algorithm == ClusterAlgorithm::CrossGroupKMeans)
        );
        assert!(result.assignments.iter().all(|a| a.label < 2));
    }

    #[test]
    fn empty_group_yields_no_assignments() {
        let engine = ClusteringEngine::new(ClusteringConfig::default()).unwrap();
        let result = engine.cluster_group("empty", &[]).unwrap();
        assert!(result.assignments.is_empty());
    }
}
