//! Analysis configuration, loaded from TOML.
//!
//! Every section has serde defaults, so an empty file reproduces
//! [`AnalysisConfig::default`].

use std::collections::BTreeSet;
use std::path::Path;

use access_map_cluster::{ClusteringConfig, FeatureField};
use access_map_distance::{DistanceConfig, derived_attribute_names};
use access_map_facility::RuleTable;
use access_map_ingest_models::{AreaSchema, FacilitySchema};
use access_map_metrics::MetricsConfig;
use access_map_scoring::ScoringConfig;
use serde::{Deserialize, Serialize};

use crate::PipelineError;

/// Complete configuration of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Area input columns.
    pub areas: AreaSchema,
    /// Facility input columns.
    pub facilities: FacilitySchema,
    /// Facility classification rules; the embedded table when absent.
    pub rules: Option<RuleTable>,
    /// Distance engine parameters.
    pub distance: DistanceConfig,
    /// Component, composite, and selection definitions.
    pub scoring: ScoringConfig,
    /// Clustering algorithms and parameters.
    pub clustering: ClusteringConfig,
    /// Cluster aggregation.
    pub metrics: MetricsConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            areas: AreaSchema::default(),
            facilities: FacilitySchema::default(),
            rules: None,
            distance: DistanceConfig::default(),
            scoring: ScoringConfig::default(),
            clustering: ClusteringConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] if the document is malformed.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, PipelineError> {
        Ok(toml::de::from_str(toml_str)?)
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Io`] if the file cannot be read, or
    /// [`PipelineError::Config`] if it is malformed.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let contents = std::fs::read_to_string(path)?;
        log::debug!("Loaded configuration from {}", path.display());
        Self::from_toml_str(&contents)
    }

    /// The rule table in effect.
    #[must_use]
    pub fn rule_table(&self) -> RuleTable {
        self.rules.clone().unwrap_or_else(RuleTable::default_rules)
    }

    /// Attribute names available to scoring, clustering, and metrics: the
    /// area attribute columns plus the derived accessibility attributes.
    #[must_use]
    pub fn known_attributes(&self) -> BTreeSet<String> {
        self.areas
            .attribute_columns
            .iter()
            .cloned()
            .chain(derived_attribute_names())
            .collect()
    }

    /// Composite and combined score names.
    #[must_use]
    pub fn known_scores(&self) -> BTreeSet<String> {
        self.scoring
            .score_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Checks that every clustering feature refers to something the run
    /// will produce.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UnknownFeature`] for the first field that
    /// names an unknown attribute or score.
    pub fn validate_features(&self) -> Result<(), PipelineError> {
        let attributes = self.known_attributes();
        let scores = self.known_scores();
        for field in &self.clustering.features.fields {
            let known = match field {
                FeatureField::Attribute { name } => attributes.contains(name),
                FeatureField::Score { name } => scores.contains(name),
                FeatureField::Latitude
                | FeatureField::Longitude
                | FeatureField::NearestDistance { .. }
                | FeatureField::TravelTime { .. } => true,
            };
            if !known {
                return Err(PipelineError::UnknownFeature(field.label()));
            }
        }
        Ok(())
    }
}
