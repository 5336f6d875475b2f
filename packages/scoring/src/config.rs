//! Scoring configuration: components, composites, combined scores, and
//! top-fraction selections.

use access_map_distance::{distance_attribute, travel_time_attribute};
use access_map_facility_models::FacilityKind;
use access_map_geography_models::attributes;
use serde::{Deserialize, Serialize};

/// Which areas are compared against each other during normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationScope {
    /// One baseline across every area in the batch.
    #[default]
    Global,
    /// A separate baseline per group.
    PerGroup,
}

/// Post-normalization transform of a component score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentTransform {
    /// Use the normalized score as is.
    #[default]
    Identity,
    /// Square the normalized score.
    Squared,
}

impl ComponentTransform {
    pub(crate) fn apply(self, score: f64) -> f64 {
        match self {
            Self::Identity => score,
            Self::Squared => score * score,
        }
    }
}

/// A named, normalized view of one raw attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSpec {
    /// Component name referenced by composites.
    pub name: String,
    /// Raw or derived attribute the component reads.
    pub attribute: String,
    /// Transform applied after normalization.
    #[serde(default)]
    pub transform: ComponentTransform,
}

/// How weighted component scores are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeMethod {
    /// `Σ wᵢ·sᵢ`
    #[default]
    Arithmetic,
    /// `Π (sᵢ + ε)^wᵢ`
    Geometric,
}

/// One weighted reference to a component (or, in a combined score, to a
/// composite).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedTerm {
    /// Referenced name.
    pub name: String,
    /// Weight; the weights of one score must sum to 1.0.
    pub weight: f64,
}

impl WeightedTerm {
    /// Convenience constructor.
    #[must_use]
    pub fn new(name: &str, weight: f64) -> Self {
        Self {
            name: name.to_string(),
            weight,
        }
    }
}

const fn unit_scale() -> f64 {
    1.0
}

/// A weighted composite over component scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeSpec {
    /// Composite name.
    pub name: String,
    /// Combination method.
    #[serde(default)]
    pub method: CompositeMethod,
    /// Weighted component references.
    pub terms: Vec<WeightedTerm>,
    /// Presentation multiplier applied to the `[0, 1]` value (e.g. 100).
    #[serde(default = "unit_scale")]
    pub scale: f64,
}

/// An arithmetic combination of composites.
///
/// Uses the unscaled `[0, 1]` composite values, so a 0-100 presentation
/// scale on one input does not skew the blend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedSpec {
    /// Combined score name.
    pub name: String,
    /// Weighted composite references.
    pub terms: Vec<WeightedTerm>,
}

impl CombinedSpec {
    /// Builds a simple (equal-weight) combination of the given composites.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn simple(name: &str, composites: &[&str]) -> Self {
        let weight = 1.0 / composites.len().max(1) as f64;
        Self {
            name: name.to_string(),
            terms: composites
                .iter()
                .map(|c| WeightedTerm::new(c, weight))
                .collect(),
        }
    }
}

/// Top-fraction selection on one composite or combined score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionSpec {
    /// Score to rank by.
    pub score: String,
    /// Fraction to keep, in `(0, 1]` (0.10 keeps the top decile).
    pub top_fraction: f64,
}

/// Full scoring configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Normalization baseline.
    pub scope: NormalizationScope,
    /// Component definitions.
    pub components: Vec<ComponentSpec>,
    /// Composite definitions.
    pub composites: Vec<CompositeSpec>,
    /// Combined score definitions.
    pub combined: Vec<CombinedSpec>,
    /// Top-fraction selections.
    pub selections: Vec<SelectionSpec>,
}

fn component(name: &str, attribute: &str, transform: ComponentTransform) -> ComponentSpec {
    ComponentSpec {
        name: name.to_string(),
        attribute: attribute.to_string(),
        transform,
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        use ComponentTransform::{Identity, Squared};

        Self {
            scope: NormalizationScope::Global,
            components: vec![
                component("revenue_norm", attributes::ESTIMATED_REVENUE_M, Identity),
                component("employment_norm", attributes::TOTAL_EMPLOYMENT, Identity),
                component("industry_share_norm", attributes::INDUSTRY_SHARE_PCT, Identity),
                component(
                    "airport_distance_sq",
                    &distance_attribute(FacilityKind::Airport),
                    Squared,
                ),
                component("wealth_norm", attributes::WEALTH_RATIO, Identity),
                component("households_norm", attributes::HOUSEHOLDS_200K, Identity),
                component("density_norm", attributes::HOUSEHOLDS_200K_PER_KM2, Identity),
                component(
                    "airport_time_sq",
                    &travel_time_attribute(FacilityKind::Airport),
                    Squared,
                ),
            ],
            composites: vec![
                CompositeSpec {
                    name: "corporate_power".to_string(),
                    method: CompositeMethod::Arithmetic,
                    terms: vec![
                        WeightedTerm::new("revenue_norm", 0.4),
                        WeightedTerm::new("employment_norm", 0.3),
                        WeightedTerm::new("industry_share_norm", 0.3),
                    ],
                    scale: 100.0,
                },
                CompositeSpec {
                    name: "corporate_score".to_string(),
                    method: CompositeMethod::Geometric,
                    terms: vec![
                        WeightedTerm::new("revenue_norm", 0.35),
                        WeightedTerm::new("employment_norm", 0.30),
                        WeightedTerm::new("industry_share_norm", 0.15),
                        WeightedTerm::new("airport_distance_sq", 0.20),
                    ],
                    scale: 1.0,
                },
                CompositeSpec {
                    name: "household_wealth".to_string(),
                    method: CompositeMethod::Geometric,
                    terms: vec![
                        WeightedTerm::new("wealth_norm", 0.50),
                        WeightedTerm::new("airport_time_sq", 0.20),
                        WeightedTerm::new("households_norm", 0.20),
                        WeightedTerm::new("density_norm", 0.10),
                    ],
                    scale: 1.0,
                },
            ],
            combined: vec![CombinedSpec {
                name: "combined".to_string(),
                terms: vec![
                    WeightedTerm::new("household_wealth", 0.5),
                    WeightedTerm::new("corporate_power", 0.5),
                ],
            }],
            selections: vec![
                SelectionSpec {
                    score: "corporate_score".to_string(),
                    top_fraction: 0.10,
                },
                SelectionSpec {
                    score: "household_wealth".to_string(),
                    top_fraction: 0.10,
                },
            ],
        }
    }
}

impl ScoringConfig {
    /// Raw and derived attribute names referenced by components.
    #[must_use]
    pub fn referenced_attributes(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.components.iter().map(|c| c.attribute.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Names of every composite and combined score, in definition order.
    #[must_use]
    pub fn score_names(&self) -> Vec<&str> {
        self.composites
            .iter()
            .map(|c| c.name.as_str())
            .chain(self.combined.iter().map(|c| c.name.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_combination_has_equal_weights() {
        let spec = CombinedSpec::simple("both", &["a", "b"]);
        assert_eq!(spec.terms.len(), 2);
        assert!(spec.terms.iter().all(|t| (t.weight - 0.5).abs() < 1e-12));
    }

    #[test]
    fn default_references_derived_airport_fields() {
        let config = ScoringConfig::default();
        let attrs = config.referenced_attributes();
        assert!(attrs.contains(&"nearest_airport_km"));
        assert!(attrs.contains(&"nearest_airport_minutes"));
        assert!(attrs.contains(&attributes::TOTAL_EMPLOYMENT));
    }

    #[test]
    fn score_names_list_composites_then_combined() {
        let config = ScoringConfig::default();
        assert_eq!(
            config.score_names(),
            vec![
                "corporate_power",
                "corporate_score",
                "household_wealth",
                "combined"
            ]
        );
    }
}
