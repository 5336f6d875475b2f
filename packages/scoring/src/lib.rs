#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Composite index calculator.
//!
//! Normalizes raw area attributes into `[0, 1]` component scores within a
//! comparison scope, combines them into weighted composites, and ranks
//! areas by top-fraction selections.

pub mod config;
pub mod normalize;
pub mod selection;

use std::collections::{BTreeMap, BTreeSet};

use access_map_geography_models::Area;
use serde::{Deserialize, Serialize};

pub use config::{
    CombinedSpec, ComponentSpec, ComponentTransform, CompositeMethod, CompositeSpec,
    NormalizationScope, ScoringConfig, SelectionSpec, WeightedTerm,
};
pub use normalize::{NEUTRAL_SCORE, min_max_normalize};
pub use selection::{Selection, SelectionReport};

/// Offset added to each component before exponentiation in a geometric
/// composite, so a zero component does not zero the whole product.
pub const GEOMETRIC_EPSILON: f64 = 1e-10;

/// Allowed deviation of a weight sum from 1.0.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Configuration errors. All of them are raised by
/// [`CompositeIndexCalculator::new`] before any area is scored.
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    /// Weights of a composite do not sum to 1.0.
    #[error("Weights of '{name}' sum to {sum}, expected 1.0")]
    WeightSum {
        /// Composite or combined score name.
        name: String,
        /// Observed sum.
        sum: f64,
    },

    /// A weight is negative or not finite.
    #[error("Weight {weight} for '{term}' in '{name}' must be a non-negative finite number")]
    InvalidWeight {
        /// Composite or combined score name.
        name: String,
        /// Offending term.
        term: String,
        /// Offending weight.
        weight: f64,
    },

    /// A component reads an attribute the input does not provide.
    #[error("Component '{component}' references unknown attribute '{attribute}'")]
    UnknownAttribute {
        /// Component name.
        component: String,
        /// Missing attribute name.
        attribute: String,
    },

    /// A composite references a component that is not defined.
    #[error("Composite '{name}' references unknown component '{component}'")]
    UnknownComponent {
        /// Composite name.
        name: String,
        /// Missing component name.
        component: String,
    },

    /// A combined score or selection references an unknown composite.
    #[error("'{name}' references unknown composite '{composite}'")]
    UnknownComposite {
        /// Referencing score or selection.
        name: String,
        /// Missing composite name.
        composite: String,
    },

    /// Two definitions share a name.
    #[error("Duplicate score name '{0}'")]
    DuplicateName(String),

    /// A composite scale is zero, negative, or not finite.
    #[error("Invalid scale {scale} for composite '{name}'")]
    InvalidScale {
        /// Composite name.
        name: String,
        /// Rejected scale.
        scale: f64,
    },

    /// A selection fraction is outside `(0, 1]`.
    #[error("Invalid top fraction {fraction} for selection on '{score}'")]
    InvalidFraction {
        /// Ranked score.
        score: String,
        /// Rejected fraction.
        fraction: f64,
    },

    /// A composite or combined score has no terms.
    #[error("'{0}' has no weighted terms")]
    EmptyTerms(String),
}

/// Scoring input for one area: identifier, group and every raw or derived
/// attribute available to components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringRow {
    /// Area identifier.
    pub area_id: String,
    /// Area group label.
    pub group: Option<String>,
    /// Raw and derived attribute values.
    pub attributes: BTreeMap<String, f64>,
}

impl ScoringRow {
    /// Builds a row from an area's own attributes plus derived ones
    /// (derived values win on a name clash).
    #[must_use]
    pub fn from_area(area: &Area, derived: BTreeMap<String, f64>) -> Self {
        let mut attributes: BTreeMap<String, f64> = area
            .attributes
            .iter()
            .filter(|(_, v)| v.is_finite())
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        attributes.extend(derived.into_iter().filter(|(_, v)| v.is_finite()));

        Self {
            area_id: area.id.clone(),
            group: area.group.clone(),
            attributes,
        }
    }

    fn scope_key(&self, scope: NormalizationScope) -> Option<&str> {
        match scope {
            NormalizationScope::Global => None,
            NormalizationScope::PerGroup => Some(
                self.group
                    .as_deref()
                    .filter(|g| !g.is_empty())
                    .unwrap_or(access_map_geography_models::UNGROUPED),
            ),
        }
    }
}

/// A composite value in `[0, 1]` and its presentation-scaled counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositeValue {
    /// Unscaled value in `[0, 1]`.
    pub unit: f64,
    /// `unit × scale`.
    pub scaled: f64,
}

/// Scores for one area. `None` marks a value that could not be computed
/// because an input attribute was missing for this area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeScore {
    /// Area identifier.
    pub area_id: String,
    /// Area group label.
    pub group: Option<String>,
    /// Component scores by component name.
    pub components: BTreeMap<String, Option<f64>>,
    /// Composite values by composite name.
    pub composites: BTreeMap<String, Option<CompositeValue>>,
    /// Combined scores by name, computed over unscaled composites.
    pub combined: BTreeMap<String, Option<f64>>,
}

impl CompositeScore {
    /// Looks up a `[0, 1]` value by composite, combined, or component name.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<f64> {
        if let Some(value) = self.composites.get(name) {
            return value.map(|v| v.unit);
        }
        if let Some(value) = self.combined.get(name) {
            return *value;
        }
        self.components.get(name).copied().flatten()
    }

    /// Presentation value of a composite (scaled) or a combined score.
    #[must_use]
    pub fn display_value(&self, name: &str) -> Option<f64> {
        if let Some(value) = self.composites.get(name) {
            return value.map(|v| v.scaled);
        }
        self.value(name)
    }
}

/// A component whose attribute had zero range within a scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DegenerateComponent {
    /// Scope group, or `None` for the global scope.
    pub group: Option<String>,
    /// Component name.
    pub component: String,
}

/// Output of a scoring pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreTable {
    /// One score per input row, in input order.
    pub scores: Vec<CompositeScore>,
    /// Components that received the neutral score in some scope.
    pub degenerate: Vec<DegenerateComponent>,
    /// Top-fraction selections.
    pub selections: SelectionReport,
}

/// Validated scoring configuration, ready to score batches.
#[derive(Debug, Clone)]
pub struct CompositeIndexCalculator {
    config: ScoringConfig,
}

fn check_terms(
    name: &str,
    terms: &[WeightedTerm],
    known: &BTreeSet<&str>,
    unknown: impl Fn(&str) -> ScoringError,
) -> Result<(), ScoringError> {
    if terms.is_empty() {
        return Err(ScoringError::EmptyTerms(name.to_string()));
    }
    for term in terms {
        if !term.weight.is_finite() || term.weight < 0.0 {
            return Err(ScoringError::InvalidWeight {
                name: name.to_string(),
                term: term.name.clone(),
                weight: term.weight,
            });
        }
        if !known.contains(term.name.as_str()) {
            return Err(unknown(&term.name));
        }
    }
    let sum: f64 = terms.iter().map(|t| t.weight).sum();
    if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
        return Err(ScoringError::WeightSum {
            name: name.to_string(),
            sum,
        });
    }
    Ok(())
}

impl CompositeIndexCalculator {
    /// Validates `config` against the attributes the input will provide.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError`] for weights that do not sum to 1.0,
    /// negative weights, unknown attribute/component/composite references,
    /// duplicate names, invalid scales, or invalid selection fractions.
    pub fn new(
        config: ScoringConfig,
        known_attributes: &BTreeSet<String>,
    ) -> Result<Self, ScoringError> {
        let mut component_names = BTreeSet::new();
        for component in &config.components {
            if !component_names.insert(component.name.as_str()) {
                return Err(ScoringError::DuplicateName(component.name.clone()));
            }
            if !known_attributes.contains(&component.attribute) {
                return Err(ScoringError::UnknownAttribute {
                    component: component.name.clone(),
                    attribute: component.attribute.clone(),
                });
            }
        }

        let mut score_names = BTreeSet::new();
        for composite in &config.composites {
            if component_names.contains(composite.name.as_str())
                || !score_names.insert(composite.name.as_str())
            {
                return Err(ScoringError::DuplicateName(composite.name.clone()));
            }
            if !composite.scale.is_finite() || composite.scale <= 0.0 {
                return Err(ScoringError::InvalidScale {
                    name: composite.name.clone(),
                    scale: composite.scale,
                });
            }
            check_terms(&composite.name, &composite.terms, &component_names, |c| {
                ScoringError::UnknownComponent {
                    name: composite.name.clone(),
                    component: c.to_string(),
                }
            })?;
        }

        let composite_names: BTreeSet<&str> =
            config.composites.iter().map(|c| c.name.as_str()).collect();
        for combined in &config.combined {
            if component_names.contains(combined.name.as_str())
                || !score_names.insert(combined.name.as_str())
            {
                return Err(ScoringError::DuplicateName(combined.name.clone()));
            }
            check_terms(&combined.name, &combined.terms, &composite_names, |c| {
                ScoringError::UnknownComposite {
                    name: combined.name.clone(),
                    composite: c.to_string(),
                }
            })?;
        }

        for selection in &config.selections {
            if !score_names.contains(selection.score.as_str()) {
                return Err(ScoringError::UnknownComposite {
                    name: "selection".to_string(),
                    composite: selection.score.clone(),
                });
            }
            let fraction = selection.top_fraction;
            if !fraction.is_finite() || fraction <= 0.0 || fraction > 1.0 {
                return Err(ScoringError::InvalidFraction {
                    score: selection.score.clone(),
                    fraction,
                });
            }
        }

        Ok(Self { config })
    }

    /// The validated configuration.
    #[must_use]
    pub const fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Scores every row and evaluates the configured selections.
    #[must_use]
    pub fn score(&self, rows: &[ScoringRow]) -> ScoreTable {
        let mut scopes: BTreeMap<Option<&str>, Vec<usize>> = BTreeMap::new();
        for (i, row) in rows.iter().enumerate() {
            scopes
                .entry(row.scope_key(self.config.scope))
                .or_default()
                .push(i);
        }

        let mut components: Vec<BTreeMap<String, Option<f64>>> = vec![BTreeMap::new(); rows.len()];
        let mut degenerate = Vec::new();

        for spec in &self.config.components {
            for (scope, members) in &scopes {
                let values: Vec<Option<f64>> = members
                    .iter()
                    .map(|&i| rows[i].attributes.get(&spec.attribute).copied())
                    .collect();
                let (normalized, is_degenerate) = min_max_normalize(&values);
                if is_degenerate {
                    log::debug!(
                        "Component {} has zero range in scope {}; using neutral score",
                        spec.name,
                        scope.unwrap_or("global")
                    );
                    degenerate.push(DegenerateComponent {
                        group: scope.map(str::to_string),
                        component: spec.name.clone(),
                    });
                }
                for (&i, score) in members.iter().zip(normalized) {
                    components[i].insert(spec.name.clone(), score.map(|s| spec.transform.apply(s)));
                }
            }
        }

        let scores: Vec<CompositeScore> = rows
            .iter()
            .zip(components)
            .map(|(row, components)| self.compose(row, components))
            .collect();

        let selections = SelectionReport::evaluate(&scores, &self.config.selections);

        log::info!(
            "Scored {} areas ({} degenerate component scopes)",
            scores.len(),
            degenerate.len()
        );

        ScoreTable {
            scores,
            degenerate,
            selections,
        }
    }

    fn compose(&self, row: &ScoringRow, components: BTreeMap<String, Option<f64>>) -> CompositeScore {
        let composites: BTreeMap<String, Option<CompositeValue>> = self
            .config
            .composites
            .iter()
            .map(|spec| {
                let value = weighted(&spec.terms, |name| components.get(name).copied().flatten())
                    .map(|inputs| combine(spec.method, &inputs))
                    .map(|unit| CompositeValue {
                        unit,
                        scaled: unit * spec.scale,
                    });
                (spec.name.clone(), value)
            })
            .collect();

        let combined = self
            .config
            .combined
            .iter()
            .map(|spec| {
                let value = weighted(&spec.terms, |name| {
                    composites.get(name).copied().flatten().map(|v| v.unit)
                })
                .map(|inputs| combine(CompositeMethod::Arithmetic, &inputs));
                (spec.name.clone(), value)
            })
            .collect();

        CompositeScore {
            area_id: row.area_id.clone(),
            group: row.group.clone(),
            components,
            composites,
            combined,
        }
    }
}

/// Resolves every term to `(score, weight)`, or `None` if any is missing.
fn weighted(
    terms: &[WeightedTerm],
    lookup: impl Fn(&str) -> Option<f64>,
) -> Option<Vec<(f64, f64)>> {
    terms
        .iter()
        .map(|t| lookup(&t.name).map(|s| (s, t.weight)))
        .collect()
}

fn combine(method: CompositeMethod, inputs: &[(f64, f64)]) -> f64 {
    let value = match method {
        CompositeMethod::Arithmetic => inputs.iter().map(|(s, w)| s * w).sum::<f64>(),
        CompositeMethod::Geometric => inputs
            .iter()
            .map(|(s, w)| (s + GEOMETRIC_EPSILON).powf(*w))
            .product::<f64>(),
    };
    value.clamp(0.0, 1.0)
}
