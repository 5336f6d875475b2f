//! Top-fraction selection over composite scores.

use serde::{Deserialize, Serialize};

use crate::{CompositeScore, SelectionSpec};

/// Areas at or above the `(1 − fraction)` quantile of one score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    /// Ranked score name.
    pub score: String,
    /// Requested fraction.
    pub top_fraction: f64,
    /// Quantile threshold, or `None` when no area has the score.
    pub threshold: Option<f64>,
    /// Selected area identifiers, in input order.
    pub members: Vec<String>,
}

impl Selection {
    /// Ranks `scores` by `spec.score`.
    #[must_use]
    pub fn evaluate(scores: &[CompositeScore], spec: &SelectionSpec) -> Self {
        let present: Vec<(&str, f64)> = scores
            .iter()
            .filter_map(|s| s.value(&spec.score).map(|v| (s.area_id.as_str(), v)))
            .collect();
        let values: Vec<f64> = present.iter().map(|(_, v)| *v).collect();
        let threshold = access_map_stats::quantile(&values, 1.0 - spec.top_fraction).ok();

        let members = threshold.map_or_else(Vec::new, |t| {
            present
                .iter()
                .filter(|(_, v)| *v >= t)
                .map(|(id, _)| (*id).to_string())
                .collect()
        });

        log::debug!(
            "Selected {} of {} areas by {} (top {:.0}%)",
            members.len(),
            present.len(),
            spec.score,
            spec.top_fraction * 100.0
        );

        Self {
            score: spec.score.clone(),
            top_fraction: spec.top_fraction,
            threshold,
            members,
        }
    }

    /// Whether an area was selected.
    #[must_use]
    pub fn contains(&self, area_id: &str) -> bool {
        self.members.iter().any(|m| m == area_id)
    }
}

/// Every configured selection plus the areas selected by all of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionReport {
    /// One entry per configured selection.
    pub selections: Vec<Selection>,
    /// Areas present in every selection, in input order. Empty when no
    /// selection is configured.
    pub intersection: Vec<String>,
}

impl SelectionReport {
    /// Evaluates every spec against `scores`.
    #[must_use]
    pub fn evaluate(scores: &[CompositeScore], specs: &[SelectionSpec]) -> Self {
        let selections: Vec<Selection> = specs
            .iter()
            .map(|spec| Selection::evaluate(scores, spec))
            .collect();

        let intersection = match selections.split_first() {
            None => Vec::new(),
            Some((first, rest)) => first
                .members
                .iter()
                .filter(|id| rest.iter().all(|s| s.contains(id)))
                .cloned()
                .collect(),
        };

        Self {
            selections,
            intersection,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::CompositeValue;

    fn score(id: &str, a: Option<f64>, b: Option<f64>) -> CompositeScore {
        let mut composites = BTreeMap::new();
        composites.insert("a".to_string(), a.map(|unit| CompositeValue { unit, scaled: unit }));
        composites.insert("b".to_string(), b.map(|unit| CompositeValue { unit, scaled: unit }));
        CompositeScore {
            area_id: id.to_string(),
            group: None,
            components: BTreeMap::new(),
            composites,
            combined: BTreeMap::new(),
        }
    }

    fn spec(score: &str, top_fraction: f64) -> SelectionSpec {
        SelectionSpec {
            score: score.to_string(),
            top_fraction,
        }
    }

    #[test]
    fn top_decile_of_ten_areas_keeps_the_highest() {
        let scores: Vec<CompositeScore> = (1..=10)
            .map(|i| score(&format!("z{i}"), Some(f64::from(i) / 10.0), None))
            .collect();
        let selection = Selection::evaluate(&scores, &spec("a", 0.1));
        let threshold = selection.threshold.unwrap();
        assert!((threshold - 0.91).abs() < 1e-9, "{threshold}");
        assert_eq!(selection.members, vec!["z10".to_string()]);
    }

    #[test]
    fn missing_values_are_not_ranked() {
        let scores = vec![score("x", None, None), score("y", Some(0.3), None)];
        let selection = Selection::evaluate(&scores, &spec("a", 0.5));
        assert_eq!(selection.members, vec!["y".to_string()]);

        let empty = Selection::evaluate(&scores, &spec("b", 0.5));
        assert_eq!(empty.threshold, None);
        assert!(empty.members.is_empty());
    }

    #[test]
    fn intersection_keeps_areas_in_every_selection() {
        let scores = vec![
            score("p", Some(0.9), Some(0.9)),
            score("q", Some(0.8), Some(0.1)),
            score("r", Some(0.1), Some(0.8)),
            score("s", Some(0.0), Some(0.0)),
        ];
        let report = SelectionReport::evaluate(&scores, &[spec("a", 0.5), spec("b", 0.5)]);
        assert_eq!(report.selections[0].members, vec!["p", "q"]);
        assert_eq!(report.selections[1].members, vec!["p", "r"]);
        assert_eq!(report.intersection, vec!["p".to_string()]);
    }
}
