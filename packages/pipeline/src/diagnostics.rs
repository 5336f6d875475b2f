//! Data-quality diagnostics collected during a run.

use access_map_ingest_models::IngestIssue;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// What kind of recovered condition a diagnostic describes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DiagnosticKind {
    /// A record-level input problem.
    InputRecord,
    /// A repeated area identifier; the first occurrence was kept.
    DuplicateArea,
    /// An area without a usable centroid.
    UnresolvedArea,
    /// A facility without usable coordinates.
    UnresolvedFacility,
    /// No facility of a kind exists.
    EmptyFacilityKind,
    /// An attribute had zero range; its score is the neutral value.
    DegenerateNormalization,
    /// An area lacked a feature value and was not clustered.
    ExcludedFromClustering,
    /// A clustering run fell back to a single cluster.
    ClusterFallback,
}

/// One recovered data-quality condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    /// Condition kind.
    pub kind: DiagnosticKind,
    /// Group concerned, if any.
    pub group: Option<String>,
    /// Record concerned, if any.
    pub record_id: Option<String>,
    /// Human-readable detail.
    pub message: String,
}

impl Diagnostic {
    /// A diagnostic with no group or record.
    #[must_use]
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            group: None,
            record_id: None,
            message: message.into(),
        }
    }

    /// Attaches a group.
    #[must_use]
    pub fn in_group(mut self, group: &str) -> Self {
        self.group = Some(group.to_string());
        self
    }

    /// Attaches a record identifier.
    #[must_use]
    pub fn for_record(mut self, record_id: &str) -> Self {
        self.record_id = Some(record_id.to_string());
        self
    }

    /// Converts an ingestion issue from the named input.
    #[must_use]
    pub fn from_ingest(input: &str, issue: &IngestIssue) -> Self {
        let location = issue
            .line
            .map_or_else(String::new, |line| format!(" line {line}"));
        Self {
            kind: DiagnosticKind::InputRecord,
            group: None,
            record_id: issue.record_id.clone(),
            message: format!("{input}{location}: {}", issue.message),
        }
    }
}

/// A group whose processing failed; other groups still completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupError {
    /// Failed group.
    pub group: String,
    /// Error message.
    pub message: String,
}
