#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Clustering output types shared by the clustering engine, the metrics
//! aggregator, and the exporters.
//!
//! Each algorithm's assignments are kept separate: an area has one
//! [`ClusterAssignment`] per algorithm, never a merged "true" cluster.

use std::collections::BTreeMap;

use access_map_facility_models::FacilityKind;
use access_map_geography_models::GeoPoint;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Cluster label. Non-negative labels are clusters.
pub type ClusterLabel = i32;

/// Reserved label for points that belong to no dense cluster.
pub const NOISE_LABEL: ClusterLabel = -1;

/// Label used when an algorithm falls back to a single cluster.
pub const SINGLE_CLUSTER_LABEL: ClusterLabel = 0;

/// Group label of the cross-group run over every area.
pub const ALL_GROUPS: &str = "all";

/// Clustering algorithm identifier.
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
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ClusterAlgorithm {
    /// Partitional k-means within one group.
    #[serde(rename = "kmeans")]
    #[strum(serialize = "kmeans")]
    KMeans,
    /// Density-based (DBSCAN) within one group.
    Dbscan,
    /// Agglomerative with Ward (minimum-variance) linkage.
    Hierarchical,
    /// k-means over the union of all groups, K = number of groups.
    #[serde(rename = "cross_group_kmeans")]
    #[strum(serialize = "cross_group_kmeans")]
    CrossGroupKMeans,
}

impl ClusterAlgorithm {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::KMeans,
            Self::Dbscan,
            Self::Hierarchical,
            Self::CrossGroupKMeans,
        ]
    }

    /// Whether this algorithm can emit [`NOISE_LABEL`].
    #[must_use]
    pub const fn produces_noise(self) -> bool {
        matches!(self, Self::Dbscan)
    }
}

/// Clustering input for one area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureVector {
    /// Area identifier.
    pub area_id: String,
    /// Group the vector was built for.
    pub group: String,
    /// Feature values, one per configured field.
    pub values: Vec<f64>,
}

/// One (area, algorithm) cluster label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterAssignment {
    /// Area identifier.
    pub area_id: String,
    /// Group the clustering ran over ([`ALL_GROUPS`] for cross-group).
    pub group: String,
    /// Algorithm that produced the label.
    pub algorithm: ClusterAlgorithm,
    /// Cluster label, [`NOISE_LABEL`] for noise.
    pub label: ClusterLabel,
}

/// One merge in an agglomerative tree.
///
/// Leaves are numbered `0..n` in input order; the node created by merge
/// `i` has id `n + i`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MergeStep {
    /// Smaller node id.
    pub left: usize,
    /// Larger node id.
    pub right: usize,
    /// Linkage distance at which the two nodes merged.
    pub distance: f64,
    /// Number of leaves under the new node.
    pub size: usize,
}

/// Full merge tree of a hierarchical run, kept for diagram rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dendrogram {
    /// Group the tree was built for.
    pub group: String,
    /// Area identifiers of the leaves, by leaf id.
    pub leaves: Vec<String>,
    /// `leaves.len() - 1` merges in increasing distance order.
    pub merges: Vec<MergeStep>,
}

/// Latitude/longitude extent of a set of points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    /// Southern edge.
    pub min_lat: f64,
    /// Western edge.
    pub min_lon: f64,
    /// Northern edge.
    pub max_lat: f64,
    /// Eastern edge.
    pub max_lon: f64,
}

/// Min/mean/max of a distance column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceSummary {
    /// Smallest value.
    pub min: f64,
    /// Arithmetic mean.
    pub mean: f64,
    /// Median.
    pub median: f64,
    /// Largest value.
    pub max: f64,
}

/// A weighted mean of one composite, labelled with its weighting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedCompositeMean {
    /// Composite (or combined score) name.
    pub composite: String,
    /// Weighting label (e.g. `employment`, `revenue`).
    pub weighting: String,
    /// `None` when the total weight was zero or no member had a value.
    pub value: Option<f64>,
}

/// Aggregate statistics for one (group, algorithm, label).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterMetrics {
    /// Group the clustering ran over.
    pub group: String,
    /// Algorithm.
    pub algorithm: ClusterAlgorithm,
    /// Cluster label (noise included).
    pub label: ClusterLabel,
    /// Number of member areas.
    pub member_count: usize,
    /// Centroid of member centroids.
    pub centroid: Option<GeoPoint>,
    /// Extent of member centroids.
    pub bounding_box: Option<BoundingBox>,
    /// Largest great-circle distance between two members, in km.
    pub spread_km: f64,
    /// Nearest-facility distance statistics per kind, in km.
    pub nearest_distance_km: BTreeMap<FacilityKind, DistanceSummary>,
    /// Mean estimated travel time per kind, in minutes.
    pub mean_travel_minutes: BTreeMap<FacilityKind, f64>,
    /// Sum of each economic attribute over members.
    pub attribute_sums: BTreeMap<String, f64>,
    /// Simple mean of each composite over members that have it.
    pub composite_means: BTreeMap<String, Option<f64>>,
    /// Weighted composite means, one per (composite, weighting).
    pub weighted_composite_means: Vec<WeightedCompositeMean>,
}

/// Mean count of facilities within one radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RadiusMean {
    /// Radius threshold in km.
    pub radius_km: f64,
    /// Mean count across resolved areas.
    pub mean_count: f64,
}

/// Per-group overview independent of any clustering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    /// Group label.
    pub group: String,
    /// Areas in the group.
    pub area_count: usize,
    /// Areas with a valid centroid.
    pub resolved_count: usize,
    /// Centroid of resolved area centroids.
    pub centroid: Option<GeoPoint>,
    /// Extent of resolved area centroids.
    pub bounding_box: Option<BoundingBox>,
    /// Largest distance between two areas, in km.
    pub spread_km: f64,
    /// Half the spread.
    pub bounding_radius_km: f64,
    /// Nearest-facility distance statistics per kind.
    pub nearest_distance_km: BTreeMap<FacilityKind, DistanceSummary>,
    /// Nearest distance weighted by estimated travel time, per kind.
    pub travel_weighted_distance_km: BTreeMap<FacilityKind, Option<f64>>,
    /// Mean facility counts (all kinds) within each configured radius.
    pub radius_means: Vec<RadiusMean>,
}
