#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Area record and coordinate types.
//!
//! An [`Area`] is one geographic unit (a ZIP-like region) with a centroid,
//! an optional group label (e.g. a metro key like `"los_angeles"`), and a set
//! of named numeric economic attributes. Areas are read-only inputs: every
//! derived value lives in separate result records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Group key used for areas that carry no group label.
pub const UNGROUPED: &str = "ungrouped";

/// Canonical economic attribute column names.
pub mod attributes {
    /// Total employees across establishments in the area.
    pub const TOTAL_EMPLOYMENT: &str = "total_employment";
    /// Estimated total business revenue, in millions of dollars.
    pub const ESTIMATED_REVENUE_M: &str = "estimated_revenue_m";
    /// Share of employment in high-revenue ("power") industries, in percent.
    pub const INDUSTRY_SHARE_PCT: &str = "industry_share_pct";
    /// Ratio of high-income returns to all returns.
    pub const WEALTH_RATIO: &str = "wealth_ratio";
    /// Households with income of $200k or more.
    pub const HOUSEHOLDS_200K: &str = "households_200k";
    /// Households with income of $200k or more per square kilometer.
    pub const HOUSEHOLDS_200K_PER_KM2: &str = "households_200k_per_km2";
}

/// A validated latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoPoint {
    /// Latitude in degrees, within `[-90, 90]`.
    pub lat: f64,
    /// Longitude in degrees, within `[-180, 180]`.
    pub lon: f64,
}

impl GeoPoint {
    /// Creates a point after checking both coordinates are finite and in range.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidCoordinateError`] if either coordinate is NaN,
    /// infinite, or outside its valid range.
    pub fn new(lat: f64, lon: f64) -> Result<Self, InvalidCoordinateError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(InvalidCoordinateError { lat, lon });
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(InvalidCoordinateError { lat, lon });
        }
        Ok(Self { lat, lon })
    }

    /// Builds a point from optional raw values, returning `None` when either
    /// value is missing or invalid.
    #[must_use]
    pub fn from_optional(lat: Option<f64>, lon: Option<f64>) -> Option<Self> {
        Self::new(lat?, lon?).ok()
    }
}

/// Error returned when a coordinate pair is not a valid position on Earth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvalidCoordinateError {
    /// The rejected latitude.
    pub lat: f64,
    /// The rejected longitude.
    pub lon: f64,
}

impl std::fmt::Display for InvalidCoordinateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid coordinate ({}, {}): expected lat in [-90, 90] and lon in [-180, 180]",
            self.lat, self.lon
        )
    }
}

impl std::error::Error for InvalidCoordinateError {}

/// One geographic unit as supplied by ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Area {
    /// Unique identifier within a batch (e.g. a five-digit ZIP code).
    pub id: String,
    /// Raw centroid latitude; may be missing or out of range.
    pub latitude: Option<f64>,
    /// Raw centroid longitude; may be missing or out of range.
    pub longitude: Option<f64>,
    /// Optional group label (metro area, city key, ...).
    pub group: Option<String>,
    /// Named economic attributes. Missing cells are simply absent.
    pub attributes: BTreeMap<String, f64>,
}

impl Area {
    /// Returns the validated centroid, or `None` if the area is unresolved.
    #[must_use]
    pub fn position(&self) -> Option<GeoPoint> {
        GeoPoint::from_optional(self.latitude, self.longitude)
    }

    /// Returns the value of a named attribute if present and finite.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<f64> {
        self.attributes.get(name).copied().filter(|v| v.is_finite())
    }

    /// Returns the group label, or [`UNGROUPED`] when none is set.
    #[must_use]
    pub fn group_key(&self) -> &str {
        self.group
            .as_deref()
            .filter(|g| !g.is_empty())
            .unwrap_or(UNGROUPED)
    }
}
