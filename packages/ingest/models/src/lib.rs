#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Input column schemas and ingestion result types.

use access_map_geography_models::attributes;
use serde::{Deserialize, Serialize};

/// Expected columns of the area record set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaSchema {
    /// Unique area identifier column.
    pub id_column: String,
    /// Centroid latitude column.
    pub latitude_column: String,
    /// Centroid longitude column.
    pub longitude_column: String,
    /// Group label column, if the input has one.
    pub group_column: Option<String>,
    /// Numeric economic attribute columns.
    pub attribute_columns: Vec<String>,
    /// Accept columns not named above instead of failing.
    pub allow_extra_columns: bool,
}

impl Default for AreaSchema {
    fn default() -> Self {
        Self {
            id_column: "area_id".to_string(),
            latitude_column: "latitude".to_string(),
            longitude_column: "longitude".to_string(),
            group_column: Some("group".to_string()),
            attribute_columns: [
                attributes::TOTAL_EMPLOYMENT,
                attributes::ESTIMATED_REVENUE_M,
                attributes::INDUSTRY_SHARE_PCT,
                attributes::WEALTH_RATIO,
                attributes::HOUSEHOLDS_200K,
                attributes::HOUSEHOLDS_200K_PER_KM2,
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            allow_extra_columns: false,
        }
    }
}

impl AreaSchema {
    /// Every column the schema names, in declaration order.
    #[must_use]
    pub fn columns(&self) -> Vec<&str> {
        let mut columns = vec![
            self.id_column.as_str(),
            self.latitude_column.as_str(),
            self.longitude_column.as_str(),
        ];
        columns.extend(self.group_column.as_deref());
        columns.extend(self.attribute_columns.iter().map(String::as_str));
        columns
    }
}

/// Expected columns of the facility record set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FacilitySchema {
    /// Facility identifier column.
    pub id_column: String,
    /// Latitude column.
    pub latitude_column: String,
    /// Longitude column.
    pub longitude_column: String,
    /// Facility kind column (airport, heliport, helistop).
    pub kind_column: String,
    /// Ownership/use code column.
    pub ownership_column: String,
    /// Optional facility name column.
    pub name_column: Option<String>,
    /// Accept columns not named above instead of failing.
    pub allow_extra_columns: bool,
}

impl Default for FacilitySchema {
    fn default() -> Self {
        Self {
            id_column: "facility_id".to_string(),
            latitude_column: "latitude".to_string(),
            longitude_column: "longitude".to_string(),
            kind_column: "kind".to_string(),
            ownership_column: "ownership_code".to_string(),
            name_column: Some("name".to_string()),
            allow_extra_columns: false,
        }
    }
}

impl FacilitySchema {
    /// Every column the schema names, in declaration order.
    #[must_use]
    pub fn columns(&self) -> Vec<&str> {
        let mut columns = vec![
            self.id_column.as_str(),
            self.latitude_column.as_str(),
            self.longitude_column.as_str(),
            self.kind_column.as_str(),
            self.ownership_column.as_str(),
        ];
        columns.extend(self.name_column.as_deref());
        columns
    }
}

/// A record-level data-quality problem found while reading input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestIssue {
    /// 1-based line number in the source file, if known.
    pub line: Option<u64>,
    /// Record identifier, if it could be read.
    pub record_id: Option<String>,
    /// What was wrong and what was done about it.
    pub message: String,
}

/// Records read from one input plus the issues met along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<T> {
    /// Records kept, in input order.
    pub records: Vec<T>,
    /// Record-level issues.
    pub issues: Vec<IngestIssue>,
}

impl<T> Default for Loaded<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            issues: Vec::new(),
        }
    }
}
