#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Aviation facility types.
//!
//! Facilities come from an FAA-style registry: each has a kind (airport,
//! heliport, helistop), a two-letter ownership/use code, and an optional
//! name. The [`FacilityCategory`] taxonomy is what the rule-table
//! classifier in `access_map_facility` maps facilities onto.

use access_map_geography_models::GeoPoint;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Ownership codes that denote a military operator.
pub const MILITARY_CODES: &[&str] = &["MR", "MA", "MN", "CG"];

/// The physical kind of an aviation facility.
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
pub enum FacilityKind {
    /// Fixed-wing airport.
    Airport,
    /// Heliport with supporting facilities.
    Heliport,
    /// Bare helicopter landing spot (rooftops, hospital pads).
    Helistop,
}

impl FacilityKind {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Airport, Self::Heliport, Self::Helistop]
    }

    /// Maps a free-form registry "facility type" string onto a kind.
    ///
    /// Registry exports use values like `"AIRPORT"`, `"HELIPORT"`, or
    /// `"HELISTOP"`, sometimes with extra words around them. Returns `None`
    /// for kinds outside this taxonomy (seaplane bases, gliderports, ...).
    #[must_use]
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        let upper = raw.trim().to_uppercase();
        if upper.contains("HELISTOP") {
            Some(Self::Helistop)
        } else if upper.contains("HELIPORT") {
            Some(Self::Heliport)
        } else if upper.contains("AIRPORT") {
            Some(Self::Airport)
        } else {
            None
        }
    }
}

/// Classification category assigned by the facility rule table.
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
pub enum FacilityCategory {
    /// Hospital or medical landing site.
    Hospital,
    /// Operated by a branch of the armed forces.
    Military,
    /// Open to public use.
    Public,
    /// Private use.
    Private,
    /// No rule matched.
    Other,
}

/// Returns a human-readable label for an ownership/use code.
#[must_use]
pub fn ownership_label(code: &str) -> &'static str {
    match code.trim().to_uppercase().as_str() {
        "PU" => "Public",
        "PR" => "Private",
        "MR" => "Military",
        "MA" => "Air Force",
        "MN" => "Navy",
        "CG" => "Coast Guard",
        _ => "Unknown",
    }
}

/// One aviation facility as supplied by ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Facility {
    /// Registry location identifier (e.g. `"LAX"`).
    pub id: String,
    /// Raw latitude; may be missing or out of range.
    pub latitude: Option<f64>,
    /// Raw longitude; may be missing or out of range.
    pub longitude: Option<f64>,
    /// Facility kind.
    pub kind: FacilityKind,
    /// Two-letter ownership/use code (`PU`, `PR`, `MR`, ...).
    pub ownership_code: String,
    /// Facility name, if known.
    pub name: Option<String>,
}

impl Facility {
    /// Returns the validated position, or `None` if the coordinates are unusable.
    #[must_use]
    pub fn position(&self) -> Option<GeoPoint> {
        GeoPoint::from_optional(self.latitude, self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr as _;

    use super::*;

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!(FacilityKind::from_str("airport"), Ok(FacilityKind::Airport));
        assert_eq!(FacilityKind::from_str("HELIPORT"), Ok(FacilityKind::Heliport));
        assert_eq!(FacilityKind::from_str("Helistop"), Ok(FacilityKind::Helistop));
        assert!(FacilityKind::from_str("balloonport").is_err());
    }

    #[test]
    fn lenient_parse_prefers_most_specific_kind() {
        assert_eq!(
            FacilityKind::parse_lenient(" HELISTOP "),
            Some(FacilityKind::Helistop)
        );
        assert_eq!(
            FacilityKind::parse_lenient("Heliport"),
            Some(FacilityKind::Heliport)
        );
        assert_eq!(
            FacilityKind::parse_lenient("AIRPORT"),
            Some(FacilityKind::Airport)
        );
        assert_eq!(FacilityKind::parse_lenient("SEAPLANE BASE"), None);
    }

    #[test]
    fn kind_display_matches_serde_name() {
        for kind in FacilityKind::all() {
            assert_eq!(kind.to_string(), kind.as_ref());
        }
        assert_eq!(FacilityKind::Airport.to_string(), "airport");
    }

    #[test]
    fn ownership_labels() {
        assert_eq!(ownership_label("pu"), "Public");
        assert_eq!(ownership_label("MA"), "Air Force");
        assert_eq!(ownership_label("ZZ"), "Unknown");
        for code in MILITARY_CODES {
            assert_ne!(ownership_label(code), "Unknown");
        }
    }
}
