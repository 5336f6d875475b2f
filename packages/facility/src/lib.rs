#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Facility classification.
//!
//! Maps a facility's name and ownership/use code onto a
//! [`FacilityCategory`] using an ordered [`RuleTable`]. Rules are evaluated
//! in table order and the first match wins, so a hospital helipad run by a
//! public operator is classified once, as a hospital. New categories are
//! added by inserting rows into the table, not by branching code.
//!
//! The default table is embedded at compile time from
//! `rules/default.toml`.

use access_map_facility_models::{Facility, FacilityCategory};
use serde::{Deserialize, Serialize};

/// Default rule table, embedded at compile time.
const DEFAULT_RULES_TOML: &str = include_str!("../rules/default.toml");

/// Errors that can occur while loading a rule table.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// The TOML document could not be parsed.
    #[error("Rule table parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// A rule has nothing to match against.
    #[error("Rule {index} ({category}) has no keywords or codes")]
    EmptyRule {
        /// Zero-based position of the rule in the table.
        index: usize,
        /// Category the empty rule would assign.
        category: FacilityCategory,
    },
}

/// How a rule decides whether it applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleMatcher {
    /// Case-insensitive substring match against the facility name.
    NameKeyword {
        /// Keywords; any one matching is enough.
        keywords: Vec<String>,
    },
    /// Exact (case-insensitive, trimmed) match against the ownership code.
    OwnershipCode {
        /// Accepted codes.
        codes: Vec<String>,
    },
}

impl RuleMatcher {
    fn matches(&self, upper_name: Option<&str>, upper_code: &str) -> bool {
        match self {
            Self::NameKeyword { keywords } => upper_name.is_some_and(|name| {
                keywords
                    .iter()
                    .any(|k| !k.trim().is_empty() && name.contains(&k.trim().to_uppercase()))
            }),
            Self::OwnershipCode { codes } => codes
                .iter()
                .any(|c| c.trim().eq_ignore_ascii_case(upper_code)),
        }
    }

    const fn is_empty(&self) -> bool {
        match self {
            Self::NameKeyword { keywords } => keywords.is_empty(),
            Self::OwnershipCode { codes } => codes.is_empty(),
        }
    }
}

/// One row of the rule table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRule {
    /// Category assigned when the rule matches.
    pub category: FacilityCategory,
    /// Match condition.
    pub matcher: RuleMatcher,
}

/// An ordered list of classification rules with a fallback category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTable {
    /// Category used when no rule matches.
    #[serde(default = "default_fallback")]
    pub fallback: FacilityCategory,
    /// Rules in priority order.
    pub rules: Vec<ClassificationRule>,
}

const fn default_fallback() -> FacilityCategory {
    FacilityCategory::Other
}

impl RuleTable {
    /// Parses and validates a rule table from TOML.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError`] if the document is malformed or any rule is
    /// empty.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, RuleError> {
        let table: Self = toml::de::from_str(toml_str)?;
        table.validate()?;
        log::debug!("Loaded facility rule table with {} rules", table.rules.len());
        Ok(table)
    }

    /// Checks that every rule has at least one keyword or code.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::EmptyRule`] for the first empty rule.
    pub fn validate(&self) -> Result<(), RuleError> {
        for (index, rule) in self.rules.iter().enumerate() {
            if rule.matcher.is_empty() {
                return Err(RuleError::EmptyRule {
                    index,
                    category: rule.category,
                });
            }
        }
        Ok(())
    }

    /// Returns the embedded default rule table.
    ///
    /// # Panics
    ///
    /// Panics if the embedded TOML is malformed. The file is a compile-time
    /// constant, so a failure is a development error caught by the tests.
    #[must_use]
    pub fn default_rules() -> Self {
        Self::from_toml_str(DEFAULT_RULES_TOML)
            .unwrap_or_else(|e| panic!("Failed to parse default facility rules: {e}"))
    }

    /// Classifies a facility by name and ownership code.
    ///
    /// Pure function of its inputs: evaluates rules in order and returns the
    /// first matching category, or the table's fallback.
    #[must_use]
    pub fn classify(&self, name: Option<&str>, ownership_code: &str) -> FacilityCategory {
        let upper_name = name.map(str::to_uppercase);
        let upper_code = ownership_code.trim().to_uppercase();

        self.rules
            .iter()
            .find(|rule| rule.matcher.matches(upper_name.as_deref(), &upper_code))
            .map_or(self.fallback, |rule| rule.category)
    }

    /// Classifies a [`Facility`] record.
    #[must_use]
    pub fn classify_facility(&self, facility: &Facility) -> FacilityCategory {
        self.classify(facility.name.as_deref(), &facility.ownership_code)
    }
}
