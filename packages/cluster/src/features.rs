//! Feature vector construction.

use std::collections::BTreeMap;

use access_map_cluster_models::FeatureVector;
use access_map_distance::{distance_attribute, travel_time_attribute};
use access_map_facility_models::FacilityKind;
use access_map_geography_models::GeoPoint;
use serde::{Deserialize, Serialize};

/// One column of the clustering feature matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", rename_all = "snake_case")]
pub enum FeatureField {
    /// Centroid latitude.
    Latitude,
    /// Centroid longitude.
    Longitude,
    /// Distance to the nearest facility of a kind, in km.
    NearestDistance {
        /// Facility kind.
        kind: FacilityKind,
    },
    /// Estimated travel time to the nearest facility of a kind.
    TravelTime {
        /// Facility kind.
        kind: FacilityKind,
    },
    /// A raw economic attribute.
    Attribute {
        /// Attribute name.
        name: String,
    },
    /// A composite or combined score (unscaled).
    Score {
        /// Score name.
        name: String,
    },
}

impl FeatureField {
    /// Column label used in logs and diagnostics.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Latitude => "latitude".to_string(),
            Self::Longitude => "longitude".to_string(),
            Self::NearestDistance { kind } => distance_attribute(*kind),
            Self::TravelTime { kind } => travel_time_attribute(*kind),
            Self::Attribute { name } | Self::Score { name } => name.clone(),
        }
    }

    fn resolve(&self, input: &FeatureInput) -> Option<f64> {
        match self {
            Self::Latitude => input.position.map(|p| p.lat),
            Self::Longitude => input.position.map(|p| p.lon),
            Self::NearestDistance { .. }
            | Self::TravelTime { .. }
            | Self::Attribute { .. }
            | Self::Score { .. } => input.values.get(&self.label()).copied(),
        }
        .filter(|v| v.is_finite())
    }
}

/// Which fields make up a feature vector and whether columns are
/// z-score standardized first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Feature columns, in order.
    pub fields: Vec<FeatureField>,
    /// Standardize each column within the clustered set.
    pub standardize: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            fields: vec![
                FeatureField::Latitude,
                FeatureField::Longitude,
                FeatureField::NearestDistance {
                    kind: FacilityKind::Airport,
                },
            ],
            standardize: true,
        }
    }
}

/// Everything a feature field can read for one area.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureInput {
    /// Area identifier.
    pub area_id: String,
    /// Group key.
    pub group: String,
    /// Centroid, if resolved.
    pub position: Option<GeoPoint>,
    /// Raw attributes, derived accessibility attributes, and scores.
    pub values: BTreeMap<String, f64>,
}

/// Feature vectors for one clustering run, plus the areas left out.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    /// One vector per included area, in input order.
    pub vectors: Vec<FeatureVector>,
    /// Areas missing at least one configured field.
    pub excluded: Vec<String>,
}

impl FeatureMatrix {
    /// Raw values of every vector.
    #[must_use]
    pub fn rows(&self) -> Vec<Vec<f64>> {
        self.vectors.iter().map(|v| v.values.clone()).collect()
    }
}

impl FeatureConfig {
    /// Builds the feature matrix for `inputs`, labelling every vector with
    /// `group`.
    #[must_use]
    pub fn build(&self, group: &str, inputs: &[FeatureInput]) -> FeatureMatrix {
        let mut vectors = Vec::with_capacity(inputs.len());
        let mut excluded = Vec::new();

        for input in inputs {
            let values: Option<Vec<f64>> =
                self.fields.iter().map(|field| field.resolve(input)).collect();
            match values {
                Some(values) => vectors.push(FeatureVector {
                    area_id: input.area_id.clone(),
                    group: group.to_string(),
                    values,
                }),
                None => excluded.push(input.area_id.clone()),
            }
        }

        if !excluded.is_empty() {
            log::warn!(
                "{} areas in {group} lack a feature value and were not clustered",
                excluded.len()
            );
        }

        if self.standardize {
            for column in 0..self.fields.len() {
                let raw: Vec<f64> = vectors.iter().map(|v| v.values[column]).collect();
                for (vector, z) in vectors.iter_mut().zip(access_map_stats::standardize(&raw)) {
                    vector.values[column] = z;
                }
            }
        }

        FeatureMatrix { vectors, excluded }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(id: &str, lat: f64, lon: f64, km: Option<f64>) -> FeatureInput {
        let mut values = BTreeMap::new();
        if let Some(km) = km {
            values.insert("nearest_airport_km".to_string(), km);
        }
        FeatureInput {
            area_id: id.to_string(),
            group: "g".to_string(),
            position: Some(GeoPoint { lat, lon }),
            values,
        }
    }

    #[test]
    fn missing_field_excludes_area() {
        let config = FeatureConfig::default();
        let matrix = config.build(
            "g",
            &[input("a", 1.0, 2.0, Some(3.0)), input("b", 1.0, 2.0, None)],
        );
        assert_eq!(matrix.vectors.len(), 1);
        assert_eq!(matrix.excluded, vec!["b".to_string()]);
    }

    #[test]
    fn unresolved_position_excludes_area() {
        let config = FeatureConfig::default();
        let mut unresolved = input("u", 0.0, 0.0, Some(1.0));
        unresolved.position = None;
        let matrix = config.build("g", &[unresolved]);
        assert!(matrix.vectors.is_empty());
        assert_eq!(matrix.excluded, vec!["u".to_string()]);
    }

    #[test]
    fn standardized_columns_have_zero_mean() {
        let config = FeatureConfig::default();
        let matrix = config.build(
            "g",
            &[
                input("a", 10.0, 20.0, Some(1.0)),
                input("b", 11.0, 22.0, Some(5.0)),
                input("c", 12.0, 27.0, Some(9.0)),
            ],
        );
        for column in 0..3 {
            let sum: f64 = matrix.vectors.iter().map(|v| v.values[column]).sum();
            assert!(sum.abs() < 1e-9, "column {column} sums to {sum}");
        }
    }

    #[test]
    fn raw_values_kept_without_standardization() {
        let config = FeatureConfig {
            standardize: false,
            ..FeatureConfig::default()
        };
        let matrix = config.build("g", &[input("a", 10.0, 20.0, Some(4.0))]);
        assert_eq!(matrix.vectors[0].values, vec![10.0, 20.0, 4.0]);
    }

    #[test]
    fn labels_match_derived_attribute_names() {
        assert_eq!(
            FeatureField::TravelTime {
                kind: FacilityKind::Heliport
            }
            .label(),
            "nearest_heliport_minutes"
        );
    }
}
