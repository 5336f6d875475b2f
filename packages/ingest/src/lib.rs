#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CSV record-set loading.
//!
//! The header row is checked against an [`AreaSchema`] or
//! [`FacilitySchema`] before any record is read; a mismatch is fatal and
//! names every missing and unexpected column. Problems inside individual
//! records (unparsable numbers, unknown facility kinds, blank ids) are
//! recovered and reported as [`IngestIssue`]s.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::Path;

use access_map_facility_models::{Facility, FacilityKind};
use access_map_geography_models::Area;
pub use access_map_ingest_models::{AreaSchema, FacilitySchema, IngestIssue, Loaded};

/// Errors that stop ingestion.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// I/O error opening or reading the input.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed CSV.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The header row does not match the schema.
    #[error(
        "Schema mismatch: missing columns [{}], unexpected columns [{}]",
        .missing.join(", "),
        .unexpected.join(", ")
    )]
    SchemaMismatch {
        /// Schema columns absent from the header.
        missing: Vec<String>,
        /// Header columns the schema does not name.
        unexpected: Vec<String>,
    },
}

/// Positions of named columns within a header row.
struct Columns {
    positions: BTreeMap<String, usize>,
}

impl Columns {
    fn check(
        headers: &csv::StringRecord,
        expected: &[&str],
        allow_extra: bool,
    ) -> Result<Self, IngestError> {
        let positions: BTreeMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_string(), i))
            .collect();

        let expected_set: BTreeSet<&str> = expected.iter().copied().collect();
        let missing: Vec<String> = expected
            .iter()
            .filter(|c| !positions.contains_key(**c))
            .map(ToString::to_string)
            .collect();
        let unexpected: Vec<String> = if allow_extra {
            Vec::new()
        } else {
            headers
                .iter()
                .map(str::trim)
                .filter(|h| !expected_set.contains(h))
                .map(ToString::to_string)
                .collect()
        };

        if !missing.is_empty() || !unexpected.is_empty() {
            return Err(IngestError::SchemaMismatch {
                missing,
                unexpected,
            });
        }
        Ok(Self { positions })
    }

    fn get<'r>(&self, record: &'r csv::StringRecord, column: &str) -> Option<&'r str> {
        let value = record.get(*self.positions.get(column)?)?.trim();
        (!value.is_empty()).then_some(value)
    }
}

/// Parses an optional numeric cell. A present but unparsable value becomes
/// `None` and is reported.
fn number(
    columns: &Columns,
    record: &csv::StringRecord,
    column: &str,
    id: &str,
    issues: &mut Vec<IngestIssue>,
) -> Option<f64> {
    let raw = columns.get(record, column)?;
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Some(value),
        _ => {
            issues.push(IngestIssue {
                line: line(record),
                record_id: Some(id.to_string()),
                message: format!("unparsable {column} value '{raw}'; treated as missing"),
            });
            None
        }
    }
}

fn line(record: &csv::StringRecord) -> Option<u64> {
    record.position().map(csv::Position::line)
}

fn reader<R: Read>(input: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input)
}

/// Reads area records.
///
/// # Errors
///
/// Returns [`IngestError::SchemaMismatch`] if the header does not match
/// `schema`, or a CSV/I/O error if the input cannot be read.
pub fn read_areas<R: Read>(input: R, schema: &AreaSchema) -> Result<Loaded<Area>, IngestError> {
    let mut reader = reader(input);
    let columns = Columns::check(reader.headers()?, &schema.columns(), schema.allow_extra_columns)?;

    let mut loaded = Loaded::default();
    for result in reader.records() {
        let record = result?;
        let Some(id) = columns.get(&record, &schema.id_column) else {
            loaded.issues.push(IngestIssue {
                line: line(&record),
                record_id: None,
                message: "blank area identifier; record skipped".to_string(),
            });
            continue;
        };

        let latitude = number(&columns, &record, &schema.latitude_column, id, &mut loaded.issues);
        let longitude = number(&columns, &record, &schema.longitude_column, id, &mut loaded.issues);
        let group = schema
            .group_column
            .as_deref()
            .and_then(|c| columns.get(&record, c))
            .map(ToString::to_string);
        let attributes = schema
            .attribute_columns
            .iter()
            .filter_map(|column| {
                number(&columns, &record, column, id, &mut loaded.issues)
                    .map(|value| (column.clone(), value))
            })
            .collect();

        loaded.records.push(Area {
            id: id.to_string(),
            latitude,
            longitude,
            group,
            attributes,
        });
    }

    log::info!(
        "Read {} areas ({} record issues)",
        loaded.records.len(),
        loaded.issues.len()
    );
    Ok(loaded)
}

/// Reads facility records. Rows whose kind is outside the airport /
/// heliport / helistop taxonomy are skipped and reported.
///
/// # Errors
///
/// Returns [`IngestError::SchemaMismatch`] if the header does not match
/// `schema`, or a CSV/I/O error if the input cannot be read.
pub fn read_facilities<R: Read>(
    input: R,
    schema: &FacilitySchema,
) -> Result<Loaded<Facility>, IngestError> {
    let mut reader = reader(input);
    let columns = Columns::check(reader.headers()?, &schema.columns(), schema.allow_extra_columns)?;

    let mut loaded = Loaded::default();
    for result in reader.records() {
        let record = result?;
        let Some(id) = columns.get(&record, &schema.id_column) else {
            loaded.issues.push(IngestIssue {
                line: line(&record),
                record_id: None,
                message: "blank facility identifier; record skipped".to_string(),
            });
            continue;
        };

        let raw_kind = columns.get(&record, &schema.kind_column).unwrap_or("");
        let Some(kind) = FacilityKind::parse_lenient(raw_kind) else {
            log::debug!("Skipping facility {id} of kind '{raw_kind}'");
            loaded.issues.push(IngestIssue {
                line: line(&record),
                record_id: Some(id.to_string()),
                message: format!("unsupported facility kind '{raw_kind}'; record skipped"),
            });
            continue;
        };

        let latitude = number(&columns, &record, &schema.latitude_column, id, &mut loaded.issues);
        let longitude = number(&columns, &record, &schema.longitude_column, id, &mut loaded.issues);

        loaded.records.push(Facility {
            id: id.to_string(),
            latitude,
            longitude,
            kind,
            ownership_code: columns
                .get(&record, &schema.ownership_column)
                .unwrap_or("")
                .to_uppercase(),
            name: schema
                .name_column
                .as_deref()
                .and_then(|c| columns.get(&record, c))
                .map(ToString::to_string),
        });
    }

    log::info!(
        "Read {} facilities ({} record issues)",
        loaded.records.len(),
        loaded.issues.len()
    );
    Ok(loaded)
}

/// [`read_areas`] from a file.
///
/// # Errors
///
/// See [`read_areas`]; also fails if the file cannot be opened.
pub fn read_areas_path(path: &Path, schema: &AreaSchema) -> Result<Loaded<Area>, IngestError> {
    read_areas(std::fs::File::open(path)?, schema)
}

/// [`read_facilities`] from a file.
///
/// # Errors
///
/// See [`read_facilities`]; also fails if the file cannot be opened.
pub fn read_facilities_path(
    path: &Path,
    schema: &FacilitySchema,
) -> Result<Loaded<Facility>, IngestError> {
    read_facilities(std::fs::File::open(path)?, schema)
}
