//! Output tables.
//!
//! Every table is a flat CSV whose columns are derived from the analysis
//! configuration, so renaming a composite or adding a radius changes the
//! header without code changes. Missing values are written as empty cells.
//! Dendrograms and diagnostics are nested, so they go out as JSON.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use access_map_cli_utils::{IndicatifProgress, MultiProgress};
use access_map_cluster_models::{
    BoundingBox, ClusterAssignment, ClusterMetrics, Dendrogram, GroupSummary,
};
use access_map_distance::{AccessibilityRecord, Resolution};
use access_map_facility_models::FacilityKind;
use access_map_geography_models::GeoPoint;
use access_map_pipeline::{
    AnalysisConfig, AnalysisOutput, Diagnostic, GroupError, ProgressCallback,
};
use access_map_scoring::{ScoreTable, ScoringConfig};
use serde::Serialize;

type ExportResult<T> = Result<T, Box<dyn std::error::Error>>;

const OUTPUT_FILES: u64 = 8;

fn cell(value: Option<f64>) -> String {
    value.map_or_else(String::new, |v| v.to_string())
}

/// `10.0` → `"10"`, `12.5` → `"12.5"`.
fn radius_label(radius_km: f64) -> String {
    if radius_km.fract() == 0.0 {
        format!("{radius_km:.0}")
    } else {
        radius_km.to_string()
    }
}

/// Writes the per-area nearest-facility and radius-count table.
pub fn write_accessibility<W: Write>(
    writer: W,
    radii_km: &[f64],
    records: &[AccessibilityRecord],
) -> ExportResult<()> {
    let mut csv = csv::Writer::from_writer(writer);

    let mut header = vec![
        "area_id".to_string(),
        "group".to_string(),
        "resolved".to_string(),
    ];
    for kind in FacilityKind::all() {
        header.push(format!("nearest_{kind}_id"));
        header.push(format!("nearest_{kind}_category"));
        header.push(format!("nearest_{kind}_km"));
        header.push(format!("nearest_{kind}_minutes_estimate"));
    }
    for &radius in radii_km {
        let radius = radius_label(radius);
        for kind in FacilityKind::all() {
            header.push(format!("{kind}_within_{radius}km"));
        }
        header.push(format!("total_within_{radius}km"));
    }
    csv.write_record(&header)?;

    for record in records {
        let mut row = vec![
            record.area_id.clone(),
            record.group.clone().unwrap_or_default(),
            (record.resolution == Resolution::Resolved).to_string(),
        ];
        for &kind in FacilityKind::all() {
            match record.nearest(kind) {
                Some(nearest) => {
                    row.push(nearest.facility_id.clone());
                    row.push(nearest.category.to_string());
                    row.push(nearest.distance_km.to_string());
                    row.push(nearest.estimated_travel_minutes.to_string());
                }
                None => row.extend(std::iter::repeat_n(String::new(), 4)),
            }
        }
        for index in 0..radii_km.len() {
            match record.radius_counts.get(index) {
                Some(count) => {
                    for &kind in FacilityKind::all() {
                        row.push(count.count(kind).to_string());
                    }
                    row.push(count.total.to_string());
                }
                None => row.extend(std::iter::repeat_n(
                    String::new(),
                    FacilityKind::all().len() + 1,
                )),
            }
        }
        csv.write_record(&row)?;
    }

    csv.flush()?;
    Ok(())
}

/// Writes components, composites (presentation scale), combined scores,
/// and selection membership flags per area.
pub fn write_scores<W: Write>(
    writer: W,
    config: &ScoringConfig,
    table: &ScoreTable,
) -> ExportResult<()> {
    let mut csv = csv::Writer::from_writer(writer);

    let mut header = vec!["area_id".to_string(), "group".to_string()];
    header.extend(config.components.iter().map(|c| c.name.clone()));
    header.extend(config.composites.iter().map(|c| c.name.clone()));
    header.extend(config.combined.iter().map(|c| c.name.clone()));
    header.extend(
        table
            .selections
            .selections
            .iter()
            .map(|s| format!("top_{}", s.score)),
    );
    if !table.selections.selections.is_empty() {
        header.push("in_all_selections".to_string());
    }
    csv.write_record(&header)?;

    for score in &table.scores {
        let mut row = vec![score.area_id.clone(), score.group.clone().unwrap_or_default()];
        row.extend(
            config
                .components
                .iter()
                .map(|c| cell(score.components.get(&c.name).copied().flatten())),
        );
        row.extend(
            config
                .composites
                .iter()
                .map(|c| cell(score.display_value(&c.name))),
        );
        row.extend(
            config
                .combined
                .iter()
                .map(|c| cell(score.combined.get(&c.name).copied().flatten())),
        );
        row.extend(
            table
                .selections
                .selections
                .iter()
                .map(|s| s.contains(&score.area_id).to_string()),
        );
        if !table.selections.selections.is_empty() {
            row.push(
                table
                    .selections
                    .intersection
                    .contains(&score.area_id)
                    .to_string(),
            );
        }
        csv.write_record(&row)?;
    }

    csv.flush()?;
    Ok(())
}

/// Writes one row per selected area per selection, with the threshold used.
pub fn write_selections<W: Write>(writer: W, table: &ScoreTable) -> ExportResult<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(["score", "top_fraction", "threshold", "area_id"])?;

    for selection in &table.selections.selections {
        for member in &selection.members {
            csv.write_record([
                selection.score.clone(),
                selection.top_fraction.to_string(),
                cell(selection.threshold),
                member.clone(),
            ])?;
        }
    }

    csv.flush()?;
    Ok(())
}

/// Writes one row per area per algorithm.
pub fn write_assignments<W: Write>(
    writer: W,
    assignments: &[ClusterAssignment],
) -> ExportResult<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(["area_id", "group", "algorithm", "label"])?;
    for assignment in assignments {
        csv.write_record([
            assignment.area_id.clone(),
            assignment.group.clone(),
            assignment.algorithm.to_string(),
            assignment.label.to_string(),
        ])?;
    }
    csv.flush()?;
    Ok(())
}

fn extent_cells(centroid: Option<GeoPoint>, bounding_box: Option<BoundingBox>) -> Vec<String> {
    vec![
        cell(centroid.map(|c| c.lat)),
        cell(centroid.map(|c| c.lon)),
        cell(bounding_box.map(|b| b.min_lat)),
        cell(bounding_box.map(|b| b.min_lon)),
        cell(bounding_box.map(|b| b.max_lat)),
        cell(bounding_box.map(|b| b.max_lon)),
    ]
}

const EXTENT_COLUMNS: &[&str] = &[
    "centroid_lat",
    "centroid_lon",
    "min_lat",
    "min_lon",
    "max_lat",
    "max_lon",
    "spread_km",
];

/// Writes the per-cluster aggregate table.
pub fn write_cluster_metrics<W: Write>(
    writer: W,
    config: &AnalysisConfig,
    rows: &[ClusterMetrics],
) -> ExportResult<()> {
    let mut csv = csv::Writer::from_writer(writer);
    let metrics = &config.metrics;

    let mut header: Vec<String> = ["group", "algorithm", "label", "member_count"]
        .iter()
        .chain(EXTENT_COLUMNS)
        .map(ToString::to_string)
        .collect();
    for kind in FacilityKind::all() {
        for stat in ["min", "mean", "median", "max"] {
            header.push(format!("{kind}_km_{stat}"));
        }
        header.push(format!("{kind}_minutes_mean"));
    }
    header.extend(metrics.summed_attributes.iter().map(|a| format!("sum_{a}")));
    header.extend(metrics.scores.iter().map(|s| format!("mean_{s}")));
    for score in &metrics.scores {
        for weighting in &metrics.weightings {
            header.push(format!("{score}_weighted_by_{}", weighting.label));
        }
    }
    csv.write_record(&header)?;

    for row in rows {
        let mut record = vec![
            row.group.clone(),
            row.algorithm.to_string(),
            row.label.to_string(),
            row.member_count.to_string(),
        ];
        record.extend(extent_cells(row.centroid, row.bounding_box));
        record.push(row.spread_km.to_string());
        for kind in FacilityKind::all() {
            let summary = row.nearest_distance_km.get(kind);
            record.push(cell(summary.map(|s| s.min)));
            record.push(cell(summary.map(|s| s.mean)));
            record.push(cell(summary.map(|s| s.median)));
            record.push(cell(summary.map(|s| s.max)));
            record.push(cell(row.mean_travel_minutes.get(kind).copied()));
        }
        record.extend(
            metrics
                .summed_attributes
                .iter()
                .map(|a| cell(row.attribute_sums.get(a).copied())),
        );
        record.extend(
            metrics
                .scores
                .iter()
                .map(|s| cell(row.composite_means.get(s).copied().flatten())),
        );
        for score in &metrics.scores {
            for weighting in &metrics.weightings {
                let value = row
                    .weighted_composite_means
                    .iter()
                    .find(|w| &w.composite == score && w.weighting == weighting.label)
                    .and_then(|w| w.value);
                record.push(cell(value));
            }
        }
        csv.write_record(&record)?;
    }

    csv.flush()?;
    Ok(())
}

/// Writes the per-group geographic summary.
pub fn write_group_summaries<W: Write>(
    writer: W,
    radii_km: &[f64],
    rows: &[GroupSummary],
) -> ExportResult<()> {
    let mut csv = csv::Writer::from_writer(writer);

    let mut header: Vec<String> = ["group", "area_count", "resolved_count"]
        .iter()
        .chain(EXTENT_COLUMNS)
        .map(ToString::to_string)
        .collect();
    header.push("bounding_radius_km".to_string());
    for kind in FacilityKind::all() {
        header.push(format!("{kind}_km_mean"));
        header.push(format!("{kind}_km_median"));
        header.push(format!("{kind}_km_travel_weighted"));
    }
    header.extend(
        radii_km
            .iter()
            .map(|&r| format!("mean_within_{}km", radius_label(r))),
    );
    csv.write_record(&header)?;

    for row in rows {
        let mut record = vec![
            row.group.clone(),
            row.area_count.to_string(),
            row.resolved_count.to_string(),
        ];
        record.extend(extent_cells(row.centroid, row.bounding_box));
        record.push(row.spread_km.to_string());
        record.push(row.bounding_radius_km.to_string());
        for kind in FacilityKind::all() {
            let summary = row.nearest_distance_km.get(kind);
            record.push(cell(summary.map(|s| s.mean)));
            record.push(cell(summary.map(|s| s.median)));
            record.push(cell(
                row.travel_weighted_distance_km.get(kind).copied().flatten(),
            ));
        }
        for &radius in radii_km {
            let mean = row
                .radius_means
                .iter()
                .find(|m| (m.radius_km - radius).abs() < f64::EPSILON)
                .map(|m| m.mean_count);
            record.push(cell(mean));
        }
        csv.write_record(&record)?;
    }

    csv.flush()?;
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DiagnosticsFile<'a> {
    diagnostics: &'a [Diagnostic],
    group_errors: &'a [GroupError],
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> ExportResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

fn create(dir: &Path, name: &str) -> ExportResult<BufWriter<File>> {
    Ok(BufWriter::new(File::create(dir.join(name))?))
}

/// Writes every output table into `dir`. Returns the number of files written.
///
/// # Errors
///
/// Returns an error if any file cannot be created or written.
pub fn write_all(
    dir: &Path,
    config: &AnalysisConfig,
    output: &AnalysisOutput,
    multi: &MultiProgress,
) -> ExportResult<u64> {
    let progress = IndicatifProgress::steps_bar(multi, "Writing outputs", OUTPUT_FILES);
    let radii = &config.distance.radii_km;
    let step = |name: &str| {
        log::debug!("Wrote {}", dir.join(name).display());
        progress.inc(1);
    };

    write_accessibility(create(dir, "accessibility.csv")?, radii, &output.accessibility)?;
    step("accessibility.csv");
    write_scores(create(dir, "scores.csv")?, &config.scoring, &output.scores)?;
    step("scores.csv");
    write_selections(create(dir, "selections.csv")?, &output.scores)?;
    step("selections.csv");
    write_assignments(create(dir, "assignments.csv")?, &output.assignments)?;
    step("assignments.csv");
    write_cluster_metrics(
        create(dir, "cluster_metrics.csv")?,
        config,
        &output.cluster_metrics,
    )?;
    step("cluster_metrics.csv");
    write_group_summaries(
        create(dir, "group_summary.csv")?,
        radii,
        &output.group_summaries,
    )?;
    step("group_summary.csv");
    write_json::<[Dendrogram]>(&dir.join("dendrograms.json"), &output.dendrograms)?;
    step("dendrograms.json");
    write_json(
        &dir.join("diagnostics.json"),
        &DiagnosticsFile {
            diagnostics: &output.diagnostics,
            group_errors: &output.group_errors,
        },
    )?;
    step("diagnostics.json");

    progress.finish(format!("Wrote {OUTPUT_FILES} files"));
    Ok(OUTPUT_FILES)
}
