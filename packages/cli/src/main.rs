#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Batch runner for the facility accessibility analysis.
//!
//! Loads area and facility CSVs, runs the distance, scoring, clustering,
//! and aggregation passes, and writes every result table to an output
//! directory.
//!
//! Uses `indicatif-log-bridge` (via [`access_map_cli_utils::init_logger`])
//! so that log lines and progress bars never fight for the terminal.

mod export;

use std::path::{Path, PathBuf};

use access_map_cli_utils::IndicatifProgress;
use access_map_facility_models::ownership_label;
use access_map_pipeline::{AnalysisConfig, Diagnostic, Pipeline};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "access_map", about = "Facility accessibility scoring and clustering")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full analysis and write result tables
    Run {
        /// Area records (CSV)
        #[arg(long)]
        areas: PathBuf,
        /// Facility records (CSV)
        #[arg(long)]
        facilities: PathBuf,
        /// Analysis configuration (TOML); defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,
        /// Directory for the output tables
        #[arg(long, default_value = "output")]
        output_dir: PathBuf,
    },
    /// Validate a configuration file without loading any data
    CheckConfig {
        /// Analysis configuration (TOML)
        path: PathBuf,
    },
    /// Classify one facility with the configured rule table
    Classify {
        /// Facility name
        #[arg(long)]
        name: Option<String>,
        /// Ownership/use code (e.g. PU, PR, MR)
        #[arg(long)]
        code: String,
        /// Analysis configuration (TOML) providing a rule table
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig, Box<dyn std::error::Error>> {
    Ok(match path {
        Some(path) => AnalysisConfig::load(path)?,
        None => AnalysisConfig::default(),
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = access_map_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            areas,
            facilities,
            config,
            output_dir,
        } => {
            let pipeline = Pipeline::new(load_config(config.as_deref())?)?;
            let config = pipeline.config();

            let loaded_areas = access_map_ingest::read_areas_path(&areas, &config.areas)?;
            let loaded_facilities =
                access_map_ingest::read_facilities_path(&facilities, &config.facilities)?;

            let progress = IndicatifProgress::passes_bar(&multi, "Starting analysis");
            let mut output = pipeline.run(
                &loaded_areas.records,
                &loaded_facilities.records,
                progress.as_ref(),
            )?;

            let areas_name = areas.display().to_string();
            let facilities_name = facilities.display().to_string();
            let mut diagnostics: Vec<Diagnostic> = loaded_areas
                .issues
                .iter()
                .map(|issue| Diagnostic::from_ingest(&areas_name, issue))
                .chain(
                    loaded_facilities
                        .issues
                        .iter()
                        .map(|issue| Diagnostic::from_ingest(&facilities_name, issue)),
                )
                .collect();
            diagnostics.append(&mut output.diagnostics);
            output.diagnostics = diagnostics;

            std::fs::create_dir_all(&output_dir)?;
            let written = export::write_all(&output_dir, config, &output, &multi)?;
            log::info!("Wrote {written} files to {}", output_dir.display());

            if !output.group_errors.is_empty() {
                log::warn!(
                    "{} groups failed; see diagnostics.json",
                    output.group_errors.len()
                );
            }
        }
        Commands::CheckConfig { path } => {
            let pipeline = Pipeline::new(AnalysisConfig::load(&path)?)?;
            let config = pipeline.config();
            println!("{} is valid", path.display());
            println!("  radii (km):   {:?}", config.distance.radii_km);
            println!("  travel:       {} min/km (estimate)", config.distance.minutes_per_km);
            println!("  scores:       {}", config.scoring.score_names().join(", "));
            println!(
                "  algorithms:   {}",
                config
                    .clustering
                    .algorithms
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            println!("  rules:        {}", pipeline.rules().rules.len());
        }
        Commands::Classify { name, code, config } => {
            let rules = load_config(config.as_deref())?.rule_table();
            rules.validate()?;
            println!(
                "{} (ownership: {})",
                rules.classify(name.as_deref(), &code),
                ownership_label(&code)
            );
        }
    }

    Ok(())
}
