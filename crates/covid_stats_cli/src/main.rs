//! Pipeline entry point.
//!
//! # Responsibility
//! - Load configuration (optional JSON file path as the only argument).
//! - Run XML → JSON → store → JSON/XML once and report the outcome.

use covid_stats_core::{
    core_version, default_log_level, init_logging, load_config, run_pipeline, PipelineConfig,
};
use log::info;
use std::process::ExitCode;

fn main() -> ExitCode {
    let config = match std::env::args_os().nth(1) {
        Some(path) => match load_config(&path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("covid_stats: {err}");
                return ExitCode::from(2);
            }
        },
        None => PipelineConfig::default(),
    };

    let level = config
        .log_level
        .clone()
        .unwrap_or_else(|| default_log_level().to_string());
    if let Err(err) = init_logging(&level, &config.log_dir.to_string_lossy()) {
        eprintln!("covid_stats: logging disabled: {err}");
    }
    info!("event=cli_start module=cli status=ok version={}", core_version());

    match run_pipeline(&config) {
        Ok(report) => {
            println!(
                "imported {} months ({} inserted, {} updated) from {}",
                report.source_months,
                report.import.months_inserted,
                report.import.months_updated,
                config.source_xml.display()
            );
            println!("exported JSON: {}", config.exported_json.display());
            println!("exported XML: {}", config.exported_xml.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("covid_stats: {err}");
            ExitCode::FAILURE
        }
    }
}
