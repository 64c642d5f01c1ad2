//! Core mapping logic for the COVID statistics pipeline.
//! XML feed ⇄ JSON document ⇄ SQLite rows, with idempotent upsert import.

pub mod config;
pub mod db;
pub mod document;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod repo;
pub mod service;

pub use config::{load_config, ConfigError, PipelineConfig};
pub use document::json::{
    parse_input_document, write_json, DocumentError, InputDocument, JsonLayout, LegacyDocument,
    PrimaryDocument,
};
pub use document::xml::{read_document, read_records, write_document, write_records, XmlError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::stats::{
    DeathCounts, DocumentMetadata, MonthEntry, StatRecord, StatsDocument, UnemploymentRates,
    YearEntry,
};
pub use pipeline::{
    export_json_file, export_xml_file, import_json_file, read_xml_file, rewrite_xml_file,
    run_pipeline, xml_to_json_file, MalformedReason, PipelineError, PipelineReport,
};
pub use repo::stats_repo::{
    DeathRow, MonthRow, RepoError, RepoResult, SqliteStatsRepository, StatsRepository,
    StoreCounts, YearRow,
};
pub use service::export_service::{collect_document, export_document, ExportError};
pub use service::import_service::{
    import_document, import_stats, upsert_document, ImportError, ImportSummary,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
