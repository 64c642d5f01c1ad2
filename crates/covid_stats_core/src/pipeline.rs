//! File-level pipeline steps: XML → JSON → store → JSON/XML.
//!
//! # Responsibility
//! - Read source files and classify failures (`SourceNotFound`,
//!   `MalformedSource`, store and export failures).
//! - Open one store connection per step and release it on every exit path.
//! - Write outputs through a temporary file so failures leave no partial file.
//!
//! # Invariants
//! - No step retries; every failure ends the current invocation.
//! - Output parent directories are created on demand.

use crate::config::PipelineConfig;
use crate::db::{open_db, DbError};
use crate::document::json::{parse_input_document, write_json, DocumentError, JsonLayout};
use crate::document::xml::{read_document, write_document, XmlError};
use crate::model::stats::StatsDocument;
use crate::service::export_service::{export_document, ExportError};
use crate::service::import_service::{import_document, ImportError, ImportSummary};
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tempfile::NamedTempFile;

/// Why a source file could not be decoded.
#[derive(Debug)]
pub enum MalformedReason {
    Xml(XmlError),
    Json(DocumentError),
}

impl Display for MalformedReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Xml(err) => write!(f, "{err}"),
            Self::Json(err) => write!(f, "{err}"),
        }
    }
}

/// Terminal failure of one pipeline step.
#[derive(Debug)]
pub enum PipelineError {
    /// Input file does not exist.
    SourceNotFound(PathBuf),
    /// Input file exists but cannot be decoded.
    MalformedSource {
        path: PathBuf,
        reason: MalformedReason,
    },
    /// Import failed and was rolled back.
    StoreOperationFailure(ImportError),
    /// Export failed; no output file was written.
    ExportFailure(ExportError),
    /// Store could not be opened or migrated.
    Store(DbError),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl Display for PipelineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SourceNotFound(path) => write!(f, "source file not found: {}", path.display()),
            Self::MalformedSource { path, reason } => {
                write!(f, "malformed source `{}`: {reason}", path.display())
            }
            Self::StoreOperationFailure(err) => write!(f, "import rolled back: {err}"),
            Self::ExportFailure(err) => write!(f, "export failed: {err}"),
            Self::Store(err) => write!(f, "store unavailable: {err}"),
            Self::Io { path, source } => write!(f, "I/O error on `{}`: {source}", path.display()),
        }
    }
}

impl Error for PipelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::SourceNotFound(_) => None,
            Self::MalformedSource { reason, .. } => match reason {
                MalformedReason::Xml(err) => Some(err),
                MalformedReason::Json(err) => Some(err),
            },
            Self::StoreOperationFailure(err) => Some(err),
            Self::ExportFailure(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Io { source, .. } => Some(source),
        }
    }
}

impl From<ImportError> for PipelineError {
    fn from(value: ImportError) -> Self {
        Self::StoreOperationFailure(value)
    }
}

impl From<ExportError> for PipelineError {
    fn from(value: ExportError) -> Self {
        Self::ExportFailure(value)
    }
}

impl From<DbError> for PipelineError {
    fn from(value: DbError) -> Self {
        Self::Store(value)
    }
}

/// Outcome of a full `run_pipeline` call.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub source_months: usize,
    pub import: ImportSummary,
    pub exported: StatsDocument,
}

/// Reads and parses the source XML feed.
pub fn read_xml_file(xml_path: impl AsRef<Path>) -> Result<StatsDocument, PipelineError> {
    let xml_path = xml_path.as_ref();
    let text = read_source(xml_path)?;
    read_document(&text).map_err(|err| PipelineError::MalformedSource {
        path: xml_path.to_path_buf(),
        reason: MalformedReason::Xml(err),
    })
}

/// Converts the source XML feed into the primary JSON document on disk.
pub fn xml_to_json_file(
    xml_path: impl AsRef<Path>,
    json_path: impl AsRef<Path>,
) -> Result<StatsDocument, PipelineError> {
    let json_path = json_path.as_ref();
    let document = read_xml_file(xml_path)?;
    let text = write_json(&document, JsonLayout::Primary)
        .map_err(|err| PipelineError::ExportFailure(err.into()))?;
    write_atomically(json_path, &text).map_err(|source| PipelineError::Io {
        path: json_path.to_path_buf(),
        source,
    })?;
    info!(
        "event=json_write module=pipeline status=ok path={} years={} months={}",
        json_path.display(),
        document.data.len(),
        document.month_count()
    );
    Ok(document)
}

/// Re-reads an XML feed and writes it back grouped by year.
pub fn rewrite_xml_file(
    xml_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
) -> Result<StatsDocument, PipelineError> {
    let document = read_xml_file(xml_path)?;
    write_xml_output(&document, output_path.as_ref())?;
    Ok(document)
}

/// Imports a JSON document (either layout) into the store at `db_path`.
pub fn import_json_file(
    db_path: impl AsRef<Path>,
    json_path: impl AsRef<Path>,
) -> Result<ImportSummary, PipelineError> {
    let json_path = json_path.as_ref();
    let text = read_source(json_path)?;
    let input = parse_input_document(&text).map_err(|err| PipelineError::MalformedSource {
        path: json_path.to_path_buf(),
        reason: MalformedReason::Json(err),
    })?;
    if input.is_legacy() {
        info!(
            "event=json_read module=pipeline status=ok layout=legacy path={}",
            json_path.display()
        );
    }

    let mut conn = open_db(db_path)?;
    let summary = import_document(&mut conn, input)?;
    Ok(summary)
}

/// Exports the store at `db_path` as JSON in the requested layout.
pub fn export_json_file(
    db_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    layout: JsonLayout,
) -> Result<StatsDocument, PipelineError> {
    let output_path = output_path.as_ref();
    let document = {
        let conn = open_db(db_path)?;
        export_document(&conn)?
    };
    let text = write_json(&document, layout).map_err(ExportError::from)?;
    write_atomically(output_path, &text).map_err(|source| ExportError::Write {
        path: output_path.to_path_buf(),
        source,
    })?;
    info!(
        "event=json_write module=pipeline status=ok path={} layout={:?}",
        output_path.display(),
        layout
    );
    Ok(document)
}

/// Exports the store at `db_path` as an XML feed.
pub fn export_xml_file(
    db_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
) -> Result<StatsDocument, PipelineError> {
    let document = {
        let conn = open_db(db_path)?;
        export_document(&conn)?
    };
    write_xml_output(&document, output_path.as_ref())?;
    Ok(document)
}

/// Runs the fixed entry sequence: XML → JSON → import → JSON and XML export.
pub fn run_pipeline(config: &PipelineConfig) -> Result<PipelineReport, PipelineError> {
    let started_at = Instant::now();
    info!(
        "event=pipeline_run module=pipeline status=start source={} database={}",
        config.source_xml.display(),
        config.database_path.display()
    );

    let result = run_steps(config);
    match &result {
        Ok(report) => info!(
            "event=pipeline_run module=pipeline status=ok duration_ms={} source_months={} exported_months={}",
            started_at.elapsed().as_millis(),
            report.source_months,
            report.exported.month_count()
        ),
        Err(err) => error!(
            "event=pipeline_run module=pipeline status=error duration_ms={} error={}",
            started_at.elapsed().as_millis(),
            err
        ),
    }
    result
}

fn run_steps(config: &PipelineConfig) -> Result<PipelineReport, PipelineError> {
    let source = xml_to_json_file(&config.source_xml, &config.json_path)?;
    let import = import_json_file(&config.database_path, &config.json_path)?;
    let exported = export_json_file(
        &config.database_path,
        &config.exported_json,
        config.exported_json_layout,
    )?;
    export_xml_file(&config.database_path, &config.exported_xml)?;

    Ok(PipelineReport {
        source_months: source.month_count(),
        import,
        exported,
    })
}

fn write_xml_output(document: &StatsDocument, output_path: &Path) -> Result<(), PipelineError> {
    let text = write_document(document).map_err(ExportError::from)?;
    write_atomically(output_path, &text).map_err(|source| ExportError::Write {
        path: output_path.to_path_buf(),
        source,
    })?;
    info!(
        "event=xml_write module=pipeline status=ok path={} years={}",
        output_path.display(),
        document.data.len()
    );
    Ok(())
}

fn read_source(path: &Path) -> Result<String, PipelineError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            error!(
                "event=source_read module=pipeline status=error error_code=source_not_found path={}",
                path.display()
            );
            Err(PipelineError::SourceNotFound(path.to_path_buf()))
        }
        Err(source) => Err(PipelineError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes `contents` to a sibling temp file, then renames it over `path`.
fn write_atomically(path: &Path, contents: &str) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut file = NamedTempFile::new_in(parent)?;
    file.write_all(contents.as_bytes())?;
    file.write_all(b"\n")?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|err| err.error)?;
    Ok(())
}
