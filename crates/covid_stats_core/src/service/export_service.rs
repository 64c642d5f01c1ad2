//! Store-to-document export use-case.
//!
//! # Responsibility
//! - Rebuild the primary document from stored rows.
//!
//! # Invariants
//! - Years are ordered by value ascending; months by insertion order.
//! - A month without a death row exports `null` death fields.
//! - Export is read-only.

use crate::document::json::DocumentError;
use crate::document::xml::XmlError;
use crate::model::stats::{MonthEntry, StatsDocument, YearEntry};
use crate::repo::stats_repo::{RepoError, SqliteStatsRepository, StatsRepository};
use log::{error, info};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Instant;

/// Error for export use-cases.
#[derive(Debug)]
pub enum ExportError {
    /// Reading rows failed.
    Repo(RepoError),
    /// The exported document cannot be rendered as XML.
    Xml(XmlError),
    /// The exported document cannot be rendered as JSON.
    Json(DocumentError),
    /// The output file cannot be written.
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl Display for ExportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Xml(err) => write!(f, "{err}"),
            Self::Json(err) => write!(f, "{err}"),
            Self::Write { path, source } => {
                write!(f, "cannot write `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for ExportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Xml(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::Write { source, .. } => Some(source),
        }
    }
}

impl From<RepoError> for ExportError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<XmlError> for ExportError {
    fn from(value: XmlError) -> Self {
        Self::Xml(value)
    }
}

impl From<DocumentError> for ExportError {
    fn from(value: DocumentError) -> Self {
        Self::Json(value)
    }
}

/// Exports the whole store as a primary-shape document.
///
/// `country`, `source` and `lastUpdate` are `None`: the store does not keep
/// feed metadata.
pub fn export_document(conn: &Connection) -> Result<StatsDocument, ExportError> {
    let started_at = Instant::now();
    info!("event=export module=service status=start");

    let repo = SqliteStatsRepository::new(conn);
    match collect_document(&repo) {
        Ok(document) => {
            info!(
                "event=export module=service status=ok duration_ms={} years={} months={}",
                started_at.elapsed().as_millis(),
                document.data.len(),
                document.month_count()
            );
            Ok(document)
        }
        Err(err) => {
            error!(
                "event=export module=service status=error duration_ms={} error_code=export_read_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

/// Reads every year, month and death row through `repo`.
pub fn collect_document<R: StatsRepository>(repo: &R) -> Result<StatsDocument, ExportError> {
    let mut document = StatsDocument::default();

    for year in repo.list_years()? {
        let mut entry = YearEntry {
            year: year.value,
            months: Vec::new(),
        };
        for month in repo.list_months_for_year(year.id)? {
            let deaths = repo
                .find_death_for_month(month.id)?
                .map(|row| row.counts)
                .unwrap_or_default();
            entry.months.push(MonthEntry {
                name: month.name,
                unemployment: month.rates,
                deaths,
            });
        }
        document.data.push(entry);
    }

    Ok(document)
}
