//! Document import (upsert) use-case.
//!
//! # Responsibility
//! - Map each year/month of a document onto `years`, `unemployment` and
//!   `deaths` rows with find-or-create semantics.
//! - Run the whole import inside one immediate transaction.
//!
//! # Invariants
//! - Re-importing the same document leaves the row set unchanged.
//! - A matching `(year, month name)` is updated in place, never duplicated.
//! - Any failure rolls back every change made by the call.

use crate::document::json::InputDocument;
use crate::model::stats::{MonthEntry, StatsDocument};
use crate::repo::stats_repo::{RepoError, SqliteStatsRepository, StatsRepository, YearId};
use log::{error, info};
use rusqlite::{Connection, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Error for import use-cases.
#[derive(Debug)]
pub enum ImportError {
    /// A month entry cannot be stored as given.
    InvalidMonth {
        year: i32,
        index: usize,
        reason: &'static str,
    },
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidMonth {
                year,
                index,
                reason,
            } => write!(f, "invalid month #{index} in year {year}: {reason}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidMonth { .. } => None,
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for ImportError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<rusqlite::Error> for ImportError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(value.into())
    }
}

/// Counts of what one import call changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub years_created: usize,
    pub years_matched: usize,
    pub months_inserted: usize,
    pub months_updated: usize,
    pub deaths_inserted: usize,
    pub deaths_updated: usize,
}

/// Imports a document in either JSON layout.
pub fn import_document(
    conn: &mut Connection,
    input: InputDocument,
) -> Result<ImportSummary, ImportError> {
    import_stats(conn, &input.normalize())
}

/// Imports a primary-shape document as one transaction.
///
/// # Side effects
/// - Commits all upserts together on success; rolls back on any error.
/// - Emits `import` logging events with counts and duration.
pub fn import_stats(
    conn: &mut Connection,
    document: &StatsDocument,
) -> Result<ImportSummary, ImportError> {
    let started_at = Instant::now();
    info!(
        "event=import module=service status=start years={} months={}",
        document.data.len(),
        document.month_count()
    );

    match import_in_transaction(conn, document) {
        Ok(summary) => {
            info!(
                "event=import module=service status=ok duration_ms={} years_created={} years_matched={} months_inserted={} months_updated={} deaths_inserted={} deaths_updated={}",
                started_at.elapsed().as_millis(),
                summary.years_created,
                summary.years_matched,
                summary.months_inserted,
                summary.months_updated,
                summary.deaths_inserted,
                summary.deaths_updated
            );
            Ok(summary)
        }
        Err(err) => {
            error!(
                "event=import module=service status=error duration_ms={} error_code=import_rolled_back error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn import_in_transaction(
    conn: &mut Connection,
    document: &StatsDocument,
) -> Result<ImportSummary, ImportError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let summary = {
        let repo = SqliteStatsRepository::new(&tx);
        upsert_document(&repo, document)?
    };
    tx.commit()?;
    Ok(summary)
}

/// Applies find-or-create upserts for every year and month in `document`.
///
/// Callers own the transaction boundary.
pub fn upsert_document<R: StatsRepository>(
    repo: &R,
    document: &StatsDocument,
) -> Result<ImportSummary, ImportError> {
    let mut summary = ImportSummary::default();

    for entry in &document.data {
        let year_id = match repo.find_year(entry.year)? {
            Some(row) => {
                summary.years_matched += 1;
                row.id
            }
            None => {
                summary.years_created += 1;
                repo.insert_year(entry.year)?
            }
        };

        for (index, month) in entry.months.iter().enumerate() {
            validate_month(entry.year, index, month)?;
            upsert_month(repo, year_id, month, &mut summary)?;
        }
    }

    Ok(summary)
}

fn validate_month(year: i32, index: usize, month: &MonthEntry) -> Result<(), ImportError> {
    if month.name.trim().is_empty() {
        return Err(ImportError::InvalidMonth {
            year,
            index,
            reason: "month name must not be blank",
        });
    }
    Ok(())
}

fn upsert_month<R: StatsRepository>(
    repo: &R,
    year_id: YearId,
    month: &MonthEntry,
    summary: &mut ImportSummary,
) -> Result<(), ImportError> {
    let month_id = match repo.find_month(year_id, &month.name)? {
        Some(row) => {
            repo.update_month(row.id, &month.unemployment)?;
            summary.months_updated += 1;
            row.id
        }
        None => {
            summary.months_inserted += 1;
            repo.insert_month(year_id, &month.name, &month.unemployment)?
        }
    };

    match repo.find_death_for_month(month_id)? {
        Some(row) => {
            repo.update_death(row.id, &month.deaths)?;
            summary.deaths_updated += 1;
        }
        None => {
            repo.insert_death(month_id, &month.deaths)?;
            summary.deaths_inserted += 1;
        }
    }

    Ok(())
}
