//! Statistics repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide lookup/insert/update queries keyed the way the importer upserts.
//! - Provide ordered reads for the exporter.
//!
//! # Invariants
//! - `years.value` is unique.
//! - `(unemployment.year_id, unemployment.name)` is unique.
//! - `deaths.month_id` is unique (one death row per month).

use crate::db::DbError;
use crate::model::stats::{DeathCounts, UnemploymentRates};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type YearId = i64;
pub type MonthId = i64;
pub type DeathId = i64;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for statistics persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// An update targeted a row that does not exist.
    NotFound { table: &'static str, id: i64 },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { table, id } => write!(f, "row not found: {table}.id={id}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::NotFound { .. } => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Stored year row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRow {
    pub id: YearId,
    pub value: i32,
}

/// Stored per-month unemployment row.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthRow {
    pub id: MonthId,
    pub year_id: YearId,
    pub name: String,
    pub rates: UnemploymentRates,
}

/// Stored per-month death row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeathRow {
    pub id: DeathId,
    pub month_id: MonthId,
    pub counts: DeathCounts,
}

/// Row counts per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub years: i64,
    pub months: i64,
    pub deaths: i64,
}

/// Repository interface for the statistics tables.
pub trait StatsRepository {
    fn find_year(&self, value: i32) -> RepoResult<Option<YearRow>>;
    fn insert_year(&self, value: i32) -> RepoResult<YearId>;
    /// Years ordered by value ascending.
    fn list_years(&self) -> RepoResult<Vec<YearRow>>;
    /// Deletes a year and, through cascades, its months and deaths.
    fn delete_year(&self, value: i32) -> RepoResult<bool>;

    fn find_month(&self, year_id: YearId, name: &str) -> RepoResult<Option<MonthRow>>;
    fn insert_month(
        &self,
        year_id: YearId,
        name: &str,
        rates: &UnemploymentRates,
    ) -> RepoResult<MonthId>;
    fn update_month(&self, month_id: MonthId, rates: &UnemploymentRates) -> RepoResult<()>;
    /// Months of one year in insertion order (`id` ascending).
    fn list_months_for_year(&self, year_id: YearId) -> RepoResult<Vec<MonthRow>>;

    fn find_death_for_month(&self, month_id: MonthId) -> RepoResult<Option<DeathRow>>;
    fn insert_death(&self, month_id: MonthId, counts: &DeathCounts) -> RepoResult<DeathId>;
    fn update_death(&self, death_id: DeathId, counts: &DeathCounts) -> RepoResult<()>;

    fn row_counts(&self) -> RepoResult<StoreCounts>;
}

/// SQLite-backed statistics repository.
///
/// Accepts a plain connection or a `Transaction` (via deref), so the importer
/// can run every query inside its own transaction.
pub struct SqliteStatsRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteStatsRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl StatsRepository for SqliteStatsRepository<'_> {
    fn find_year(&self, value: i32) -> RepoResult<Option<YearRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, value FROM years WHERE value = ?1;",
                [value],
                parse_year_row,
            )
            .optional()?;
        Ok(row)
    }

    fn insert_year(&self, value: i32) -> RepoResult<YearId> {
        self.conn
            .execute("INSERT INTO years (value) VALUES (?1);", [value])?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_years(&self) -> RepoResult<Vec<YearRow>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, value FROM years ORDER BY value ASC;")?;
        let rows = stmt.query_map([], parse_year_row)?;
        let mut years = Vec::new();
        for row in rows {
            years.push(row?);
        }
        Ok(years)
    }

    fn delete_year(&self, value: i32) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM years WHERE value = ?1;", [value])?;
        Ok(changed > 0)
    }

    fn find_month(&self, year_id: YearId, name: &str) -> RepoResult<Option<MonthRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, year_id, name, national, male, female
                 FROM unemployment
                 WHERE year_id = ?1 AND name = ?2;",
                params![year_id, name],
                parse_month_row,
            )
            .optional()?;
        Ok(row)
    }

    fn insert_month(
        &self,
        year_id: YearId,
        name: &str,
        rates: &UnemploymentRates,
    ) -> RepoResult<MonthId> {
        self.conn.execute(
            "INSERT INTO unemployment (year_id, name, national, male, female)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![year_id, name, rates.national, rates.male, rates.female],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_month(&self, month_id: MonthId, rates: &UnemploymentRates) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE unemployment
             SET
                national = ?2,
                male = ?3,
                female = ?4
             WHERE id = ?1;",
            params![month_id, rates.national, rates.male, rates.female],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                table: "unemployment",
                id: month_id,
            });
        }
        Ok(())
    }

    fn list_months_for_year(&self, year_id: YearId) -> RepoResult<Vec<MonthRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, year_id, name, national, male, female
             FROM unemployment
             WHERE year_id = ?1
             ORDER BY id ASC;",
        )?;
        let rows = stmt.query_map([year_id], parse_month_row)?;
        let mut months = Vec::new();
        for row in rows {
            months.push(row?);
        }
        Ok(months)
    }

    fn find_death_for_month(&self, month_id: MonthId) -> RepoResult<Option<DeathRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, month_id, total, covid, other
                 FROM deaths
                 WHERE month_id = ?1;",
                [month_id],
                parse_death_row,
            )
            .optional()?;
        Ok(row)
    }

    fn insert_death(&self, month_id: MonthId, counts: &DeathCounts) -> RepoResult<DeathId> {
        self.conn.execute(
            "INSERT INTO deaths (month_id, total, covid, other)
             VALUES (?1, ?2, ?3, ?4);",
            params![month_id, counts.total, counts.covid, counts.other],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_death(&self, death_id: DeathId, counts: &DeathCounts) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE deaths
             SET
                total = ?2,
                covid = ?3,
                other = ?4
             WHERE id = ?1;",
            params![death_id, counts.total, counts.covid, counts.other],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                table: "deaths",
                id: death_id,
            });
        }
        Ok(())
    }

    fn row_counts(&self) -> RepoResult<StoreCounts> {
        let counts = self.conn.query_row(
            "SELECT
                (SELECT COUNT(*) FROM years),
                (SELECT COUNT(*) FROM unemployment),
                (SELECT COUNT(*) FROM deaths);",
            [],
            |row| {
                Ok(StoreCounts {
                    years: row.get(0)?,
                    months: row.get(1)?,
                    deaths: row.get(2)?,
                })
            },
        )?;
        Ok(counts)
    }
}

fn parse_year_row(row: &Row<'_>) -> rusqlite::Result<YearRow> {
    Ok(YearRow {
        id: row.get("id")?,
        value: row.get("value")?,
    })
}

fn parse_month_row(row: &Row<'_>) -> rusqlite::Result<MonthRow> {
    Ok(MonthRow {
        id: row.get("id")?,
        year_id: row.get("year_id")?,
        name: row.get("name")?,
        rates: UnemploymentRates {
            national: row.get("national")?,
            male: row.get("male")?,
            female: row.get("female")?,
        },
    })
}

fn parse_death_row(row: &Row<'_>) -> rusqlite::Result<DeathRow> {
    Ok(DeathRow {
        id: row.get("id")?,
        month_id: row.get("month_id")?,
        counts: DeathCounts {
            total: row.get("total")?,
            covid: row.get("covid")?,
            other: row.get("other")?,
        },
    })
}
