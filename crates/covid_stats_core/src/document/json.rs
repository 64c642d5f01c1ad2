//! JSON bridge between the typed document and its two wire layouts.
//!
//! # Responsibility
//! - Parse JSON input into an `InputDocument` tagged by layout.
//! - Normalize legacy input into the primary `StatsDocument`.
//! - Render documents in either layout for export.
//!
//! # Invariants
//! - `years` wins over `data` when a document carries both keys.
//! - Year entries without a year number are dropped in either layout.
//! - No validation beyond key presence; absent statistics stay `null`.

use crate::model::stats::{MonthEntry, StatsDocument, YearEntry};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type DocumentResult<T> = Result<T, DocumentError>;

/// Error raised while decoding or encoding JSON documents.
#[derive(Debug)]
pub enum DocumentError {
    /// Input is not valid JSON or does not match the expected layout.
    Json(serde_json::Error),
    /// Top-level JSON value is not an object.
    NotAnObject,
    /// Neither `data` nor `years` is present at the top level.
    MissingYears,
}

impl Display for DocumentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "invalid statistics JSON: {err}"),
            Self::NotAnObject => write!(f, "statistics JSON must be an object"),
            Self::MissingYears => write!(f, "statistics JSON has neither `data` nor `years` key"),
        }
    }
}

impl Error for DocumentError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            Self::NotAnObject | Self::MissingYears => None,
        }
    }
}

impl From<serde_json::Error> for DocumentError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Year entry in the legacy layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyYearEntry {
    #[serde(default)]
    pub value: Option<i32>,
    #[serde(default)]
    pub months: Vec<MonthEntry>,
}

/// Older export layout: `{"years": [{"value": 2020, "months": [...]}]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyDocument {
    pub years: Vec<LegacyYearEntry>,
}

impl From<&StatsDocument> for LegacyDocument {
    fn from(document: &StatsDocument) -> Self {
        Self {
            years: document
                .data
                .iter()
                .map(|entry| LegacyYearEntry {
                    value: Some(entry.year),
                    months: entry.months.clone(),
                })
                .collect(),
        }
    }
}

/// Year entry of primary-layout input; `year` may be absent on the wire.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PrimaryYearEntry {
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub months: Vec<MonthEntry>,
}

/// Primary-layout input before year entries are checked.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PrimaryDocument {
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, rename = "lastUpdate")]
    pub last_update: Option<String>,
    pub data: Vec<PrimaryYearEntry>,
}

/// JSON input in whichever layout it arrived.
#[derive(Debug, Clone, PartialEq)]
pub enum InputDocument {
    Primary(PrimaryDocument),
    Legacy(LegacyDocument),
}

impl InputDocument {
    /// Converts the input into the primary document shape.
    ///
    /// Year entries without a year number are dropped with a warning.
    pub fn normalize(self) -> StatsDocument {
        match self {
            Self::Primary(primary) => {
                let mut document = StatsDocument {
                    country: primary.country,
                    source: primary.source,
                    last_update: primary.last_update,
                    data: Vec::new(),
                };
                push_years(
                    &mut document,
                    primary.data.into_iter().map(|entry| (entry.year, entry.months)),
                );
                document
            }
            Self::Legacy(legacy) => {
                let mut document = StatsDocument::default();
                push_years(
                    &mut document,
                    legacy.years.into_iter().map(|entry| (entry.value, entry.months)),
                );
                document
            }
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, Self::Legacy(_))
    }
}

fn push_years<I>(document: &mut StatsDocument, entries: I)
where
    I: IntoIterator<Item = (Option<i32>, Vec<MonthEntry>)>,
{
    for (index, (year, months)) in entries.into_iter().enumerate() {
        match year {
            Some(year) => document.data.push(YearEntry { year, months }),
            None => warn!(
                "event=json_normalize module=document status=skip index={} reason=missing_year_value",
                index
            ),
        }
    }
}

/// Output layout for exported JSON.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonLayout {
    /// `{country, source, lastUpdate, data: [...]}`.
    #[default]
    Primary,
    /// `{years: [{value, months}]}`.
    Legacy,
}

/// Parses JSON text into an `InputDocument`.
pub fn parse_input_document(json: &str) -> DocumentResult<InputDocument> {
    let value: Value = serde_json::from_str(json)?;
    input_document_from_value(value)
}

/// Classifies an already-parsed JSON value by its top-level keys.
pub fn input_document_from_value(value: Value) -> DocumentResult<InputDocument> {
    let Value::Object(map) = &value else {
        return Err(DocumentError::NotAnObject);
    };

    if map.contains_key("years") {
        return Ok(InputDocument::Legacy(serde_json::from_value(value)?));
    }
    if map.contains_key("data") {
        return Ok(InputDocument::Primary(serde_json::from_value(value)?));
    }
    Err(DocumentError::MissingYears)
}

/// Renders a document as pretty-printed JSON in the requested layout.
pub fn write_json(document: &StatsDocument, layout: JsonLayout) -> DocumentResult<String> {
    let text = match layout {
        JsonLayout::Primary => serde_json::to_string_pretty(document)?,
        JsonLayout::Legacy => serde_json::to_string_pretty(&LegacyDocument::from(document))?,
    };
    Ok(text)
}
