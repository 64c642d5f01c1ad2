//! Statistics document and record types.
//!
//! # Responsibility
//! - Model the primary JSON document (`{country, source, lastUpdate, data}`).
//! - Model the flat per-month record set used by the XML reader/writer.
//!
//! # Invariants
//! - `DeathCounts` serializes the covid field as `"COVID-19"`.
//! - `DeathCounts` reads `"COVID-19"` first and falls back to `"covid_deaths"`.

use serde::{Deserialize, Serialize};

/// Monthly unemployment rates in percent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UnemploymentRates {
    #[serde(default)]
    pub national: Option<f64>,
    #[serde(default)]
    pub male: Option<f64>,
    #[serde(default)]
    pub female: Option<f64>,
}

/// Monthly death counts split by cause.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawDeathCounts")]
pub struct DeathCounts {
    pub total: Option<i64>,
    #[serde(rename = "COVID-19")]
    pub covid: Option<i64>,
    pub other: Option<i64>,
}

/// Wire form accepting both covid key spellings.
#[derive(Debug, Default, Deserialize)]
struct RawDeathCounts {
    #[serde(default)]
    total: Option<i64>,
    #[serde(default, rename = "COVID-19")]
    covid: Option<i64>,
    #[serde(default)]
    covid_deaths: Option<i64>,
    #[serde(default)]
    other: Option<i64>,
}

impl From<RawDeathCounts> for DeathCounts {
    fn from(raw: RawDeathCounts) -> Self {
        Self {
            total: raw.total,
            covid: raw.covid.or(raw.covid_deaths),
            other: raw.other,
        }
    }
}

/// One month of statistics inside a year entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthEntry {
    /// Month name as written by the source feed (`January`, ...).
    ///
    /// Defaults to empty when absent so the importer can reject it inside the
    /// running transaction.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub unemployment: UnemploymentRates,
    #[serde(default)]
    pub deaths: DeathCounts,
}

/// One year of statistics in the primary document shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearEntry {
    pub year: i32,
    #[serde(default)]
    pub months: Vec<MonthEntry>,
}

/// Feed-level metadata carried by the XML root element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub country: Option<String>,
    pub source: Option<String>,
    pub last_update: Option<String>,
}

/// Primary JSON document produced by the XML-to-JSON stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsDocument {
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, rename = "lastUpdate")]
    pub last_update: Option<String>,
    pub data: Vec<YearEntry>,
}

impl StatsDocument {
    /// Creates an empty document carrying the given metadata.
    pub fn with_metadata(metadata: DocumentMetadata) -> Self {
        Self {
            country: metadata.country,
            source: metadata.source,
            last_update: metadata.last_update,
            data: Vec::new(),
        }
    }

    /// Returns the feed-level metadata of this document.
    pub fn metadata(&self) -> DocumentMetadata {
        DocumentMetadata {
            country: self.country.clone(),
            source: self.source.clone(),
            last_update: self.last_update.clone(),
        }
    }

    /// Total number of month entries across all years.
    pub fn month_count(&self) -> usize {
        self.data.iter().map(|year| year.months.len()).sum()
    }

    /// Flattens the nested document into one record per month, in order.
    pub fn to_records(&self) -> Vec<StatRecord> {
        self.data
            .iter()
            .flat_map(|year| {
                year.months
                    .iter()
                    .map(move |month| StatRecord::from_month(year.year, month))
            })
            .collect()
    }

    /// Groups flat records by year, keeping first-appearance order of years
    /// and the original order of months within each year.
    pub fn from_records(metadata: DocumentMetadata, records: &[StatRecord]) -> Self {
        let mut document = Self::with_metadata(metadata);
        for record in records {
            let month = record.to_month();
            match document
                .data
                .iter_mut()
                .find(|entry| entry.year == record.year)
            {
                Some(entry) => entry.months.push(month),
                None => document.data.push(YearEntry {
                    year: record.year,
                    months: vec![month],
                }),
            }
        }
        document
    }
}

/// Flat per-month record as produced by the XML reader.
#[derive(Debug, Clone, PartialEq)]
pub struct StatRecord {
    pub year: i32,
    pub month: String,
    pub national: Option<f64>,
    pub male: Option<f64>,
    pub female: Option<f64>,
    pub deaths_total: Option<i64>,
    pub deaths_covid: Option<i64>,
    pub deaths_other: Option<i64>,
}

impl StatRecord {
    fn from_month(year: i32, month: &MonthEntry) -> Self {
        Self {
            year,
            month: month.name.clone(),
            national: month.unemployment.national,
            male: month.unemployment.male,
            female: month.unemployment.female,
            deaths_total: month.deaths.total,
            deaths_covid: month.deaths.covid,
            deaths_other: month.deaths.other,
        }
    }

    fn to_month(&self) -> MonthEntry {
        MonthEntry {
            name: self.month.clone(),
            unemployment: UnemploymentRates {
                national: self.national,
                male: self.male,
                female: self.female,
            },
            deaths: DeathCounts {
                total: self.deaths_total,
                covid: self.deaths_covid,
                other: self.deaths_other,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DeathCounts, DocumentMetadata, StatRecord, StatsDocument};
    use serde_json::json;

    fn record(year: i32, month: &str) -> StatRecord {
        StatRecord {
            year,
            month: month.to_string(),
            national: Some(5.0),
            male: Some(4.8),
            female: Some(5.3),
            deaths_total: Some(100),
            deaths_covid: Some(10),
            deaths_other: Some(90),
        }
    }

    #[test]
    fn death_counts_prefer_covid_19_key() {
        let counts: DeathCounts =
            serde_json::from_value(json!({"total": 5, "COVID-19": 2, "covid_deaths": 9}))
                .expect("JSON value should deserialize");
        assert_eq!(counts.covid, Some(2));
    }

    #[test]
    fn death_counts_fall_back_to_covid_deaths_key() {
        let counts: DeathCounts =
            serde_json::from_value(json!({"total": 5, "covid_deaths": 9, "other": 1}))
                .expect("JSON value should deserialize");
        assert_eq!(counts.covid, Some(9));
        assert_eq!(counts.other, Some(1));
    }

    #[test]
    fn death_counts_serialize_covid_19_key_with_nulls() {
        let value = serde_json::to_value(DeathCounts {
            total: Some(3),
            covid: None,
            other: None,
        })
        .expect("document should serialize");
        assert_eq!(value, json!({"total": 3, "COVID-19": null, "other": null}));
    }

    #[test]
    fn from_records_groups_by_first_appearance_of_year() {
        let records = vec![
            record(2021, "January"),
            record(2020, "January"),
            record(2021, "February"),
        ];
        let document = StatsDocument::from_records(DocumentMetadata::default(), &records);

        assert_eq!(document.data.len(), 2);
        assert_eq!(document.data[0].year, 2021);
        let names: Vec<_> = document.data[0]
            .months
            .iter()
            .map(|month| month.name.as_str())
            .collect();
        assert_eq!(names, vec!["January", "February"]);
        assert_eq!(document.data[1].year, 2020);
        assert_eq!(document.month_count(), 3);
    }

    #[test]
    fn to_records_preserves_document_order() {
        let records = vec![record(2020, "March"), record(2020, "April")];
        let document = StatsDocument::from_records(DocumentMetadata::default(), &records);
        assert_eq!(document.to_records(), records);
    }
}
