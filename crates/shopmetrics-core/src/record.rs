//! Record sources: external field-mapping producers feeding the batch loader.
//!
//! The reference sources are CSV files with a header row, but the loader only
//! depends on the [`RecordSource`] trait, so tests (or future producers) can
//! feed it records from anywhere.

use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{AnalyticsError, Result};

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One source row: a field-name to raw-string mapping with typed accessors.
///
/// Conversion failures always name the offending field so a bad row in a
/// ten-thousand-line file is diagnosable from the error alone.
#[derive(Debug, Clone, Default)]
pub struct Record {
    fields: HashMap<String, String>,
}

impl Record {
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            fields: pairs
                .into_iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn require(&self, field: &str) -> Result<&str> {
        self.get(field)
            .ok_or_else(|| AnalyticsError::Conversion(format!("missing required field `{field}`")))
    }

    pub fn integer(&self, field: &str) -> Result<i64> {
        let raw = self.require(field)?;
        raw.trim().parse().map_err(|_| {
            AnalyticsError::Conversion(format!("field `{field}`: `{raw}` is not an integer"))
        })
    }

    pub fn decimal(&self, field: &str) -> Result<f64> {
        let raw = self.require(field)?;
        raw.trim().parse().map_err(|_| {
            AnalyticsError::Conversion(format!("field `{field}`: `{raw}` is not a number"))
        })
    }

    /// Decimal with a default that applies only when the column is absent
    /// from the source entirely. A present-but-empty value is still a
    /// conversion error.
    pub fn decimal_or(&self, field: &str, default: f64) -> Result<f64> {
        match self.get(field) {
            None => Ok(default),
            Some(_) => self.decimal(field),
        }
    }

    /// Boolean defaulting to true when the column is absent. A present value
    /// is true only when it spells `true` case-insensitively.
    pub fn boolean_or_true(&self, field: &str) -> bool {
        match self.get(field) {
            None => true,
            Some(raw) => raw.eq_ignore_ascii_case("true"),
        }
    }

    /// Nullable `YYYY-MM-DD` date; an absent column or empty value is None.
    pub fn optional_date(&self, field: &str) -> Result<Option<NaiveDate>> {
        match self.get(field) {
            None | Some("") => Ok(None),
            Some(raw) => NaiveDate::parse_from_str(raw, DATE_FORMAT)
                .map(Some)
                .map_err(|_| {
                    AnalyticsError::Conversion(format!(
                        "field `{field}`: `{raw}` is not a `{DATE_FORMAT}` date"
                    ))
                }),
        }
    }

    /// Required `YYYY-MM-DD HH:MM:SS` timestamp.
    pub fn timestamp(&self, field: &str) -> Result<NaiveDateTime> {
        let raw = self.require(field)?;
        NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).map_err(|_| {
            AnalyticsError::Conversion(format!(
                "field `{field}`: `{raw}` is not a `{TIMESTAMP_FORMAT}` timestamp"
            ))
        })
    }
}

/// An ordered producer of records for one entity kind.
pub trait RecordSource: Send {
    fn next_record(&mut self) -> Result<Option<Record>>;
}

/// Header-driven CSV record source.
pub struct CsvSource<R: io::Read> {
    headers: Vec<String>,
    records: csv::StringRecordsIntoIter<R>,
}

impl<R: io::Read> CsvSource<R> {
    pub fn new(reader: R) -> Result<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let headers = csv_reader.headers()?.iter().map(str::to_string).collect();
        Ok(Self {
            headers,
            records: csv_reader.into_records(),
        })
    }
}

impl CsvSource<File> {
    pub fn open(path: &Path) -> Result<Self> {
        Self::new(File::open(path)?)
    }
}

impl<R: io::Read + Send> RecordSource for CsvSource<R> {
    fn next_record(&mut self) -> Result<Option<Record>> {
        match self.records.next() {
            None => Ok(None),
            Some(row) => {
                let row = row?;
                Ok(Some(Record::from_pairs(
                    self.headers.iter().map(String::as_str).zip(row.iter()),
                )))
            }
        }
    }
}

/// Provider of record sources, one per entity kind. `Ok(None)` means the
/// dataset is absent, which the loader tolerates with a warning.
pub trait RecordSources: Send + Sync {
    fn open(&self, entity: &str) -> Result<Option<Box<dyn RecordSource>>>;
}

/// The reference provider: `<base>/<entity>.csv` per entity kind.
pub struct CsvDirectory {
    base: PathBuf,
}

impl CsvDirectory {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

impl RecordSources for CsvDirectory {
    fn open(&self, entity: &str) -> Result<Option<Box<dyn RecordSource>>> {
        let path = self.base.join(format!("{entity}.csv"));
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(Box::new(CsvSource::open(&path)?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> Record {
        Record::from_pairs(pairs.iter().copied())
    }

    #[test]
    fn typed_accessors_parse_and_name_the_field_on_failure() {
        let row = record(&[("quantity", "3"), ("unit_price", "19.99"), ("order_date", "oops")]);
        assert_eq!(row.integer("quantity").unwrap(), 3);
        assert!((row.decimal("unit_price").unwrap() - 19.99).abs() < f64::EPSILON);

        let err = row.timestamp("order_date").unwrap_err();
        assert!(err.to_string().contains("order_date"));
        let err = row.integer("unit_price").unwrap_err();
        assert!(err.to_string().contains("unit_price"));
    }

    #[test]
    fn boolean_defaults_true_only_when_column_is_absent() {
        assert!(record(&[]).boolean_or_true("is_active"));
        assert!(record(&[("is_active", "TRUE")]).boolean_or_true("is_active"));
        assert!(!record(&[("is_active", "")]).boolean_or_true("is_active"));
        assert!(!record(&[("is_active", "false")]).boolean_or_true("is_active"));
    }

    #[test]
    fn optional_date_treats_empty_as_absent() {
        assert_eq!(record(&[]).optional_date("signup_date").unwrap(), None);
        assert_eq!(
            record(&[("signup_date", "")]).optional_date("signup_date").unwrap(),
            None
        );
        let parsed = record(&[("signup_date", "2024-03-05")])
            .optional_date("signup_date")
            .unwrap();
        assert_eq!(parsed.unwrap().to_string(), "2024-03-05");
        assert!(record(&[("signup_date", "03/05/2024")])
            .optional_date("signup_date")
            .is_err());
    }

    #[test]
    fn decimal_default_applies_only_when_column_is_missing() {
        assert_eq!(record(&[]).decimal_or("discount", 0.0).unwrap(), 0.0);
        assert_eq!(
            record(&[("discount", "2.50")]).decimal_or("discount", 0.0).unwrap(),
            2.5
        );
        assert!(record(&[("discount", "")]).decimal_or("discount", 0.0).is_err());
    }

    #[test]
    fn csv_source_yields_header_keyed_records() {
        let csv = "category_id,category_name\n1,Electronics\n2,Garden\n";
        let mut source = CsvSource::new(csv.as_bytes()).unwrap();

        let first = source.next_record().unwrap().unwrap();
        assert_eq!(first.integer("category_id").unwrap(), 1);
        assert_eq!(first.require("category_name").unwrap(), "Electronics");

        let second = source.next_record().unwrap().unwrap();
        assert_eq!(second.require("category_name").unwrap(), "Garden");
        assert!(source.next_record().unwrap().is_none());
    }

    #[test]
    fn csv_directory_reports_missing_file_as_none() {
        let sources = CsvDirectory::new("/nonexistent/base/dir");
        assert!(sources.open("categories").unwrap().is_none());
    }
}
