//! Row model: the untyped table produced by the fetcher and the typed
//! records every later stage works on.

use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use chrono::NaiveDate;
use csv::StringRecord;

use crate::error::ParseError;

pub const DATE: &str = "date";
pub const LOCATION: &str = "location";
pub const CONTINENT: &str = "continent";

pub const TOTAL_DEATHS_PER_MILLION: &str = "total_deaths_per_million";
pub const TOTAL_CASES_PER_MILLION: &str = "total_cases_per_million";
pub const NEW_CASES_SMOOTHED: &str = "new_cases_smoothed";
pub const NEW_DEATHS_SMOOTHED: &str = "new_deaths_smoothed";
pub const FULLY_VACCINATED_PER_HUNDRED: &str = "people_fully_vaccinated_per_hundred";
pub const GDP_PER_CAPITA: &str = "gdp_per_capita";
pub const POPULATION: &str = "population";
pub const TOTAL_CASES: &str = "total_cases";
pub const TOTAL_DEATHS: &str = "total_deaths";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Column names of the source CSV, shared by every row.
#[derive(Debug, Default, PartialEq)]
pub struct Header {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl Header {
    pub fn new(names: Vec<String>) -> Self {
        let index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self { names, index }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    fn require(&self, name: &str) -> Result<usize, ParseError> {
        self.position(name)
            .ok_or_else(|| ParseError::MissingColumn(name.to_string()))
    }
}

/// Rows exactly as read from the CSV, in source order.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    header: Arc<Header>,
    rows: Vec<StringRecord>,
}

impl RawTable {
    /// The degenerate table returned when fetching fails.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(reader);

        let names = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        let rows = reader.records().collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            header: Arc::new(Header::new(names)),
            rows,
        })
    }

    pub fn header(&self) -> &Arc<Header> {
        &self.header
    }

    pub fn rows(&self) -> &[StringRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A typed row. The raw fields are kept so any numeric column can be read
/// on demand and the row can be written back out unchanged.
#[derive(Debug, Clone)]
pub struct Record {
    pub date: NaiveDate,
    pub location: String,
    pub continent: Option<String>,
    line: u64,
    fields: StringRecord,
    header: Arc<Header>,
}

impl Record {
    /// Source line (1-based, header is line 1).
    pub fn line(&self) -> u64 {
        self.line
    }

    pub fn fields(&self) -> &StringRecord {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.header
            .position(name)
            .and_then(|idx| self.fields.get(idx))
    }

    /// Numeric value of `name`. Empty cells and `NaN` are missing; infinities
    /// and text are `InvalidNumber`.
    pub fn number(&self, name: &str) -> Result<Option<f64>, ParseError> {
        let idx = self.header.require(name)?;
        let raw = self.fields.get(idx).unwrap_or("").trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
            return Ok(None);
        }
        match raw.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(Some(value)),
            _ => Err(ParseError::InvalidNumber {
                line: self.line,
                column: name.to_string(),
                value: raw.to_string(),
            }),
        }
    }
}

/// Typed rows in source order.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    header: Arc<Header>,
    records: Vec<Record>,
}

impl Dataset {
    pub fn new(header: Arc<Header>, records: Vec<Record>) -> Self {
        Self { header, records }
    }

    /// Types every row of `raw`. Fails on the first unparseable date; an
    /// empty table types to an empty dataset without checking columns.
    pub fn from_raw(raw: &RawTable) -> Result<Self, ParseError> {
        let header = Arc::clone(raw.header());
        if raw.is_empty() {
            return Ok(Self::new(header, Vec::new()));
        }

        let date_idx = header.require(DATE)?;
        let location_idx = header.require(LOCATION)?;
        let continent_idx = header.require(CONTINENT)?;

        let mut records = Vec::with_capacity(raw.len());
        for (i, row) in raw.rows().iter().enumerate() {
            let line = row
                .position()
                .map(|p| p.line())
                .unwrap_or(i as u64 + 2);
            let raw_date = row.get(date_idx).unwrap_or("").trim();
            let date = NaiveDate::parse_from_str(raw_date, DATE_FORMAT).map_err(|_| {
                ParseError::InvalidDate {
                    line,
                    value: raw_date.to_string(),
                }
            })?;
            let continent = row
                .get(continent_idx)
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string);

            records.push(Record {
                date,
                location: row.get(location_idx).unwrap_or("").trim().to_string(),
                continent,
                line,
                fields: row.clone(),
                header: Arc::clone(&header),
            });
        }

        Ok(Self::new(header, records))
    }

    pub fn header(&self) -> &Arc<Header> {
        &self.header
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rows matching `keep`, same header.
    pub fn retain<F>(&self, mut keep: F) -> Dataset
    where
        F: FnMut(&Record) -> bool,
    {
        let records = self.records.iter().filter(|r| keep(r)).cloned().collect();
        Dataset::new(Arc::clone(&self.header), records)
    }
}
