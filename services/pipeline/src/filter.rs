//! Splits a dataset into country rows and continent rollup rows, plus the
//! date-range / continent pre-pass used by the dashboard.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use tracing::debug;

use crate::error::ParseError;
use crate::record::{Dataset, RawTable, Record};

pub const DEFAULT_AGGREGATE_LOCATIONS: &[&str] = &["Europe", "Asia"];

#[derive(Debug, Clone, Default)]
pub struct Partition {
    /// Rows with a continent: actual countries.
    pub entity_rows: Dataset,
    /// Rows without a continent whose location is allow-listed.
    pub aggregate_rows: Dataset,
    /// Rows without a continent that are not allow-listed ("World", income groups, ...).
    pub excluded_rows: Dataset,
}

/// Types `raw` and splits it. An unparseable date anywhere fails the stage.
pub fn partition<S: AsRef<str>>(
    raw: &RawTable,
    aggregate_locations: &[S],
) -> Result<Partition, ParseError> {
    let dataset = Dataset::from_raw(raw)?;
    Ok(split(&dataset, aggregate_locations))
}

pub fn split<S: AsRef<str>>(dataset: &Dataset, aggregate_locations: &[S]) -> Partition {
    let allowed = |r: &Record| {
        aggregate_locations
            .iter()
            .any(|name| name.as_ref() == r.location)
    };

    let partition = Partition {
        entity_rows: dataset.retain(|r| r.continent.is_some()),
        aggregate_rows: dataset.retain(|r| r.continent.is_none() && allowed(r)),
        excluded_rows: dataset.retain(|r| r.continent.is_none() && !allowed(r)),
    };
    debug!(
        entity = partition.entity_rows.len(),
        aggregate = partition.aggregate_rows.len(),
        excluded = partition.excluded_rows.len(),
        "partitioned dataset"
    );
    partition
}

/// Dashboard pre-pass: keeps rows in `[start, end]` (either bound optional)
/// and, unless `continent` is `None` or "All", rows of that continent only.
pub fn prefilter(
    dataset: &Dataset,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    continent: Option<&str>,
) -> Dataset {
    let continent = continent.filter(|c| !c.eq_ignore_ascii_case("all"));
    dataset.retain(|r| {
        start.map_or(true, |s| r.date >= s)
            && end.map_or(true, |e| r.date <= e)
            && continent.map_or(true, |c| r.continent.as_deref() == Some(c))
    })
}

/// Earliest and latest date, `None` when empty.
pub fn date_range(dataset: &Dataset) -> Option<(NaiveDate, NaiveDate)> {
    let min = dataset.iter().map(|r| r.date).min()?;
    let max = dataset.iter().map(|r| r.date).max()?;
    Some((min, max))
}

/// Distinct continents, sorted.
pub fn continents(dataset: &Dataset) -> Vec<String> {
    dataset
        .iter()
        .filter_map(|r| r.continent.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
