//! Long (date, group, value) rows to wide tables: one row per date, one
//! column per group.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::error::ParseError;
use crate::record::Dataset;

#[derive(Debug, Clone, PartialEq)]
pub struct WideTable<V> {
    columns: Vec<String>,
    rows: BTreeMap<NaiveDate, Vec<V>>,
}

/// Cells without a source row stay `None`.
pub type SparseTable = WideTable<Option<f64>>;
/// Cells without a source row are zero.
pub type DenseTable = WideTable<f64>;

impl<V: Clone> WideTable<V> {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: BTreeMap::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Rows in ascending date order.
    pub fn rows(&self) -> impl Iterator<Item = (NaiveDate, &[V])> + '_ {
        self.rows.iter().map(|(date, values)| (*date, values.as_slice()))
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.rows.keys().copied()
    }

    pub fn get(&self, date: NaiveDate, column: &str) -> Option<&V> {
        let idx = self.column_index(column)?;
        self.rows.get(&date).map(|values| &values[idx])
    }

    /// One column as (date, value) pairs, `None` if the column is unknown.
    pub fn series(&self, column: &str) -> Option<Vec<(NaiveDate, V)>> {
        let idx = self.column_index(column)?;
        Some(
            self.rows
                .iter()
                .map(|(date, values)| (*date, values[idx].clone()))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub(crate) fn row_mut(&mut self, date: NaiveDate, fill: V) -> &mut Vec<V> {
        let width = self.columns.len();
        self.rows.entry(date).or_insert_with(|| vec![fill; width])
    }
}

impl SparseTable {
    /// Present cells back as (date, group, value) triples.
    pub fn flatten(&self) -> Vec<(NaiveDate, String, f64)> {
        self.rows
            .iter()
            .flat_map(|(date, values)| {
                values.iter().zip(&self.columns).filter_map(move |(value, group)| {
                    value.map(|v| (*date, group.clone(), v))
                })
            })
            .collect()
    }
}

impl DenseTable {
    pub fn column_total(&self, column: &str) -> Option<f64> {
        let idx = self.column_index(column)?;
        Some(self.rows.values().map(|values| values[idx]).sum())
    }

    /// Largest per-row sum across all columns; the height of a stacked chart.
    pub fn max_row_total(&self) -> f64 {
        self.rows
            .values()
            .map(|values| values.iter().sum::<f64>())
            .fold(0.0, f64::max)
    }
}

/// Pivots `rows` (location acting as group) into a sparse wide table with
/// one column per name in `groups`.
///
/// Only rows whose location is in `groups` are read. A group that never
/// appears gets an all-`None` column. Two rows for the same (date, group)
/// are rejected.
pub fn pivot<S: AsRef<str>>(
    rows: &Dataset,
    groups: &[S],
    value_field: &str,
) -> Result<SparseTable, ParseError> {
    let columns: Vec<String> = groups.iter().map(|g| g.as_ref().to_string()).collect();
    let mut table = SparseTable::new(columns);
    let mut seen: BTreeMap<(NaiveDate, usize), u64> = BTreeMap::new();

    for record in rows.iter() {
        let Some(idx) = table.column_index(&record.location) else {
            continue;
        };
        match seen.entry((record.date, idx)) {
            Entry::Occupied(_) => {
                return Err(ParseError::DuplicateEntry {
                    line: record.line(),
                    date: record.date,
                    group: record.location.clone(),
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(record.line());
            }
        }
        let value = record.number(value_field)?;
        table.row_mut(record.date, None)[idx] = value;
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::fixtures::dataset;

    const GROUPS: &[&str] = &["Europe", "Asia"];

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 1, d).unwrap()
    }

    #[test]
    fn test_pivot_one_row_per_date() {
        let ds = dataset(
            "continent,location,date,new_cases_smoothed\n\
             ,Europe,2021-01-02,20\n\
             ,Asia,2021-01-01,5\n\
             ,Europe,2021-01-01,10\n\
             ,Asia,2021-01-02,6\n",
        );
        let wide = pivot(&ds, GROUPS, "new_cases_smoothed").unwrap();
        assert_eq!(wide.columns(), &["Europe".to_string(), "Asia".to_string()]);
        assert_eq!(wide.len(), 2);
        assert_eq!(wide.get(day(1), "Europe"), Some(&Some(10.0)));
        assert_eq!(wide.get(day(2), "Asia"), Some(&Some(6.0)));
        assert_eq!(wide.dates().collect::<Vec<_>>(), vec![day(1), day(2)]);
    }

    #[test]
    fn test_absent_group_is_missing_column() {
        let ds = dataset(
            "continent,location,date,new_cases_smoothed\n\
             ,Europe,2021-01-01,100\n\
             ,Europe,2021-01-02,200\n",
        );
        let wide = pivot(&ds, GROUPS, "new_cases_smoothed").unwrap();
        assert_eq!(
            wide.series("Asia").unwrap(),
            vec![(day(1), None), (day(2), None)]
        );
        assert_eq!(
            wide.series("Europe").unwrap(),
            vec![(day(1), Some(100.0)), (day(2), Some(200.0))]
        );
    }

    #[test]
    fn test_missing_pair_is_none_not_zero() {
        let ds = dataset(
            "continent,location,date,new_cases_smoothed\n\
             ,Europe,2021-01-01,1\n\
             ,Asia,2021-01-02,2\n",
        );
        let wide = pivot(&ds, GROUPS, "new_cases_smoothed").unwrap();
        assert_eq!(wide.get(day(1), "Asia"), Some(&None));
        assert_eq!(wide.get(day(2), "Europe"), Some(&None));
    }

    #[test]
    fn test_round_trip_recovers_triples() {
        let ds = dataset(
            "continent,location,date,new_cases_smoothed\n\
             ,Asia,2021-01-01,1.5\n\
             ,Europe,2021-01-01,2.5\n\
             ,Asia,2021-01-02,3.5\n\
             ,Europe,2021-01-02,4.5\n",
        );
        let wide = pivot(&ds, GROUPS, "new_cases_smoothed").unwrap();
        let mut flat = wide.flatten();
        let mut original: Vec<_> = ds
            .iter()
            .map(|r| {
                (
                    r.date,
                    r.location.clone(),
                    r.number("new_cases_smoothed").unwrap().unwrap(),
                )
            })
            .collect();
        let key = |t: &(NaiveDate, String, f64)| (t.0, t.1.clone());
        flat.sort_by_key(key);
        original.sort_by_key(key);
        assert_eq!(flat, original);
    }

    #[test]
    fn test_duplicate_pair_rejected() {
        let ds = dataset(
            "continent,location,date,new_cases_smoothed\n\
             ,Asia,2021-01-01,1\n\
             ,Asia,2021-01-01,2\n",
        );
        assert_eq!(
            pivot(&ds, GROUPS, "new_cases_smoothed").unwrap_err(),
            ParseError::DuplicateEntry {
                line: 3,
                date: day(1),
                group: "Asia".to_string(),
            }
        );
    }

    #[test]
    fn test_other_locations_ignored() {
        let ds = dataset(
            "continent,location,date,new_cases_smoothed\n\
             ,World,2021-01-01,1\n",
        );
        let wide = pivot(&ds, GROUPS, "new_cases_smoothed").unwrap();
        assert!(wide.is_empty());
    }

    #[test]
    fn test_empty_input() {
        let wide = pivot(&Dataset::default(), GROUPS, "new_cases_smoothed").unwrap();
        assert!(wide.is_empty());
        assert_eq!(wide.columns().len(), 2);
    }
}
