use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};
use tracing::debug;

use crate::error::ParseError;
use crate::record::Dataset;
use crate::reshape::DenseTable;

/// Last calendar day of the month containing `date`; the bucket key.
pub fn month_end(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first| first.pred_opt())
        .unwrap_or(date)
}

/// Monthly totals of `value_field` per continent, for stacking.
///
/// Values are first summed per (continent, date) across countries, then per
/// (continent, month). Missing values count as zero. Every month between the
/// first and last observed one gets a row, zero-filled. Columns are the
/// continents in name order, or exactly `include` (in that order) when given.
pub fn monthly_totals<S: AsRef<str>>(
    entity_rows: &Dataset,
    value_field: &str,
    include: Option<&[S]>,
) -> Result<DenseTable, ParseError> {
    let wanted = |continent: &str| {
        include.map_or(true, |names| names.iter().any(|n| n.as_ref() == continent))
    };

    let mut daily: BTreeMap<(&str, NaiveDate), f64> = BTreeMap::new();
    for record in entity_rows.iter() {
        let Some(continent) = record.continent.as_deref() else {
            continue;
        };
        if !wanted(continent) {
            continue;
        }
        let value = record.number(value_field)?.unwrap_or(0.0);
        *daily.entry((continent, record.date)).or_insert(0.0) += value;
    }

    let columns: Vec<String> = match include {
        Some(names) => names.iter().map(|n| n.as_ref().to_string()).collect(),
        None => daily
            .keys()
            .map(|(continent, _)| *continent)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect(),
    };
    let mut table = DenseTable::new(columns);

    let (Some(first), Some(last)) = (
        daily.keys().map(|(_, date)| *date).min(),
        daily.keys().map(|(_, date)| *date).max(),
    ) else {
        return Ok(table);
    };

    let last_bucket = month_end(last);
    let mut bucket = month_end(first);
    loop {
        table.row_mut(bucket, 0.0);
        if bucket >= last_bucket {
            break;
        }
        match bucket.succ_opt() {
            Some(next) => bucket = month_end(next),
            None => break,
        }
    }

    for ((continent, date), value) in daily {
        if let Some(idx) = table.column_index(continent) {
            table.row_mut(month_end(date), 0.0)[idx] += value;
        }
    }

    debug!(
        months = table.len(),
        continents = table.columns().len(),
        "resampled monthly totals"
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::fixtures::dataset;

    const FIELD: &str = "new_cases_smoothed";

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    const SAMPLE: &str = "\
continent,location,date,new_cases_smoothed
Europe,France,2021-01-05,10
Europe,Spain,2021-01-05,5
Europe,France,2021-01-20,1
Asia,India,2021-01-31,7
Asia,India,2021-03-02,3
Europe,France,2021-03-15,
";

    #[test]
    fn test_month_end_keys() {
        assert_eq!(month_end(ymd(2021, 1, 5)), ymd(2021, 1, 31));
        assert_eq!(month_end(ymd(2020, 2, 1)), ymd(2020, 2, 29));
        assert_eq!(month_end(ymd(2021, 2, 28)), ymd(2021, 2, 28));
        assert_eq!(month_end(ymd(2021, 12, 31)), ymd(2021, 12, 31));
    }

    #[test]
    fn test_monthly_sums_per_continent() {
        let table = monthly_totals::<&str>(&dataset(SAMPLE), FIELD, None).unwrap();
        assert_eq!(table.columns(), &["Asia".to_string(), "Europe".to_string()]);
        assert_eq!(table.get(ymd(2021, 1, 31), "Europe"), Some(&16.0));
        assert_eq!(table.get(ymd(2021, 1, 31), "Asia"), Some(&7.0));
        assert_eq!(table.get(ymd(2021, 3, 31), "Asia"), Some(&3.0));
        assert_eq!(table.get(ymd(2021, 3, 31), "Europe"), Some(&0.0));
    }

    #[test]
    fn test_gap_month_zero_filled() {
        let table = monthly_totals::<&str>(&dataset(SAMPLE), FIELD, None).unwrap();
        assert_eq!(
            table.dates().collect::<Vec<_>>(),
            vec![ymd(2021, 1, 31), ymd(2021, 2, 28), ymd(2021, 3, 31)]
        );
        assert_eq!(table.get(ymd(2021, 2, 28), "Asia"), Some(&0.0));
        assert_eq!(table.get(ymd(2021, 2, 28), "Europe"), Some(&0.0));
    }

    #[test]
    fn test_totals_conserved() {
        let ds = dataset(SAMPLE);
        let table = monthly_totals::<&str>(&ds, FIELD, None).unwrap();
        for continent in ["Asia", "Europe"] {
            let daily: f64 = ds
                .iter()
                .filter(|r| r.continent.as_deref() == Some(continent))
                .map(|r| r.number(FIELD).unwrap().unwrap_or(0.0))
                .sum();
            assert_eq!(table.column_total(continent), Some(daily));
        }
    }

    #[test]
    fn test_include_list_order_and_unseen() {
        let table =
            monthly_totals(&dataset(SAMPLE), FIELD, Some(&["Europe", "Africa"][..])).unwrap();
        assert_eq!(table.columns(), &["Europe".to_string(), "Africa".to_string()]);
        assert_eq!(table.column_total("Africa"), Some(0.0));
        assert_eq!(table.column_total("Europe"), Some(16.0));
        // Asia is not read, so the range ends in March only because of France
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_max_row_total() {
        let table = monthly_totals::<&str>(&dataset(SAMPLE), FIELD, None).unwrap();
        assert_eq!(table.max_row_total(), 23.0);
    }

    #[test]
    fn test_empty_input_is_empty_table() {
        let table = monthly_totals::<&str>(&Dataset::default(), FIELD, None).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.len(), 0);
    }
}
