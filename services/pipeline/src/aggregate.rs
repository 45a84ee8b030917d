use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::ParseError;
use crate::record::Dataset;

/// Mean of one field for one continent. `mean` is `None` when every value
/// in the group was missing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupMean {
    pub continent: String,
    pub mean: Option<f64>,
    pub count: usize,
}

/// Mean of `field` per continent, highest first.
///
/// Missing and non-numeric values are skipped. Equal means keep
/// continent-name order and groups without any value come last. An unknown
/// `field` is still an error.
pub fn mean_by_continent(dataset: &Dataset, field: &str) -> Result<Vec<GroupMean>, ParseError> {
    let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for record in dataset.iter() {
        let Some(continent) = record.continent.as_deref() else {
            continue;
        };
        let entry = sums.entry(continent).or_insert((0.0, 0));
        let value = match record.number(field) {
            Ok(value) => value,
            Err(ParseError::InvalidNumber { .. }) => None,
            Err(err) => return Err(err),
        };
        if let Some(value) = value {
            entry.0 += value;
            entry.1 += 1;
        }
    }

    let mut means: Vec<GroupMean> = sums
        .into_iter()
        .map(|(continent, (sum, count))| GroupMean {
            continent: continent.to_string(),
            mean: (count > 0).then(|| sum / count as f64),
            count,
        })
        .collect();

    // sort_by is stable, so ties stay in continent order
    means.sort_by(|a, b| match (a.mean, b.mean) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    Ok(means)
}
