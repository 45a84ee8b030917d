use std::collections::BTreeMap;
use std::sync::Arc;

use crate::record::Dataset;

/// Latest row per `location`, ordered by location.
///
/// When several rows share the maximum date the first one in input order is
/// kept, so the result is deterministic for a given input order.
pub fn latest_by_location(dataset: &Dataset) -> Dataset {
    let mut latest: BTreeMap<&str, usize> = BTreeMap::new();
    for (idx, record) in dataset.iter().enumerate() {
        latest
            .entry(record.location.as_str())
            .and_modify(|best| {
                if record.date > dataset.records()[*best].date {
                    *best = idx;
                }
            })
            .or_insert(idx);
    }

    let records = latest
        .into_values()
        .map(|idx| dataset.records()[idx].clone())
        .collect();
    Dataset::new(Arc::clone(dataset.header()), records)
}
