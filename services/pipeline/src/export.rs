use std::io::Write;

use crate::record::Dataset;

/// Writes `dataset` as CSV with the source header and each row's original
/// field text. An empty dataset without a header writes nothing.
pub fn write_csv<W: Write>(dataset: &Dataset, writer: W) -> Result<(), csv::Error> {
    let names = dataset.header().names();
    if names.is_empty() {
        return Ok(());
    }

    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(names)?;
    for record in dataset.iter() {
        writer.write_record(record.fields())?;
    }
    writer.flush()?;
    Ok(())
}

pub fn to_csv_string(dataset: &Dataset) -> Result<String, csv::Error> {
    let mut buf = Vec::new();
    write_csv(dataset, &mut buf)?;
    // fields came from valid UTF-8 records
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::prefilter;
    use crate::record::fixtures::{dataset, raw};
    use crate::record::RawTable;

    const SOURCE: &str = "\
iso_code,continent,location,date,total_cases,tests_units
FRA,Europe,France,2021-01-01,100,\"tests performed\"
IND,Asia,India,2021-01-01,200,
FRA,Europe,France,2021-01-02,150,\"tests performed\"
";

    #[test]
    fn test_export_keeps_header() {
        let ds = dataset(SOURCE);
        let out = to_csv_string(&ds).unwrap();
        assert_eq!(
            out.lines().next(),
            Some("iso_code,continent,location,date,total_cases,tests_units")
        );
    }

    #[test]
    fn test_export_row_subset_round_trips() {
        let ds = dataset(SOURCE);
        let europe = prefilter(&ds, None, None, Some("Europe"));
        let out = to_csv_string(&europe).unwrap();

        let back = raw(&out);
        assert_eq!(back.header().names(), ds.header().names());
        assert_eq!(back.len(), 2);
        assert_eq!(back.rows()[1].get(4), Some("150"));
        assert_eq!(back.rows()[0].get(5), Some("tests performed"));
    }

    #[test]
    fn test_export_empty() {
        let ds = Dataset::from_raw(&RawTable::empty()).unwrap();
        assert_eq!(to_csv_string(&ds).unwrap(), "");
    }
}
