//! Headline metrics, daily totals and scatter extraction used by the
//! dashboard and the scatter chart.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::ParseError;
use crate::record::{Dataset, TOTAL_CASES, TOTAL_DEATHS};
use crate::reshape::DenseTable;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub countries: usize,
    pub total_cases: f64,
    pub total_deaths: f64,
    /// Deaths per hundred cases; zero when there are no cases.
    pub fatality_rate_pct: f64,
}

impl Summary {
    /// Computed over latest-snapshot rows.
    pub fn from_latest(latest: &Dataset) -> Result<Self, ParseError> {
        let countries = latest
            .iter()
            .map(|r| r.location.as_str())
            .collect::<BTreeSet<_>>()
            .len();
        let mut total_cases = 0.0;
        let mut total_deaths = 0.0;
        for record in latest.iter() {
            total_cases += record.number(TOTAL_CASES)?.unwrap_or(0.0);
            total_deaths += record.number(TOTAL_DEATHS)?.unwrap_or(0.0);
        }
        let fatality_rate_pct = if total_cases > 0.0 {
            total_deaths / total_cases * 100.0
        } else {
            0.0
        };

        Ok(Self {
            countries,
            total_cases,
            total_deaths,
            fatality_rate_pct,
        })
    }
}

/// Sum of each of `fields` per date, ascending. Missing values count as zero.
pub fn daily_totals(rows: &Dataset, fields: &[&str]) -> Result<DenseTable, ParseError> {
    let mut table = DenseTable::new(fields.iter().map(|f| f.to_string()).collect());
    for record in rows.iter() {
        let mut values = Vec::with_capacity(fields.len());
        for field in fields {
            values.push(record.number(field)?.unwrap_or(0.0));
        }
        let row = table.row_mut(record.date, 0.0);
        for (cell, value) in row.iter_mut().zip(values) {
            *cell += value;
        }
    }
    Ok(table)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub location: String,
    pub continent: Option<String>,
    pub x: f64,
    pub y: f64,
    pub size: Option<f64>,
}

/// Points for rows where both `x_field` and `y_field` are present.
pub fn scatter_points(
    rows: &Dataset,
    x_field: &str,
    y_field: &str,
    size_field: Option<&str>,
) -> Result<Vec<ScatterPoint>, ParseError> {
    let mut points = Vec::new();
    for record in rows.iter() {
        let (Some(x), Some(y)) = (record.number(x_field)?, record.number(y_field)?) else {
            continue;
        };
        let size = match size_field {
            Some(field) => record.number(field)?,
            None => None,
        };
        points.push(ScatterPoint {
            location: record.location.clone(),
            continent: record.continent.clone(),
            x,
            y,
            size,
        });
    }
    Ok(points)
}

/// `y = slope * x + intercept`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendLine {
    pub slope: f64,
    pub intercept: f64,
}

impl TrendLine {
    /// Least-squares fit. Needs at least two points with distinct x.
    pub fn fit(points: &[ScatterPoint]) -> Option<Self> {
        if points.len() < 2 {
            return None;
        }
        let n = points.len() as f64;
        let mean_x = points.iter().map(|p| p.x).sum::<f64>() / n;
        let mean_y = points.iter().map(|p| p.y).sum::<f64>() / n;
        let sxx: f64 = points.iter().map(|p| (p.x - mean_x).powi(2)).sum();
        if sxx == 0.0 {
            return None;
        }
        let sxy: f64 = points
            .iter()
            .map(|p| (p.x - mean_x) * (p.y - mean_y))
            .sum();
        let slope = sxy / sxx;
        Some(Self {
            slope,
            intercept: mean_y - slope * mean_x,
        })
    }

    pub fn at(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::fixtures::dataset;
    use chrono::NaiveDate;

    fn point(x: f64, y: f64) -> ScatterPoint {
        ScatterPoint {
            location: String::new(),
            continent: None,
            x,
            y,
            size: None,
        }
    }

    // -------------------------------------------------------------------------
    // SUMMARY
    // -------------------------------------------------------------------------

    #[test]
    fn test_summary_totals_and_rate() {
        let ds = dataset(
            "continent,location,date,total_cases,total_deaths\n\
             Europe,France,2021-01-01,1000,20\n\
             Asia,India,2021-01-01,3000,\n",
        );
        let summary = Summary::from_latest(&ds).unwrap();
        assert_eq!(summary.countries, 2);
        assert_eq!(summary.total_cases, 4000.0);
        assert_eq!(summary.total_deaths, 20.0);
        assert!((summary.fatality_rate_pct - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_summary_zero_cases() {
        let ds = dataset(
            "continent,location,date,total_cases,total_deaths\n\
             Oceania,Fiji,2021-01-01,,\n",
        );
        let summary = Summary::from_latest(&ds).unwrap();
        assert_eq!(summary.fatality_rate_pct, 0.0);
    }

    #[test]
    fn test_summary_empty() {
        let summary = Summary::from_latest(&Dataset::default()).unwrap();
        assert_eq!(summary.countries, 0);
        assert_eq!(summary.total_cases, 0.0);
    }

    // -------------------------------------------------------------------------
    // DAILY TOTALS
    // -------------------------------------------------------------------------

    #[test]
    fn test_daily_totals_sum_across_countries() {
        let ds = dataset(
            "continent,location,date,new_cases_smoothed,new_deaths_smoothed\n\
             Europe,France,2021-01-02,10,1\n\
             Asia,India,2021-01-02,20,\n\
             Asia,India,2021-01-01,5,2\n",
        );
        let table =
            daily_totals(&ds, &["new_cases_smoothed", "new_deaths_smoothed"]).unwrap();
        let jan = |d| NaiveDate::from_ymd_opt(2021, 1, d).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(jan(2), "new_cases_smoothed"), Some(&30.0));
        assert_eq!(table.get(jan(2), "new_deaths_smoothed"), Some(&1.0));
        assert_eq!(table.get(jan(1), "new_deaths_smoothed"), Some(&2.0));
    }

    // -------------------------------------------------------------------------
    // SCATTER
    // -------------------------------------------------------------------------

    #[test]
    fn test_scatter_drops_incomplete_rows() {
        let ds = dataset(
            "continent,location,date,people_fully_vaccinated_per_hundred,total_deaths_per_million,population\n\
             Europe,France,2021-01-01,70,1500,67000000\n\
             Asia,India,2021-01-01,,300,1400000000\n\
             Africa,Kenya,2021-01-01,10,,54000000\n",
        );
        let points = scatter_points(
            &ds,
            "people_fully_vaccinated_per_hundred",
            "total_deaths_per_million",
            Some("population"),
        )
        .unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].location, "France");
        assert_eq!(points[0].size, Some(67_000_000.0));
    }

    #[test]
    fn test_trend_line_exact_fit() {
        let points = vec![point(0.0, 1.0), point(1.0, 3.0), point(2.0, 5.0)];
        let line = TrendLine::fit(&points).unwrap();
        assert!((line.slope - 2.0).abs() < 1e-12);
        assert!((line.intercept - 1.0).abs() < 1e-12);
        assert!((line.at(10.0) - 21.0).abs() < 1e-9);
    }

    #[test]
    fn test_trend_line_needs_spread() {
        assert_eq!(TrendLine::fit(&[point(1.0, 1.0)]), None);
        assert_eq!(TrendLine::fit(&[point(1.0, 1.0), point(1.0, 2.0)]), None);
    }
}
