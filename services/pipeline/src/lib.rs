//! OWID COVID-19 pipeline
//!
//! Fetches the Our World in Data CSV, splits country rows from continent
//! rollups and derives the tables behind the charts and the dashboard:
//! - latest snapshot per location
//! - mean of a field per continent
//! - wide (date x group) comparison table
//! - monthly per-continent totals for stacking
//!
//! Every stage is a pure function of its input. An empty input is valid
//! everywhere and yields an empty output.

pub mod aggregate;
pub mod charts;
pub mod config;
pub mod error;
pub mod export;
pub mod fetch;
pub mod filter;
pub mod record;
pub mod render;
pub mod resample;
pub mod reshape;
pub mod snapshot;
pub mod summary;

pub use aggregate::{mean_by_continent, GroupMean};
pub use charts::{render_all, render_chart, ChartError, Stages};
pub use config::{ChartKind, RenderConfig, Settings};
pub use error::{ConfigError, FetchError, ParseError, RenderError};
pub use fetch::Fetcher;
pub use filter::{partition, prefilter, Partition};
pub use record::{Dataset, RawTable, Record};
pub use render::RenderOutcome;
pub use resample::monthly_totals;
pub use reshape::{pivot, DenseTable, SparseTable};
pub use snapshot::latest_by_location;
pub use summary::{ScatterPoint, Summary, TrendLine};
