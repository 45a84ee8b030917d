//! Wires the stages to the four charts. A parse failure in one chart's
//! inputs only costs that chart.

use thiserror::Error;
use tracing::{debug, info};

use crate::aggregate::{mean_by_continent, GroupMean};
use crate::config::{ChartKind, RenderConfig};
use crate::error::{ParseError, RenderError};
use crate::filter::{partition, Partition};
use crate::record::{
    Dataset, RawTable, FULLY_VACCINATED_PER_HUNDRED, NEW_CASES_SMOOTHED,
    TOTAL_DEATHS_PER_MILLION,
};
use crate::render::{self, RenderOutcome};
use crate::resample::monthly_totals;
use crate::reshape::{pivot, DenseTable, SparseTable};
use crate::snapshot::latest_by_location;
use crate::summary::{scatter_points, ScatterPoint, TrendLine};

#[derive(Debug, Error)]
pub enum ChartError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Partitioned rows and the latest-snapshot table, shared by every chart.
#[derive(Debug, Clone, Default)]
pub struct Stages {
    pub partition: Partition,
    pub latest: Dataset,
}

impl Stages {
    pub fn prepare(raw: &RawTable, config: &RenderConfig) -> Result<Self, ParseError> {
        let partition = partition(raw, &config.aggregate_locations)?;
        let latest = latest_by_location(&partition.entity_rows);
        info!(
            countries = partition.entity_rows.len(),
            rollups = partition.aggregate_rows.len(),
            latest = latest.len(),
            "stages prepared"
        );
        Ok(Self { partition, latest })
    }

    pub fn deaths_by_continent(&self) -> Result<Vec<GroupMean>, ParseError> {
        mean_by_continent(&self.latest, TOTAL_DEATHS_PER_MILLION)
    }

    pub fn cases_comparison(&self, groups: &[String]) -> Result<SparseTable, ParseError> {
        pivot(&self.partition.aggregate_rows, groups, NEW_CASES_SMOOTHED)
    }

    pub fn vaccination_scatter(&self) -> Result<Vec<ScatterPoint>, ParseError> {
        scatter_points(
            &self.latest,
            FULLY_VACCINATED_PER_HUNDRED,
            TOTAL_DEATHS_PER_MILLION,
            None,
        )
    }

    pub fn case_progression(&self, include: Option<&[String]>) -> Result<DenseTable, ParseError> {
        monthly_totals(&self.partition.entity_rows, NEW_CASES_SMOOTHED, include)
    }
}

pub fn render_chart(
    kind: ChartKind,
    stages: &Stages,
    config: &RenderConfig,
) -> Result<RenderOutcome, ChartError> {
    let settings = config.chart(kind);
    let outcome = match kind {
        ChartKind::DeathsByContinent => {
            render::bar_chart(&stages.deaths_by_continent()?, &settings)?
        }
        ChartKind::CasesComparison => {
            render::line_chart(&stages.cases_comparison(&config.line_groups)?, &settings)?
        }
        ChartKind::VaccinationScatter => {
            let points = stages.vaccination_scatter()?;
            render::scatter_chart(&points, TrendLine::fit(&points), &settings)?
        }
        ChartKind::CaseProgression => {
            let table = stages.case_progression(config.stack_groups.as_deref())?;
            for continent in table.columns() {
                debug!(continent = %continent, total = ?table.column_total(continent), "monthly cases");
            }
            render::stacked_area_chart(&table, &settings)?
        }
    };
    Ok(outcome)
}

/// Renders every chart; one failure does not stop the others.
pub fn render_all(
    stages: &Stages,
    config: &RenderConfig,
) -> Vec<(ChartKind, Result<RenderOutcome, ChartError>)> {
    ChartKind::ALL
        .iter()
        .map(|&kind| (kind, render_chart(kind, stages, config)))
        .collect()
}
