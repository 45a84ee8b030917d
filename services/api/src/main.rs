//! API Service - Dashboard backend for the OWID COVID-19 dataset
//!
//! Endpoints:
//! - GET /health - Health check
//! - GET /filters - Continents and date range available
//! - GET /overview - Summary metrics and deaths per million by continent
//! - GET /timeseries - Daily new cases / deaths (smoothed)
//! - GET /scatter - GDP per capita vs cases per million
//! - GET /data - Filtered country rows as JSON
//! - GET /data.csv - Filtered country rows as a CSV download
//!
//! Every data endpoint accepts `start`, `end` and `continent` ("All" or a
//! continent name).

use anyhow::Context;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use pipeline::config::Settings;
use pipeline::export::to_csv_string;
use pipeline::fetch::{load_file_or_empty, Fetcher};
use pipeline::filter::{continents, date_range, partition, prefilter, DEFAULT_AGGREGATE_LOCATIONS};
use pipeline::record::{
    GDP_PER_CAPITA, NEW_CASES_SMOOTHED, NEW_DEATHS_SMOOTHED, POPULATION, TOTAL_CASES_PER_MILLION,
    TOTAL_DEATHS_PER_MILLION,
};
use pipeline::summary::{daily_totals, scatter_points};
use pipeline::{
    latest_by_location, mean_by_continent, Dataset, GroupMean, Record, ScatterPoint, Summary,
    TrendLine,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CSV_FILE_NAME: &str = "covid_data_filtered.csv";
const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 1000;

// ============================================================================
// State
// ============================================================================

struct AppState {
    /// Country rows only; rollups are not served.
    entity_rows: Dataset,
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    version: &'static str,
    rows: usize,
}

#[derive(Serialize)]
struct FiltersResponse {
    continents: Vec<String>,
    min_date: Option<NaiveDate>,
    max_date: Option<NaiveDate>,
}

#[derive(Serialize)]
struct OverviewResponse {
    summary: Summary,
    deaths_per_million_by_continent: Vec<GroupMean>,
}

#[derive(Serialize)]
struct TimeseriesPoint {
    date: NaiveDate,
    new_cases_smoothed: f64,
    new_deaths_smoothed: f64,
}

#[derive(Serialize)]
struct ScatterResponse {
    points: Vec<ScatterPoint>,
    trend: Option<TrendLine>,
}

#[derive(Serialize)]
struct DataResponse {
    total: usize,
    rows: Vec<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, error: impl ToString) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

// ============================================================================
// Query params
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct FilterQuery {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    continent: Option<String>,
    limit: Option<usize>,
}

/// Country rows matching the query, or the error response to send.
fn filtered(
    state: &AppState,
    params: Result<Query<FilterQuery>, QueryRejection>,
) -> Result<(Dataset, FilterQuery), Response> {
    let Query(params) =
        params.map_err(|e| error_response(StatusCode::BAD_REQUEST, e.body_text()))?;
    if state.entity_rows.is_empty() {
        return Err(error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "no data loaded",
        ));
    }
    if let (Some(start), Some(end)) = (params.start, params.end) {
        if start > end {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                "start must not be after end",
            ));
        }
    }
    let rows = prefilter(
        &state.entity_rows,
        params.start,
        params.end,
        params.continent.as_deref(),
    );
    Ok((rows, params))
}

/// A row as a JSON object keyed by column name, raw field text as values.
fn row_object(record: &Record, names: &[String]) -> serde_json::Map<String, serde_json::Value> {
    names
        .iter()
        .map(|name| {
            let value = record.field(name).unwrap_or_default();
            (name.clone(), serde_json::Value::String(value.to_string()))
        })
        .collect()
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
        rows: state.entity_rows.len(),
    })
}

async fn filters_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.entity_rows.is_empty() {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "no data loaded");
    }
    let range = date_range(&state.entity_rows);
    Json(FiltersResponse {
        continents: continents(&state.entity_rows),
        min_date: range.map(|(min, _)| min),
        max_date: range.map(|(_, max)| max),
    })
    .into_response()
}

async fn overview_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<FilterQuery>, QueryRejection>,
) -> impl IntoResponse {
    let (rows, _) = match filtered(&state, params) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let latest = latest_by_location(&rows);

    let result = Summary::from_latest(&latest).and_then(|summary| {
        let means = mean_by_continent(&latest, TOTAL_DEATHS_PER_MILLION)?;
        Ok(OverviewResponse {
            summary,
            deaths_per_million_by_continent: means,
        })
    });

    match result {
        Ok(overview) => Json(overview).into_response(),
        Err(e) => error_response(StatusCode::BAD_REQUEST, e),
    }
}

async fn timeseries_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<FilterQuery>, QueryRejection>,
) -> impl IntoResponse {
    let (rows, _) = match filtered(&state, params) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match daily_totals(&rows, &[NEW_CASES_SMOOTHED, NEW_DEATHS_SMOOTHED]) {
        Ok(table) => {
            let points: Vec<TimeseriesPoint> = table
                .rows()
                .map(|(date, values)| TimeseriesPoint {
                    date,
                    new_cases_smoothed: values[0],
                    new_deaths_smoothed: values[1],
                })
                .collect();
            Json(serde_json::json!({ "points": points })).into_response()
        }
        Err(e) => error_response(StatusCode::BAD_REQUEST, e),
    }
}

async fn scatter_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<FilterQuery>, QueryRejection>,
) -> impl IntoResponse {
    let (rows, _) = match filtered(&state, params) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let latest = latest_by_location(&rows);

    match scatter_points(
        &latest,
        GDP_PER_CAPITA,
        TOTAL_CASES_PER_MILLION,
        Some(POPULATION),
    ) {
        Ok(points) => {
            let trend = TrendLine::fit(&points);
            Json(ScatterResponse { points, trend }).into_response()
        }
        Err(e) => error_response(StatusCode::BAD_REQUEST, e),
    }
}

async fn data_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<FilterQuery>, QueryRejection>,
) -> impl IntoResponse {
    let (rows, params) = match filtered(&state, params) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let names = rows.header().names();

    Json(DataResponse {
        total: rows.len(),
        rows: rows.iter().take(limit).map(|r| row_object(r, names)).collect(),
    })
    .into_response()
}

async fn data_csv_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<FilterQuery>, QueryRejection>,
) -> impl IntoResponse {
    let (rows, _) = match filtered(&state, params) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match to_csv_string(&rows) {
        Ok(body) => (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", CSV_FILE_NAME),
                ),
            ],
            body,
        )
            .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

fn app(state: Arc<AppState>) -> Router {
    // CORS for web frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/filters", get(filters_handler))
        .route("/overview", get(overview_handler))
        .route("/timeseries", get(timeseries_handler))
        .route("/scatter", get(scatter_handler))
        .route("/data", get(data_handler))
        .route("/data.csv", get(data_csv_handler))
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let settings = Settings::from_env();
    let bind = std::env::var("API_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

    println!("=== OWID COVID-19 API ===");
    let raw = match &settings.data_file {
        Some(path) => {
            println!("Loading dataset from {}...", path.display());
            load_file_or_empty(path)
        }
        None => {
            println!("Fetching dataset from {}...", settings.data_url);
            Fetcher::new(settings.fetch_timeout)
                .context("Failed to build HTTP client")?
                .fetch_or_empty(&settings.data_url)
                .await
        }
    };

    let entity_rows = match partition(&raw, DEFAULT_AGGREGATE_LOCATIONS) {
        Ok(parts) => parts.entity_rows,
        Err(e) => {
            warn!(error = %e, "dataset rejected, serving without data");
            Dataset::default()
        }
    };
    if entity_rows.is_empty() {
        println!("No data loaded; data endpoints will answer 503");
    } else {
        info!(rows = entity_rows.len(), "dataset ready");
        println!("Dataset ready: {} country rows", entity_rows.len());
    }

    let state = Arc::new(AppState { entity_rows });

    println!("API listening on http://{}", bind);
    println!("\nEndpoints:");
    println!("  GET /health");
    println!("  GET /filters");
    println!("  GET /overview?start=&end=&continent=");
    println!("  GET /timeseries?start=&end=&continent=");
    println!("  GET /scatter?start=&end=&continent=");
    println!("  GET /data?start=&end=&continent=&limit=");
    println!("  GET /data.csv?start=&end=&continent=");

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}
