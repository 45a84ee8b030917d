//! Static configuration: environment settings for where data comes from,
//! and the render configuration passed explicitly to the chart renderer.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::fetch::{DEFAULT_DATA_URL, DEFAULT_TIMEOUT_SECS};
use crate::filter::DEFAULT_AGGREGATE_LOCATIONS;

pub const DEFAULT_OUTPUT_DIR: &str = "output";

// =============================================================================
// Environment
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub data_url: String,
    /// Local CSV snapshot; takes precedence over `data_url` when set.
    pub data_file: Option<PathBuf>,
    pub fetch_timeout: Duration,
    pub output_dir: PathBuf,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            data_url: lookup("DATA_URL").unwrap_or_else(|| DEFAULT_DATA_URL.to_string()),
            data_file: lookup("DATA_FILE")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            fetch_timeout: Duration::from_secs(
                lookup("FETCH_TIMEOUT_SECS")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
            output_dir: PathBuf::from(
                lookup("OUTPUT_DIR").unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string()),
            ),
        }
    }
}

// =============================================================================
// Charts
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    DeathsByContinent,
    CasesComparison,
    VaccinationScatter,
    CaseProgression,
}

impl ChartKind {
    pub const ALL: [ChartKind; 4] = [
        ChartKind::DeathsByContinent,
        ChartKind::CasesComparison,
        ChartKind::VaccinationScatter,
        ChartKind::CaseProgression,
    ];

    pub fn title(self) -> &'static str {
        match self {
            ChartKind::DeathsByContinent => "Average Deaths per Million by Continent",
            ChartKind::CasesComparison => "Smoothed New Cases in Europe and Asia",
            ChartKind::VaccinationScatter => "Vaccination Rates vs. Death Rates by Country",
            ChartKind::CaseProgression => "COVID-19 Case Progression by Continent",
        }
    }

    fn default_file_name(self) -> &'static str {
        match self {
            ChartKind::DeathsByContinent => "deaths_per_million_by_continent.png",
            ChartKind::CasesComparison => "new_cases_smoothed_europe_asia.png",
            ChartKind::VaccinationScatter => "vaccination_vs_deaths_scatter.png",
            ChartKind::CaseProgression => "case_progression_by_continent.png",
        }
    }

    fn default_colors(self) -> &'static [&'static str] {
        match self {
            ChartKind::DeathsByContinent => &["#1f77b4"],
            ChartKind::CasesComparison => &["#ff7f0e", "#2ca02c"],
            ChartKind::VaccinationScatter => &["#d62728"],
            ChartKind::CaseProgression => &[
                "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b",
            ],
        }
    }

    /// Pixels at 100 dpi.
    fn default_size(self) -> (u32, u32) {
        match self {
            ChartKind::DeathsByContinent => (1200, 600),
            ChartKind::CasesComparison => (1400, 700),
            ChartKind::VaccinationScatter => (1200, 800),
            ChartKind::CaseProgression => (1400, 800),
        }
    }
}

/// Per-chart fields a config file may override.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChartOverrides {
    pub file_name: Option<String>,
    pub colors: Option<Vec<String>>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChartsConfig {
    pub deaths_by_continent: ChartOverrides,
    pub cases_comparison: ChartOverrides,
    pub vaccination_scatter: ChartOverrides,
    pub case_progression: ChartOverrides,
}

impl ChartsConfig {
    fn get(&self, kind: ChartKind) -> &ChartOverrides {
        match kind {
            ChartKind::DeathsByContinent => &self.deaths_by_continent,
            ChartKind::CasesComparison => &self.cases_comparison,
            ChartKind::VaccinationScatter => &self.vaccination_scatter,
            ChartKind::CaseProgression => &self.case_progression,
        }
    }
}

/// Fully resolved settings for one chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSettings {
    pub kind: ChartKind,
    pub path: PathBuf,
    pub colors: Vec<String>,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    pub output_dir: PathBuf,
    pub charts: ChartsConfig,
    /// Rollup locations compared in the line chart.
    pub line_groups: Vec<String>,
    /// Continents stacked in the progression chart; all when unset.
    pub stack_groups: Option<Vec<String>>,
    /// Null-continent locations kept as aggregate rows.
    pub aggregate_locations: Vec<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        let defaults: Vec<String> = DEFAULT_AGGREGATE_LOCATIONS
            .iter()
            .map(|s| s.to_string())
            .collect();
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            charts: ChartsConfig::default(),
            line_groups: defaults.clone(),
            stack_groups: None,
            aggregate_locations: defaults,
        }
    }
}

impl RenderConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn chart(&self, kind: ChartKind) -> ChartSettings {
        let overrides = self.charts.get(kind);
        let (width, height) = kind.default_size();
        let file_name = overrides
            .file_name
            .clone()
            .unwrap_or_else(|| kind.default_file_name().to_string());
        let colors = overrides
            .colors
            .clone()
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| kind.default_colors().iter().map(|c| c.to_string()).collect());

        ChartSettings {
            kind,
            path: self.output_dir.join(file_name),
            colors,
            width: overrides.width.unwrap_or(width),
            height: overrides.height.unwrap_or(height),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::from_lookup(|_| None);
        assert_eq!(settings.data_url, DEFAULT_DATA_URL);
        assert_eq!(settings.data_file, None);
        assert_eq!(settings.fetch_timeout, Duration::from_secs(120));
        assert_eq!(settings.output_dir, PathBuf::from("output"));
    }

    #[test]
    fn test_settings_from_env_values() {
        let env: HashMap<&str, &str> = [
            ("DATA_FILE", "data/raw/snap.csv"),
            ("FETCH_TIMEOUT_SECS", "15"),
            ("OUTPUT_DIR", "charts"),
        ]
        .into_iter()
        .collect();
        let settings = Settings::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(settings.data_file, Some(PathBuf::from("data/raw/snap.csv")));
        assert_eq!(settings.fetch_timeout, Duration::from_secs(15));
        assert_eq!(settings.output_dir, PathBuf::from("charts"));
    }

    #[test]
    fn test_settings_bad_timeout_falls_back() {
        let settings = Settings::from_lookup(|k| {
            (k == "FETCH_TIMEOUT_SECS").then(|| "soon".to_string())
        });
        assert_eq!(settings.fetch_timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn test_chart_defaults() {
        let config = RenderConfig::default();
        let bar = config.chart(ChartKind::DeathsByContinent);
        assert_eq!(bar.path, PathBuf::from("output/deaths_per_million_by_continent.png"));
        assert_eq!(bar.colors, vec!["#1f77b4".to_string()]);
        assert_eq!((bar.width, bar.height), (1200, 600));
        assert_eq!(config.chart(ChartKind::CaseProgression).colors.len(), 6);
        assert_eq!(config.line_groups, vec!["Europe".to_string(), "Asia".to_string()]);
    }

    #[test]
    fn test_partial_override_from_json() {
        let json = r#"{
            "output_dir": "out",
            "charts": { "cases_comparison": { "width": 800 } },
            "stack_groups": ["Europe", "Asia"]
        }"#;
        let config: RenderConfig = serde_json::from_str(json).unwrap();
        let line = config.chart(ChartKind::CasesComparison);
        assert_eq!(line.path, PathBuf::from("out/new_cases_smoothed_europe_asia.png"));
        assert_eq!((line.width, line.height), (800, 700));
        assert_eq!(line.colors, vec!["#ff7f0e".to_string(), "#2ca02c".to_string()]);
        assert_eq!(config.aggregate_locations.len(), 2);
        assert_eq!(config.stack_groups.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = serde_json::from_str::<RenderConfig>(r#"{ "colour": "red" }"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("render.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = RenderConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Json { .. }));
        assert!(err.to_string().contains("render.json"));
    }
}
