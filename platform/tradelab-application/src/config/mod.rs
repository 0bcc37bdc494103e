use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tradelab_domain::services::engine::backtest::EquityOrder;
use tradelab_domain::services::screening::ScreenCriteria;
use tradelab_domain::services::strategy::StrategyParams;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    #[default]
    Synthetic,
    Csv,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub run: RunConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub strategy: StrategyParams,
    pub screen: Option<ScreenConfig>,
    pub paths: PathsConfig,
    pub report: Option<ReportConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub run_id: String,
    pub tickers: Vec<String>,
    /// Required by `backtest`; `screen` and `validate` fall back to the
    /// screening window when absent.
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub initial_equity: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct DataConfig {
    #[serde(default)]
    pub source: DataSource,
    pub seed: Option<u64>,
    pub csv_dir: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct ScreenConfig {
    pub as_of_date: Option<NaiveDate>,
    pub lookback_days: Option<u32>,
    #[serde(default)]
    pub criteria: ScreenCriteria,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    pub out_dir: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    pub equity_order: Option<EquityOrder>,
}

pub fn load_config_with_source(path: &Path) -> Result<(Config, String), String> {
    let contents = fs::read_to_string(path)
        .map_err(|err| format!("failed to read config {}: {}", path.display(), err))?;
    let config = parse_config(&contents)
        .map_err(|err| format!("failed to parse TOML {}: {}", path.display(), err))?;
    Ok((config, contents))
}

pub fn parse_config(contents: &str) -> Result<Config, String> {
    toml::from_str(contents).map_err(|err| err.to_string())
}
