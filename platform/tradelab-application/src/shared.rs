use crate::config::Config;
use chrono::{Local, NaiveDate};
use std::path::PathBuf;
use std::time::Instant;
use tradelab_domain::repositories::market_data::{PriceSeriesProvider, SeriesQuery};
use tradelab_domain::services::engine::backtest::{
    BacktestRequest, SymbolFailure, DEFAULT_INITIAL_EQUITY,
};
use tradelab_domain::services::ohlcv::DataQualityReport;
use tradelab_domain::services::screening::{ScreenRequest, DEFAULT_LOOKBACK_DAYS};
use tradelab_domain::value_objects::bar::Bar;

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn backtest_request(config: &Config) -> Result<BacktestRequest, String> {
    let start_date = config
        .run
        .start_date
        .ok_or_else(|| "run.start_date is required for backtest".to_string())?;
    let end_date = config
        .run
        .end_date
        .ok_or_else(|| "run.end_date is required for backtest".to_string())?;

    let mut request = BacktestRequest::new(
        config.strategy.clone(),
        config.run.tickers.clone(),
        start_date,
        end_date,
    );
    request.initial_equity = config.run.initial_equity.unwrap_or(DEFAULT_INITIAL_EQUITY);
    request.equity_order = config
        .report
        .as_ref()
        .and_then(|report| report.equity_order)
        .unwrap_or_default();
    request.validate().map_err(|err| err.to_string())?;
    Ok(request)
}

pub fn screen_request(
    config: &Config,
    as_of_override: Option<NaiveDate>,
) -> Result<ScreenRequest, String> {
    let screen = config.screen.clone().unwrap_or_default();
    let as_of_date = as_of_override
        .or(screen.as_of_date)
        .unwrap_or_else(today);

    let mut request = ScreenRequest::new(screen.criteria, config.run.tickers.clone(), as_of_date);
    request.lookback_days = screen.lookback_days.unwrap_or(DEFAULT_LOOKBACK_DAYS);
    request.validate().map_err(|err| err.to_string())?;
    Ok(request)
}

pub fn resolve_run_dir(config: &Config, out: Option<PathBuf>) -> PathBuf {
    let base_dir = out.unwrap_or_else(|| PathBuf::from(&config.paths.out_dir));
    base_dir.join(&config.run.run_id)
}

pub fn config_snapshot_json(config: &Config) -> serde_json::Value {
    serde_json::to_value(config).unwrap_or(serde_json::Value::Null)
}

pub fn failures_json(failures: &[SymbolFailure]) -> serde_json::Value {
    serde_json::to_value(failures).unwrap_or_else(|_| serde_json::json!([]))
}

pub fn data_quality_json(report: &DataQualityReport) -> serde_json::Value {
    serde_json::json!({
        "rows": report.bars,
        "first_date": report.first_date,
        "last_date": report.last_date,
        "duplicates": report.duplicates,
        "out_of_order": report.out_of_order,
        "invalid_close": report.invalid_close,
        "gaps": report.gaps,
        "max_gap_days": report.max_gap_days,
        "first_duplicate": report.first_duplicate,
        "first_out_of_order": report.first_out_of_order,
        "first_invalid_close": report.first_invalid_close,
        "first_gap": report.first_gap,
    })
}

/// Provider decorator that times every load and logs its outcome.
pub struct InstrumentedProvider<'a> {
    inner: &'a dyn PriceSeriesProvider,
    histogram: &'static str,
}

impl<'a> InstrumentedProvider<'a> {
    pub fn new(inner: &'a dyn PriceSeriesProvider, histogram: &'static str) -> Self {
        Self { inner, histogram }
    }
}

impl PriceSeriesProvider for InstrumentedProvider<'_> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn load_series(&self, query: &SeriesQuery) -> Result<Vec<Bar>, String> {
        let stage_start = Instant::now();
        let result = self.inner.load_series(query);
        metrics::histogram!(self.histogram).record(stage_start.elapsed().as_millis() as f64);
        match &result {
            Ok(bars) => tracing::debug!(
                ticker = %query.ticker,
                provider = self.inner.name(),
                rows = bars.len(),
                "series loaded"
            ),
            Err(err) => tracing::warn!(
                ticker = %query.ticker,
                provider = self.inner.name(),
                error = %err,
                "series load failed"
            ),
        }
        result
    }
}
