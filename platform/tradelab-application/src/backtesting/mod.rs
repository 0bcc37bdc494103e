use crate::config::Config;
use crate::shared::{
    backtest_request, config_snapshot_json, failures_json, resolve_run_dir, InstrumentedProvider,
};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info_span;
use tradelab_domain::repositories::artifacts::ArtifactWriter;
use tradelab_domain::repositories::market_data::PriceSeriesProvider;
use tradelab_domain::services::engine::backtest::{BacktestResults, BacktestRunner};

pub struct BacktestOutcome {
    pub run_id: String,
    pub results: BacktestResults,
    /// Directory holding the artifacts, `None` when nothing was saved.
    pub run_dir: Option<PathBuf>,
}

impl BacktestOutcome {
    /// Result document: `summary` is an empty object when no trade closed.
    pub fn to_json(&self) -> serde_json::Value {
        let summary = self
            .results
            .summary
            .as_ref()
            .and_then(|summary| serde_json::to_value(summary).ok())
            .unwrap_or_else(|| serde_json::json!({}));
        serde_json::json!({
            "run_id": self.run_id,
            "summary": summary,
            "trades": self.results.trades,
            "equity_curve": self.results.equity_curve,
            "symbols": self.results.symbols,
            "failures": failures_json(&self.results.failures),
            "partial": self.results.is_partial(),
            "run_dir": self.run_dir.as_ref().map(|dir| dir.display().to_string()),
        })
    }
}

pub fn run_backtest(
    config: &Config,
    config_toml: &str,
    out: Option<PathBuf>,
    provider: &dyn PriceSeriesProvider,
    artifacts: Option<&dyn ArtifactWriter>,
) -> Result<BacktestOutcome, String> {
    let _span = info_span!(
        "run_backtest",
        run_id = %config.run.run_id,
        tickers = config.run.tickers.len(),
        rule = config.strategy.rule(),
        provider = provider.name()
    )
    .entered();

    let request = backtest_request(config)?;
    let provider = InstrumentedProvider::new(provider, "tradelab.backtest.load_series_ms");

    let stage_start = Instant::now();
    let results = BacktestRunner::new(&request, &provider)
        .run()
        .map_err(|err| err.to_string())?;
    metrics::histogram!("tradelab.backtest.engine_ms")
        .record(stage_start.elapsed().as_millis() as f64);
    metrics::gauge!("tradelab.backtest.trades").set(results.trades.len() as f64);
    metrics::gauge!("tradelab.backtest.symbols_failed").set(results.failures.len() as f64);

    for stats in &results.symbols {
        tracing::debug!(
            ticker = %stats.ticker,
            bars = stats.bars,
            trades = stats.trades,
            "symbol processed"
        );
        if stats.open_position_dropped {
            tracing::warn!(
                ticker = %stats.ticker,
                "position still open at end of series was dropped"
            );
        }
    }
    for failure in &results.failures {
        tracing::warn!(ticker = %failure.ticker, reason = %failure.reason, "symbol skipped");
    }
    tracing::info!(
        trades = results.trades.len(),
        symbols_failed = results.failures.len(),
        net_profit = results.summary.as_ref().map(|s| s.net_profit).unwrap_or(0.0),
        "backtest complete"
    );

    let run_dir = match artifacts {
        Some(artifacts) => Some(write_outputs(config, config_toml, out, &results, artifacts)?),
        None => None,
    };

    Ok(BacktestOutcome {
        run_id: config.run.run_id.clone(),
        results,
        run_dir,
    })
}

fn write_outputs(
    config: &Config,
    config_toml: &str,
    out: Option<PathBuf>,
    results: &BacktestResults,
    artifacts: &dyn ArtifactWriter,
) -> Result<PathBuf, String> {
    let run_dir = resolve_run_dir(config, out);
    artifacts.ensure_dir(&run_dir)?;

    artifacts.write_trades_csv(run_dir.join("trades.csv").as_path(), &results.trades)?;
    artifacts.write_equity_csv(run_dir.join("equity.csv").as_path(), &results.equity_curve)?;
    let meta = serde_json::json!({
        "run_id": config.run.run_id,
        "rule": config.strategy.rule(),
        "tickers": config.run.tickers,
        "symbols": results.symbols,
        "failures": failures_json(&results.failures),
        "partial": results.is_partial(),
    });
    let config_snapshot = config_snapshot_json(config);
    artifacts.write_summary_json(
        run_dir.join("summary.json").as_path(),
        results.summary.as_ref(),
        Some(&meta),
        Some(&config_snapshot),
    )?;
    artifacts
        .write_config_snapshot_toml(run_dir.join("config_snapshot.toml").as_path(), config_toml)?;

    Ok(run_dir)
}
