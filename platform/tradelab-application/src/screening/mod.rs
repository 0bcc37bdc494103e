use crate::config::Config;
use crate::shared::{failures_json, resolve_run_dir, screen_request, InstrumentedProvider};
use chrono::NaiveDate;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info_span;
use tradelab_domain::repositories::artifacts::ArtifactWriter;
use tradelab_domain::repositories::market_data::PriceSeriesProvider;
use tradelab_domain::services::screening::{summarize_criteria, ScreenCriteria, ScreenResults};

pub struct ScreenOutcome {
    pub run_id: String,
    pub criteria: ScreenCriteria,
    pub criteria_summary: String,
    pub results: ScreenResults,
    pub run_dir: Option<PathBuf>,
}

impl ScreenOutcome {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "run_id": self.run_id,
            "as_of_date": self.results.as_of_date,
            "criteria": self.criteria,
            "criteria_summary": self.criteria_summary,
            "evaluated": self.results.evaluated,
            "matches": self.results.matches,
            "failures": failures_json(&self.results.failures),
            "run_dir": self.run_dir.as_ref().map(|dir| dir.display().to_string()),
        })
    }
}

/// Screens the configured tickers. `as_of` overrides `screen.as_of_date`;
/// with neither set the local date is used.
pub fn run_screen(
    config: &Config,
    as_of: Option<NaiveDate>,
    out: Option<PathBuf>,
    provider: &dyn PriceSeriesProvider,
    artifacts: Option<&dyn ArtifactWriter>,
) -> Result<ScreenOutcome, String> {
    let request = screen_request(config, as_of)?;
    let criteria_summary = summarize_criteria(&request.criteria);

    let _span = info_span!(
        "run_screen",
        run_id = %config.run.run_id,
        tickers = request.tickers.len(),
        as_of_date = %request.as_of_date,
        provider = provider.name()
    )
    .entered();
    tracing::info!(criteria = %criteria_summary, lookback_days = request.lookback_days, "screening");

    let provider = InstrumentedProvider::new(provider, "tradelab.screen.load_series_ms");
    let stage_start = Instant::now();
    let results = tradelab_domain::services::screening::run_screen(&request, &provider)
        .map_err(|err| err.to_string())?;
    metrics::histogram!("tradelab.screen.engine_ms")
        .record(stage_start.elapsed().as_millis() as f64);
    metrics::gauge!("tradelab.screen.matches").set(results.matches.len() as f64);

    for failure in &results.failures {
        tracing::warn!(ticker = %failure.ticker, reason = %failure.reason, "symbol skipped");
    }
    tracing::info!(
        evaluated = results.evaluated,
        matches = results.matches.len(),
        "screen complete"
    );

    let mut outcome = ScreenOutcome {
        run_id: config.run.run_id.clone(),
        criteria: request.criteria,
        criteria_summary,
        results,
        run_dir: None,
    };

    if let Some(artifacts) = artifacts {
        let run_dir = resolve_run_dir(config, out);
        artifacts.ensure_dir(&run_dir)?;
        let meta = serde_json::json!({
            "run_id": outcome.run_id,
            "as_of_date": outcome.results.as_of_date,
            "criteria": outcome.criteria,
            "criteria_summary": outcome.criteria_summary,
            "evaluated": outcome.results.evaluated,
            "failures": failures_json(&outcome.results.failures),
        });
        artifacts.write_screen_json(
            run_dir.join("screen.json").as_path(),
            &outcome.results.matches,
            Some(&meta),
        )?;
        outcome.run_dir = Some(run_dir);
    }

    Ok(outcome)
}
