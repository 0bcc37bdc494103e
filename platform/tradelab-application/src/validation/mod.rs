use crate::config::Config;
use crate::shared::{data_quality_json, screen_request};
use std::time::Instant;
use tracing::info_span;
use tradelab_domain::repositories::market_data::{PriceSeriesProvider, SeriesQuery};

pub struct ValidationOutcome {
    pub report: serde_json::Value,
    /// Any ticker has duplicates, out-of-order rows or invalid closes, or
    /// could not be loaded at all.
    pub has_violations: bool,
}

/// Loads every configured ticker and reports data quality per symbol.
///
/// Uses `run.start_date..run.end_date` when both are set, otherwise the
/// screening lookback window. Gaps are reported but never count as
/// violations.
pub fn validate(
    config: &Config,
    strict: bool,
    provider: &dyn PriceSeriesProvider,
) -> Result<ValidationOutcome, String> {
    let _span = info_span!(
        "validate",
        strict = strict,
        run_id = %config.run.run_id,
        tickers = config.run.tickers.len(),
        provider = provider.name()
    )
    .entered();

    let (start, end) = match (config.run.start_date, config.run.end_date) {
        (Some(start), Some(end)) if start <= end => (start, end),
        (Some(start), Some(end)) => {
            return Err(format!(
                "run.start_date {start} is after run.end_date {end}"
            ))
        }
        _ => {
            let request = screen_request(config, None)?;
            let start = request.window_start().map_err(|err| err.to_string())?;
            (start, request.as_of_date)
        }
    };
    if config.run.tickers.is_empty() {
        return Err("run.tickers is empty".to_string());
    }

    let mut symbols = Vec::with_capacity(config.run.tickers.len());
    let mut has_violations = false;

    for ticker in &config.run.tickers {
        let ticker = ticker.trim();
        let stage_start = Instant::now();
        let loaded = provider.inspect_series(&SeriesQuery::new(ticker, start, end));
        metrics::histogram!("tradelab.validate.load_series_ms")
            .record(stage_start.elapsed().as_millis() as f64);

        match loaded {
            Ok((bars, report)) => {
                let empty = bars.is_empty();
                let violation = empty || report.has_violations();
                has_violations |= violation;
                if violation {
                    tracing::warn!(
                        ticker = %ticker,
                        rows = bars.len(),
                        duplicates = report.duplicates,
                        out_of_order = report.out_of_order,
                        invalid_close = report.invalid_close,
                        "data quality violations"
                    );
                } else {
                    tracing::debug!(ticker = %ticker, rows = bars.len(), gaps = report.gaps, "data ok");
                }
                symbols.push(serde_json::json!({
                    "ticker": ticker,
                    "ok": !violation,
                    "empty": empty,
                    "data_quality": data_quality_json(&report),
                }));
            }
            Err(err) => {
                has_violations = true;
                tracing::warn!(ticker = %ticker, error = %err, "series load failed");
                symbols.push(serde_json::json!({
                    "ticker": ticker,
                    "ok": false,
                    "error": err,
                }));
            }
        }
    }

    let report = serde_json::json!({
        "run_id": config.run.run_id,
        "provider": provider.name(),
        "start_date": start,
        "end_date": end,
        "strict": strict,
        "passed": !has_violations,
        "symbols": symbols,
    });

    Ok(ValidationOutcome {
        report,
        has_violations,
    })
}
