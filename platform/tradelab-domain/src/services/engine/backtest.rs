use crate::entities::metrics::{BacktestSummary, MetricsState};
use crate::error::EngineError;
use crate::repositories::market_data::{PriceSeriesProvider, SeriesQuery};
use crate::services::engine::signal::run_signals;
use crate::services::strategy::StrategyParams;
use crate::value_objects::equity_point::EquityPoint;
use crate::value_objects::trade::Trade;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DEFAULT_INITIAL_EQUITY: f64 = 100_000.0;

/// Order in which concatenated trades are folded into the equity curve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquityOrder {
    /// All trades of the first ticker, then the second, and so on. The curve
    /// is not date-monotonic across tickers.
    #[default]
    Symbol,
    /// Trades stable-sorted by exit date before folding.
    ExitDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestRequest {
    pub strategy: StrategyParams,
    pub tickers: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_equity: f64,
    pub equity_order: EquityOrder,
}

impl BacktestRequest {
    pub fn new(
        strategy: StrategyParams,
        tickers: Vec<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            strategy,
            tickers,
            start_date,
            end_date,
            initial_equity: DEFAULT_INITIAL_EQUITY,
            equity_order: EquityOrder::default(),
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        validate_tickers(&self.tickers)?;
        if self.start_date > self.end_date {
            return Err(EngineError::InvalidRequest(format!(
                "start_date {} is after end_date {}",
                self.start_date, self.end_date
            )));
        }
        if !self.initial_equity.is_finite() || self.initial_equity <= 0.0 {
            return Err(EngineError::invalid_parameter(
                "initial_equity",
                "must be finite and > 0",
            ));
        }
        self.strategy.validate()
    }
}

pub(crate) fn validate_tickers(tickers: &[String]) -> Result<(), EngineError> {
    if tickers.is_empty() {
        return Err(EngineError::InvalidRequest(
            "ticker list is empty".to_string(),
        ));
    }
    if let Some(idx) = tickers.iter().position(|t| t.trim().is_empty()) {
        return Err(EngineError::InvalidRequest(format!(
            "ticker at position {idx} is blank"
        )));
    }
    Ok(())
}

/// A symbol left out of the result because its series could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolFailure {
    pub ticker: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolStats {
    pub ticker: String,
    pub bars: usize,
    pub trades: usize,
    /// An entry was still open at the last bar and was discarded.
    pub open_position_dropped: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResults {
    pub summary: Option<BacktestSummary>,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub symbols: Vec<SymbolStats>,
    pub failures: Vec<SymbolFailure>,
}

impl BacktestResults {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Runs one request against `provider`, symbol by symbol.
///
/// Each symbol gets fresh strategy state. Symbols whose series fails to load
/// or comes back empty land in `failures`; the rest of the run is unaffected.
pub struct BacktestRunner<'a, P>
where
    P: PriceSeriesProvider + ?Sized,
{
    request: &'a BacktestRequest,
    provider: &'a P,
}

impl<'a, P> BacktestRunner<'a, P>
where
    P: PriceSeriesProvider + ?Sized,
{
    pub fn new(request: &'a BacktestRequest, provider: &'a P) -> Self {
        Self { request, provider }
    }

    pub fn run(&self) -> Result<BacktestResults, EngineError> {
        self.request.validate()?;

        let mut trades = Vec::new();
        let mut symbols = Vec::new();
        let mut failures = Vec::new();

        for ticker in &self.request.tickers {
            match self.run_symbol(ticker.trim()) {
                Ok((stats, mut symbol_trades)) => {
                    trades.append(&mut symbol_trades);
                    symbols.push(stats);
                }
                Err(EngineError::DataUnavailable { ticker, reason }) => {
                    failures.push(SymbolFailure { ticker, reason })
                }
                Err(err) => return Err(err),
            }
        }

        if self.request.equity_order == EquityOrder::ExitDate {
            trades.sort_by_key(|trade| trade.exit_date);
        }

        let mut metrics = MetricsState::new(self.request.initial_equity);
        for trade in trades {
            metrics.record_trade(trade);
        }
        let (equity_curve, trades, summary) =
            metrics.into_parts(self.request.start_date, self.request.end_date);

        Ok(BacktestResults {
            summary,
            trades,
            equity_curve,
            symbols,
            failures,
        })
    }

    fn run_symbol(&self, ticker: &str) -> Result<(SymbolStats, Vec<Trade>), EngineError> {
        let unavailable = |reason: String| EngineError::DataUnavailable {
            ticker: ticker.to_string(),
            reason,
        };

        let query = SeriesQuery::new(ticker, self.request.start_date, self.request.end_date);
        let bars = self.provider.load_series(&query).map_err(unavailable)?;
        if bars.is_empty() {
            return Err(unavailable("no bars in range".to_string()));
        }

        let mut strategy = self.request.strategy.build()?;
        let run = run_signals(ticker, &bars, &mut strategy);
        let stats = SymbolStats {
            ticker: ticker.to_string(),
            bars: run.bars_processed,
            trades: run.trades.len(),
            open_position_dropped: run.open_position.is_some(),
        };
        Ok((stats, run.trades))
    }
}

pub fn run_backtest<P>(
    request: &BacktestRequest,
    provider: &P,
) -> Result<BacktestResults, EngineError>
where
    P: PriceSeriesProvider + ?Sized,
{
    BacktestRunner::new(request, provider).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::bar::Bar;
    use chrono::Duration;
    use std::collections::HashMap;

    struct MapProvider {
        series: HashMap<String, Vec<f64>>,
    }

    impl PriceSeriesProvider for MapProvider {
        fn name(&self) -> &str {
            "map"
        }

        fn load_series(&self, query: &SeriesQuery) -> Result<Vec<Bar>, String> {
            let closes = self
                .series
                .get(&query.ticker)
                .ok_or_else(|| format!("unknown ticker {}", query.ticker))?;
            Ok(closes
                .iter()
                .enumerate()
                .map(|(idx, close)| Bar {
                    symbol: query.ticker.clone(),
                    date: query.start + Duration::days(idx as i64),
                    open: *close,
                    high: *close,
                    low: *close,
                    close: *close,
                    volume: 1_000.0,
                })
                .collect())
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).expect("valid date")
    }

    fn params(ma_length: usize) -> StrategyParams {
        StrategyParams::MaCrossover(crate::services::strategy::MaCrossoverParams {
            ma_length,
            position_size: 10.0,
        })
    }

    fn request(tickers: &[&str]) -> BacktestRequest {
        BacktestRequest::new(
            params(2),
            tickers.iter().map(|t| t.to_string()).collect(),
            day(1),
            day(31),
        )
    }

    fn provider() -> MapProvider {
        let mut series = HashMap::new();
        // cross up on day 3 (close 12), cross down on day 5 (close 9)
        series.insert("AAA".to_string(), vec![10.0, 10.0, 12.0, 12.0, 9.0]);
        // cross up on day 3 then up again without exit
        series.insert("BBB".to_string(), vec![20.0, 20.0, 25.0, 30.0]);
        series.insert("EMPTY".to_string(), Vec::new());
        MapProvider { series }
    }

    #[test]
    fn rejects_bad_requests_before_loading() {
        let err = run_backtest(&request(&[]), &provider()).expect_err("empty");
        assert!(err.is_input_error());

        let err = run_backtest(&request(&["AAA", "  "]), &provider()).expect_err("blank");
        assert!(err.is_input_error());

        let mut reversed = request(&["AAA"]);
        reversed.start_date = day(10);
        reversed.end_date = day(9);
        assert!(run_backtest(&reversed, &provider()).is_err());
    }

    #[test]
    fn isolates_missing_and_empty_symbols() {
        let results =
            run_backtest(&request(&["MISSING", "AAA", "EMPTY"]), &provider()).expect("results");
        assert!(results.is_partial());
        assert_eq!(results.failures.len(), 2);
        assert_eq!(results.failures[0].ticker, "MISSING");
        assert_eq!(results.failures[1].ticker, "EMPTY");
        assert_eq!(results.trades.len(), 1);
        assert_eq!(results.trades[0].profit_loss, -30.0);
    }

    #[test]
    fn folds_symbol_major_and_reports_dropped_positions() {
        let results = run_backtest(&request(&["AAA", "BBB"]), &provider()).expect("results");
        assert!(!results.is_partial());
        assert_eq!(results.symbols.len(), 2);
        assert!(!results.symbols[0].open_position_dropped);
        assert!(results.symbols[1].open_position_dropped);
        assert_eq!(results.symbols[1].trades, 0);

        let summary = results.summary.expect("summary");
        assert_eq!(summary.total_trades, 1);
        assert_eq!(summary.final_equity, DEFAULT_INITIAL_EQUITY - 30.0);
        assert_eq!(results.equity_curve.len(), 1);
        assert_eq!(results.equity_curve[0].date, day(5));
    }

    #[test]
    fn no_trades_leaves_summary_empty() {
        let results = run_backtest(&request(&["BBB"]), &provider()).expect("results");
        assert!(results.summary.is_none());
        assert!(results.trades.is_empty());
        assert!(results.equity_curve.is_empty());
    }

    #[test]
    fn exit_date_order_sorts_curve() {
        let mut series = HashMap::new();
        // exits on day 7
        series.insert("LATE".to_string(), vec![10.0, 10.0, 10.0, 10.0, 12.0, 12.0, 9.0]);
        // exits on day 5
        series.insert("EARLY".to_string(), vec![10.0, 10.0, 12.0, 12.0, 9.0]);
        let provider = MapProvider { series };

        let mut req = request(&["LATE", "EARLY"]);
        let symbol_major = run_backtest(&req, &provider).expect("results");
        assert_eq!(symbol_major.trades[0].ticker, "LATE");

        req.equity_order = EquityOrder::ExitDate;
        let by_date = run_backtest(&req, &provider).expect("results");
        assert_eq!(by_date.trades[0].ticker, "EARLY");
        assert!(by_date
            .equity_curve
            .windows(2)
            .all(|pair| pair[0].date <= pair[1].date));
        assert_eq!(
            by_date.summary.map(|s| s.final_equity),
            symbol_major.summary.map(|s| s.final_equity)
        );
    }
}
