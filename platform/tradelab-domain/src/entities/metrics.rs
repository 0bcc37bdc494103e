use crate::value_objects::equity_point::EquityPoint;
use crate::value_objects::trade::Trade;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const DAYS_PER_YEAR: f64 = 365.25;

/// Aggregate statistics of one backtest. Only produced when at least one
/// trade closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSummary {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    /// `+inf` when no trade lost money; serialized as `null` in JSON.
    pub profit_factor: f64,
    pub max_drawdown: f64,
    pub cagr: f64,
    pub initial_equity: f64,
    pub final_equity: f64,
    pub net_profit: f64,
    pub net_profit_percent: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
}

/// Folds closed trades into a realized equity curve.
///
/// One point is appended per trade, dated at its exit. Drawdown is measured
/// against a running peak seeded with the initial equity.
#[derive(Debug, Clone)]
pub struct MetricsState {
    initial_equity: f64,
    equity: f64,
    equity_curve: Vec<EquityPoint>,
    trades: Vec<Trade>,
}

impl MetricsState {
    pub fn new(initial_equity: f64) -> Self {
        Self {
            initial_equity,
            equity: initial_equity,
            equity_curve: Vec::new(),
            trades: Vec::new(),
        }
    }

    pub fn record_trade(&mut self, trade: Trade) {
        self.equity += trade.profit_loss;
        self.equity_curve.push(EquityPoint {
            date: trade.exit_date,
            equity: self.equity,
        });
        self.trades.push(trade);
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn max_drawdown(&self) -> f64 {
        max_drawdown_pct(self.initial_equity, &self.equity_curve)
    }

    pub fn summary(&self, start_date: NaiveDate, end_date: NaiveDate) -> Option<BacktestSummary> {
        if self.trades.is_empty() {
            return None;
        }

        let total_trades = self.trades.len();
        let (wins, losses): (Vec<f64>, Vec<f64>) = self
            .trades
            .iter()
            .map(|trade| trade.profit_loss)
            .partition(|pl| *pl > 0.0);

        let final_equity = self.equity;
        let net_profit = final_equity - self.initial_equity;
        let net_profit_percent = if self.initial_equity != 0.0 {
            net_profit / self.initial_equity * 100.0
        } else {
            0.0
        };

        Some(BacktestSummary {
            start_date,
            end_date,
            total_trades,
            winning_trades: wins.len(),
            losing_trades: losses.len(),
            win_rate: wins.len() as f64 / total_trades as f64 * 100.0,
            profit_factor: profit_factor(&wins, &losses),
            max_drawdown: self.max_drawdown(),
            cagr: cagr_pct(self.initial_equity, final_equity, start_date, end_date),
            initial_equity: self.initial_equity,
            final_equity,
            net_profit,
            net_profit_percent,
            avg_win: mean(&wins),
            avg_loss: mean(&losses),
        })
    }

    pub fn into_parts(
        self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> (Vec<EquityPoint>, Vec<Trade>, Option<BacktestSummary>) {
        let summary = self.summary(start_date, end_date);
        (self.equity_curve, self.trades, summary)
    }
}

/// Gross profit over gross loss. Zero-P/L trades count on the loss side.
pub fn profit_factor(wins: &[f64], losses: &[f64]) -> f64 {
    let gross_profit: f64 = wins.iter().sum::<f64>().abs();
    let gross_loss: f64 = losses.iter().sum::<f64>().abs();
    if gross_loss == 0.0 {
        f64::INFINITY
    } else {
        gross_profit / gross_loss
    }
}

/// Largest peak-to-trough decline of `points`, in percent of the peak.
pub fn max_drawdown_pct(initial_equity: f64, points: &[EquityPoint]) -> f64 {
    let mut peak = initial_equity;
    let mut max_drawdown = 0.0f64;
    for point in points {
        if point.equity > peak {
            peak = point.equity;
        } else if peak > 0.0 {
            max_drawdown = max_drawdown.max((peak - point.equity) / peak * 100.0);
        }
    }
    max_drawdown
}

/// Compound annual growth in percent over `start..end` calendar days.
pub fn cagr_pct(initial: f64, final_equity: f64, start: NaiveDate, end: NaiveDate) -> f64 {
    let years = (end - start).num_days() as f64 / DAYS_PER_YEAR;
    if years <= 0.0 || initial <= 0.0 {
        return 0.0;
    }
    if final_equity <= 0.0 {
        return -100.0;
    }
    ((final_equity / initial).powf(1.0 / years) - 1.0) * 100.0
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
