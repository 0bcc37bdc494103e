pub mod backtest;
pub mod signal;
