pub mod backtesting;
pub mod config;
pub mod screening;
mod shared;
pub mod validation;
