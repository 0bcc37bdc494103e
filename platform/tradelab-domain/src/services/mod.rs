pub mod engine;
pub mod features;
pub mod ohlcv;
pub mod screening;
pub mod strategy;
