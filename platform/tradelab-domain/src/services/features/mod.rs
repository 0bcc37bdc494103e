mod rolling;

pub use rolling::{trailing_sma, RollingSma};
