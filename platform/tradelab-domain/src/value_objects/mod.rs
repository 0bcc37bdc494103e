pub mod action;
pub mod action_type;
pub mod bar;
pub mod equity_point;
pub mod position;
pub mod screen_match;
pub mod trade;
