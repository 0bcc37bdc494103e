use crate::services::strategy::Strategy;
use crate::value_objects::action_type::ActionType;
use crate::value_objects::bar::Bar;
use crate::value_objects::position::Position;
use crate::value_objects::trade::Trade;

#[derive(Debug, Clone, Default)]
pub struct SignalRun {
    pub trades: Vec<Trade>,
    pub bars_processed: usize,
    /// Leg still open when the series ended. It is not liquidated and never
    /// becomes a trade.
    pub open_position: Option<Position>,
}

/// Walks one symbol's bars through `strategy`, filling entries and exits at
/// the signalling bar's close. At most one position is open at a time.
pub fn run_signals<S>(ticker: &str, bars: &[Bar], strategy: &mut S) -> SignalRun
where
    S: Strategy + ?Sized,
{
    let mut position: Option<Position> = None;
    let mut trades = Vec::new();

    for bar in bars {
        let action = strategy.on_bar(bar, position.as_ref());
        match action.action_type {
            ActionType::Hold => (),
            ActionType::Buy => {
                if position.is_none() && action.size.is_finite() && action.size > 0.0 {
                    position = Some(Position {
                        entry_price: bar.close,
                        entry_date: bar.date,
                        size: action.size,
                    });
                }
            }
            ActionType::Sell => {
                if let Some(open) = position.take() {
                    trades.push(Trade::close(ticker, &open, bar.date, bar.close));
                }
            }
        }
    }

    SignalRun {
        trades,
        bars_processed: bars.len(),
        open_position: position,
    }
}
