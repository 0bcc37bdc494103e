use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;
use statrs::distribution::Normal;
use tradelab_domain::repositories::market_data::{PriceSeriesProvider, SeriesQuery};
use tradelab_domain::value_objects::bar::Bar;

pub const DEFAULT_SEED: u64 = 42;

const START_PRICE: f64 = 100.0;
const DAILY_DRIFT_STD: f64 = 0.01;
const CLOSE_NOISE_STD: f64 = 0.005;
const MAX_WICK: f64 = 0.02;
const MIN_VOLUME: f64 = 1_000_000.0;
const MAX_VOLUME: f64 = 10_000_000.0;

/// Deterministic stand-in for a market-data feed.
///
/// Produces one bar per weekday in `start..end` (end exclusive). The
/// generator is reseeded on every call, so every ticker gets the same series
/// for the same range.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticProvider {
    seed: u64,
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

impl SyntheticProvider {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    fn generate(&self, query: &SeriesQuery) -> Result<Vec<Bar>, String> {
        let dates = weekdays(query.start, query.end);
        if dates.is_empty() {
            return Ok(Vec::new());
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let drift = normal(DAILY_DRIFT_STD)?;
        let close_noise = normal(CLOSE_NOISE_STD)?;
        let wick = Uniform::new(0.0, MAX_WICK);
        let volume = Uniform::new(MIN_VOLUME, MAX_VOLUME);

        let mut price = START_PRICE;
        let opens: Vec<f64> = dates
            .iter()
            .map(|_| {
                price *= 1.0 + drift.sample(&mut rng);
                price
            })
            .collect();
        // Column by column, in the same draw order as the walk above.
        let highs: Vec<f64> = opens
            .iter()
            .map(|p| p * (1.0 + wick.sample(&mut rng)))
            .collect();
        let lows: Vec<f64> = opens
            .iter()
            .map(|p| p * (1.0 - wick.sample(&mut rng)))
            .collect();
        let closes: Vec<f64> = opens
            .iter()
            .map(|p| p * (1.0 + close_noise.sample(&mut rng)))
            .collect();
        let volumes: Vec<f64> = opens
            .iter()
            .map(|_| volume.sample(&mut rng).floor())
            .collect();

        Ok(dates
            .into_iter()
            .enumerate()
            .map(|(idx, date)| Bar {
                symbol: query.ticker.clone(),
                date,
                open: opens[idx],
                high: highs[idx],
                low: lows[idx],
                close: closes[idx],
                volume: volumes[idx],
            })
            .collect())
    }
}

impl PriceSeriesProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn load_series(&self, query: &SeriesQuery) -> Result<Vec<Bar>, String> {
        self.generate(query)
    }
}

fn normal(std_dev: f64) -> Result<Normal, String> {
    Normal::new(0.0, std_dev).map_err(|err| format!("invalid normal distribution: {err}"))
}

fn weekdays(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let days = (end - start).num_days().max(0);
    (0..days)
        .map(|offset| start + Duration::days(offset))
        .filter(|date| !matches!(date.weekday(), Weekday::Sat | Weekday::Sun))
        .collect()
}
