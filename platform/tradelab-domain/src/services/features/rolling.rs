use std::collections::VecDeque;

/// Streaming simple moving average over the last `window` values.
///
/// The mean is re-summed from the buffered window on every update.
#[derive(Debug, Clone)]
pub struct RollingSma {
    window: usize,
    buf: VecDeque<f64>,
}

impl RollingSma {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            buf: VecDeque::new(),
        }
    }

    pub fn update(&mut self, value: f64) -> Option<f64> {
        if self.window == 0 {
            return None;
        }

        self.buf.push_back(value);
        while self.buf.len() > self.window {
            self.buf.pop_front();
        }

        if self.buf.len() == self.window {
            Some(self.buf.iter().sum::<f64>() / self.window as f64)
        } else {
            None
        }
    }
}

/// Mean of the last `window` values, `None` when fewer values exist.
pub fn trailing_sma(values: &[f64], window: usize) -> Option<f64> {
    if window == 0 || values.len() < window {
        return None;
    }
    let slice = &values[values.len() - window..];
    Some(slice.iter().sum::<f64>() / window as f64)
}
