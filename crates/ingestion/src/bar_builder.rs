//! Running totals of the bar currently being built.
//!
//! Reset every time a bar is emitted. Histories that outlive a bar are held by
//! the accumulator, not here.

use imbalance_core::{Bar, TickState, TimestampMs};

/// A bar that's currently being built.
#[derive(Debug, Clone, PartialEq)]
pub struct BarInProgress {
    open: Option<f64>,
    high: f64,
    low: f64,
    cum_volume: f64,
    cum_dollar_value: f64,
    cum_ticks: u64,
    cum_theta: f64,
}

impl Default for BarInProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl BarInProgress {
    /// Fresh counters: zero sums and inverted extrema.
    pub fn new() -> Self {
        Self {
            open: None,
            high: f64::NEG_INFINITY,
            low: f64::INFINITY,
            cum_volume: 0.0,
            cum_dollar_value: 0.0,
            cum_ticks: 0,
            cum_theta: 0.0,
        }
    }

    /// Restore counters from a tick snapshot.
    pub fn from_tick_state(state: &TickState) -> Self {
        Self {
            open: state.bar_open,
            high: state.high,
            low: state.low,
            cum_volume: state.cum_volume,
            cum_dollar_value: state.cum_dollar_value,
            cum_ticks: state.cum_ticks,
            cum_theta: state.cum_theta,
        }
    }

    /// Add a tick and its signed imbalance.
    pub fn add_tick(&mut self, price: f64, volume: f64, imbalance: f64) {
        if self.open.is_none() {
            self.open = Some(price);
        }
        self.cum_ticks += 1;
        self.cum_dollar_value += price * volume;
        self.cum_volume += volume;
        self.cum_theta += imbalance;

        if price > self.high {
            self.high = price;
        }
        // Ties move the low as well.
        if price <= self.low {
            self.low = price;
        }
    }

    /// Close the bar at the given tick.
    ///
    /// Returns `None` if no tick has been added.
    pub fn to_bar(&self, ts_ms: TimestampMs, close: f64) -> Option<Bar> {
        let open = self.open?;
        Some(Bar {
            ts_ms,
            open,
            high: self.high,
            low: self.low.min(open),
            close,
            cum_volume: self.cum_volume,
            cum_dollar_value: self.cum_dollar_value,
            tick_count: self.cum_ticks,
        })
    }

    /// Reset to fresh counters.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn open(&self) -> Option<f64> {
        self.open
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn cum_volume(&self) -> f64 {
        self.cum_volume
    }

    pub fn cum_dollar_value(&self) -> f64 {
        self.cum_dollar_value
    }

    pub fn cum_ticks(&self) -> u64 {
        self.cum_ticks
    }

    /// Signed imbalance accumulated so far (theta).
    pub fn cum_theta(&self) -> f64 {
        self.cum_theta
    }
}
