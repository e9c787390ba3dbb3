//! Core data types for imbalance bar extraction.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Timestamp in milliseconds since Unix epoch (UTC).
pub type TimestampMs = i64;

/// A single raw tick (trade print).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Timestamp in milliseconds.
    pub ts_ms: TimestampMs,
    /// Trade price.
    pub price: f64,
    /// Traded volume.
    pub volume: f64,
}

impl Tick {
    /// Create a tick.
    pub fn new(ts_ms: TimestampMs, price: f64, volume: f64) -> Self {
        Self { ts_ms, price, volume }
    }

    /// Traded dollar value (price * volume).
    #[inline]
    pub fn dollar_value(&self) -> f64 {
        self.price * self.volume
    }

    /// Timestamp as a UTC datetime, if representable.
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.ts_ms)
    }

    /// Check that price is finite and volume is finite and non-negative.
    pub fn validate(&self) -> Result<()> {
        if !self.price.is_finite() {
            return Err(Error::invalid_input(format!(
                "non-finite price {} at ts_ms={}",
                self.price, self.ts_ms
            )));
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(Error::invalid_input(format!(
                "volume must be finite and non-negative, got {} at ts_ms={}",
                self.volume, self.ts_ms
            )));
        }
        Ok(())
    }
}

/// Trade aggressor sign inferred from consecutive price changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(i8)]
pub enum TickRule {
    /// Price rose (buyer-initiated).
    Uptick = 1,
    /// Price fell (seller-initiated).
    Downtick = -1,
    /// No prior price movement to infer from.
    #[default]
    Unclassified = 0,
}

impl TickRule {
    /// Get the sign as i8.
    #[inline]
    pub fn sign(self) -> i8 {
        self as i8
    }

    /// Get the sign as f64.
    #[inline]
    pub fn sign_f64(self) -> f64 {
        self.sign() as f64
    }
}

/// Quantity whose signed accumulation decides when a bar closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImbalanceMetric {
    /// Signed tick count.
    TickImbalance,
    /// Signed traded volume.
    VolumeImbalance,
    /// Signed traded dollar value.
    DollarImbalance,
}

impl ImbalanceMetric {
    /// All metrics.
    pub const ALL: [ImbalanceMetric; 3] = [
        ImbalanceMetric::TickImbalance,
        ImbalanceMetric::VolumeImbalance,
        ImbalanceMetric::DollarImbalance,
    ];

    /// Signed imbalance contributed by one tick.
    #[inline]
    pub fn contribution(self, rule: TickRule, price: f64, volume: f64) -> f64 {
        let sign = rule.sign_f64();
        match self {
            ImbalanceMetric::TickImbalance => sign,
            ImbalanceMetric::VolumeImbalance => sign * volume,
            ImbalanceMetric::DollarImbalance => sign * volume * price,
        }
    }

    /// Canonical name.
    pub fn as_str(self) -> &'static str {
        match self {
            ImbalanceMetric::TickImbalance => "tick_imbalance",
            ImbalanceMetric::VolumeImbalance => "volume_imbalance",
            ImbalanceMetric::DollarImbalance => "dollar_imbalance",
        }
    }
}

impl fmt::Display for ImbalanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImbalanceMetric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "tick_imbalance" => Ok(ImbalanceMetric::TickImbalance),
            "volume_imbalance" => Ok(ImbalanceMetric::VolumeImbalance),
            "dollar_imbalance" => Ok(ImbalanceMetric::DollarImbalance),
            other => Err(Error::invalid_configuration(format!(
                "unknown imbalance metric '{}'",
                other
            ))),
        }
    }
}

/// An emitted imbalance bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Timestamp of the closing tick (ms).
    pub ts_ms: TimestampMs,
    /// Open price.
    pub open: f64,
    /// High price.
    pub high: f64,
    /// Low price.
    pub low: f64,
    /// Close price.
    pub close: f64,
    /// Total volume.
    pub cum_volume: f64,
    /// Total dollar value.
    pub cum_dollar_value: f64,
    /// Number of ticks.
    pub tick_count: u64,
}

impl Bar {
    /// Column names of the bar table, in order.
    pub const COLUMNS: [&'static str; 8] = [
        "timestamp",
        "open",
        "high",
        "low",
        "close",
        "cumulative_volume",
        "cumulative_dollar_value",
        "tick_count",
    ];

    /// Close time as a UTC datetime, if representable.
    pub fn close_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.ts_ms)
    }

    /// Volume-weighted average price, if any volume traded.
    pub fn vwap(&self) -> Option<f64> {
        if self.cum_volume > 0.0 {
            Some(self.cum_dollar_value / self.cum_volume)
        } else {
            None
        }
    }
}

/// Columnar form of a bar sequence, in [`Bar::COLUMNS`] order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BarColumns {
    pub timestamp: Vec<TimestampMs>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub cumulative_volume: Vec<f64>,
    pub cumulative_dollar_value: Vec<f64>,
    pub tick_count: Vec<u64>,
}

impl BarColumns {
    /// Transpose bars into columns.
    pub fn from_bars(bars: &[Bar]) -> Self {
        let mut cols = Self::with_capacity(bars.len());
        for bar in bars {
            cols.push(bar);
        }
        cols
    }

    /// Create empty columns with room for `n` rows.
    pub fn with_capacity(n: usize) -> Self {
        Self {
            timestamp: Vec::with_capacity(n),
            open: Vec::with_capacity(n),
            high: Vec::with_capacity(n),
            low: Vec::with_capacity(n),
            close: Vec::with_capacity(n),
            cumulative_volume: Vec::with_capacity(n),
            cumulative_dollar_value: Vec::with_capacity(n),
            tick_count: Vec::with_capacity(n),
        }
    }

    /// Append one bar as a row.
    pub fn push(&mut self, bar: &Bar) {
        self.timestamp.push(bar.ts_ms);
        self.open.push(bar.open);
        self.high.push(bar.high);
        self.low.push(bar.low);
        self.close.push(bar.close);
        self.cumulative_volume.push(bar.cum_volume);
        self.cumulative_dollar_value.push(bar.cum_dollar_value);
        self.tick_count.push(bar.tick_count);
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.timestamp.len()
    }

    /// Whether there are no rows.
    pub fn is_empty(&self) -> bool {
        self.timestamp.is_empty()
    }
}

/// Snapshot of the running counters after a tick was processed.
///
/// Counters reflect the state after a possible bar emission, so the snapshot
/// of a closing tick shows zeroed sums and reset extrema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickState {
    /// Tick timestamp (ms).
    pub ts_ms: TimestampMs,
    /// Tick price.
    pub price: f64,
    /// Running high of the bar in progress (-inf after a reset).
    #[serde(serialize_with = "serialize_extremum", deserialize_with = "deserialize_high")]
    pub high: f64,
    /// Running low of the bar in progress (+inf after a reset).
    #[serde(serialize_with = "serialize_extremum", deserialize_with = "deserialize_low")]
    pub low: f64,
    /// Tick rule of this tick.
    pub tick_rule: TickRule,
    /// Volume of the bar in progress.
    pub cum_volume: f64,
    /// Dollar value of the bar in progress.
    pub cum_dollar_value: f64,
    /// Ticks in the bar in progress.
    pub cum_ticks: u64,
    /// Signed imbalance of the bar in progress (theta).
    pub cum_theta: f64,
    /// Expected ticks per bar in effect for the bar in progress.
    pub expected_ticks_per_bar: f64,
    /// Open price of the bar in progress, if it has a tick.
    pub bar_open: Option<f64>,
}

fn serialize_extremum<S: Serializer>(
    value: &f64,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_some(value)
    } else {
        serializer.serialize_none()
    }
}

fn deserialize_high<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NEG_INFINITY))
}

fn deserialize_low<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
}

/// State carried from one batch to the next for a single stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuationState {
    /// Metric the stream is being sampled with.
    pub metric: ImbalanceMetric,
    /// Snapshot after the last processed tick (None before the first tick).
    pub last_tick: Option<TickState>,
    /// Every imbalance contribution since the start of the stream.
    pub imbalance_history: Vec<f64>,
    /// Tick count of every completed bar.
    pub bar_lengths: Vec<u64>,
}

impl ContinuationState {
    /// State of a stream that has not seen any tick.
    pub fn new(metric: ImbalanceMetric) -> Self {
        Self {
            metric,
            last_tick: None,
            imbalance_history: Vec::new(),
            bar_lengths: Vec::new(),
        }
    }

    /// Whether no tick has been processed yet.
    pub fn is_fresh(&self) -> bool {
        self.last_tick.is_none()
    }

    /// Number of ticks processed since the start of the stream.
    pub fn ticks_processed(&self) -> usize {
        self.imbalance_history.len()
    }

    /// Number of bars emitted since the start of the stream.
    pub fn bars_emitted(&self) -> usize {
        self.bar_lengths.len()
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
