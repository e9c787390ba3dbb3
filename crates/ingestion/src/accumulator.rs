//! Imbalance bar extraction.
//!
//! Each tick is labelled with the tick rule, turned into a signed imbalance
//! for the chosen metric and added to the running imbalance (theta) of the bar
//! in progress. A bar closes when
//!
//! ```text
//! |theta| > E[T] * |E[b]|
//! ```
//!
//! where `E[T]` is the expected number of ticks per bar (EWMA of previous bar
//! lengths) and `E[b]` the expected imbalance per tick (EWMA of the last
//! `round(E[T] * num_prev_bars)` imbalances). `E[b]` is undefined until the
//! imbalance history holds at least `E[T]` entries; no bar closes before that.
//!
//! Processing is strictly sequential. Splitting a stream into batches and
//! carrying the [`ContinuationState`] between them yields the same bars as a
//! single pass.

use crate::bar_builder::BarInProgress;
use crate::classifier::TickRuleClassifier;
use crate::ewma::ewma_last;
use imbalance_core::{
    Bar, ContinuationState, Error, ImbalanceBarConfig, ImbalanceMetric, Result, Tick, TickRule,
    TickState,
};
use std::num::NonZeroUsize;
use tracing::{debug, trace};

/// Bars and per-tick snapshots produced by one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutput {
    /// Bars closed during the batch, in order.
    pub bars: Vec<Bar>,
    /// One snapshot per processed tick, taken after any bar emission.
    pub cache: Vec<TickState>,
}

/// Stateful imbalance bar extractor for a single stream.
#[derive(Debug, Clone)]
pub struct ImbalanceAccumulator {
    metric: ImbalanceMetric,
    num_prev_bars: f64,
    bar_length_window: NonZeroUsize,
    classifier: TickRuleClassifier,
    bar: BarInProgress,
    expected_ticks_per_bar: f64,
    imbalance_history: Vec<f64>,
    bar_lengths: Vec<u64>,
    last_tick: Option<TickState>,
}

impl ImbalanceAccumulator {
    /// Create an accumulator for a new stream.
    pub fn new(metric: ImbalanceMetric, config: &ImbalanceBarConfig) -> Result<Self> {
        Self::from_state(ContinuationState::new(metric), config)
    }

    /// Continue a stream from the state returned by a previous batch.
    pub fn from_state(state: ContinuationState, config: &ImbalanceBarConfig) -> Result<Self> {
        config.validate()?;
        let bar_length_window = config.bar_length_window()?;
        validate_state(&state)?;

        let ContinuationState {
            metric,
            last_tick,
            imbalance_history,
            bar_lengths,
        } = state;

        let (classifier, bar, expected_ticks_per_bar) = match &last_tick {
            Some(tick) => (
                TickRuleClassifier::resume(tick.price, tick.tick_rule),
                BarInProgress::from_tick_state(tick),
                tick.expected_ticks_per_bar,
            ),
            None => (
                TickRuleClassifier::new(),
                BarInProgress::new(),
                config.initial_expected_ticks as f64,
            ),
        };

        Ok(Self {
            metric,
            num_prev_bars: config.num_prev_bars as f64,
            bar_length_window,
            classifier,
            bar,
            expected_ticks_per_bar,
            imbalance_history,
            bar_lengths,
            last_tick,
        })
    }

    /// Process one batch of ticks in arrival order.
    ///
    /// The whole batch is validated first; on error no state changes. An
    /// empty batch is a no-op.
    pub fn process_batch(&mut self, ticks: &[Tick]) -> Result<BatchOutput> {
        for tick in ticks {
            tick.validate()?;
        }

        let mut output = BatchOutput {
            bars: Vec::new(),
            cache: Vec::with_capacity(ticks.len()),
        };
        self.imbalance_history.reserve(ticks.len());

        for tick in ticks {
            let (bar, snapshot) = self.process_tick(tick);
            if let Some(bar) = bar {
                output.bars.push(bar);
            }
            output.cache.push(snapshot);
        }

        debug!(
            metric = %self.metric,
            ticks = ticks.len(),
            bars = output.bars.len(),
            expected_ticks_per_bar = self.expected_ticks_per_bar,
            "Processed batch"
        );

        Ok(output)
    }

    fn process_tick(&mut self, tick: &Tick) -> (Option<Bar>, TickState) {
        let rule = self.classifier.classify(tick.price);
        let imbalance = self.metric.contribution(rule, tick.price, tick.volume);
        self.imbalance_history.push(imbalance);
        self.bar.add_tick(tick.price, tick.volume, imbalance);

        let threshold = self
            .expected_imbalance_per_tick()
            .map(|expected| self.expected_ticks_per_bar * expected.abs());
        trace!(
            ts_ms = tick.ts_ms,
            theta = self.bar.cum_theta(),
            threshold = ?threshold,
            "Imbalance check"
        );

        let bar = match threshold {
            Some(threshold) if self.bar.cum_theta().abs() > threshold => self.close_bar(tick),
            _ => None,
        };

        let snapshot = self.snapshot(tick, rule);
        self.last_tick = Some(snapshot.clone());
        (bar, snapshot)
    }

    fn close_bar(&mut self, tick: &Tick) -> Option<Bar> {
        let bar = self.bar.to_bar(tick.ts_ms, tick.price)?;

        self.bar_lengths.push(bar.tick_count);
        let start = self
            .bar_lengths
            .len()
            .saturating_sub(self.bar_length_window.get());
        let lengths = self.bar_lengths[start..].iter().map(|&n| n as f64);
        if let Some(expected) = ewma_last(lengths, self.bar_length_window) {
            self.expected_ticks_per_bar = expected;
        }
        self.bar.reset();

        debug!(
            ts_ms = bar.ts_ms,
            close_time = ?bar.close_time(),
            tick_count = bar.tick_count,
            expected_ticks_per_bar = self.expected_ticks_per_bar,
            "Imbalance bar closed"
        );
        Some(bar)
    }

    fn snapshot(&self, tick: &Tick, rule: TickRule) -> TickState {
        TickState {
            ts_ms: tick.ts_ms,
            price: tick.price,
            high: self.bar.high(),
            low: self.bar.low(),
            tick_rule: rule,
            cum_volume: self.bar.cum_volume(),
            cum_dollar_value: self.bar.cum_dollar_value(),
            cum_ticks: self.bar.cum_ticks(),
            cum_theta: self.bar.cum_theta(),
            expected_ticks_per_bar: self.expected_ticks_per_bar,
            bar_open: self.bar.open(),
        }
    }

    /// Expected imbalance per tick, or `None` while the history is shorter
    /// than the expected ticks per bar.
    pub fn expected_imbalance_per_tick(&self) -> Option<f64> {
        let len = self.imbalance_history.len();
        if (len as f64) < self.expected_ticks_per_bar {
            return None;
        }
        let span = (self.expected_ticks_per_bar * self.num_prev_bars).round().max(1.0) as usize;
        let window = NonZeroUsize::new(span)?;
        let start = len.saturating_sub(span);
        ewma_last(self.imbalance_history[start..].iter().copied(), window)
    }

    /// Expected ticks per bar used for the bar in progress.
    pub fn expected_ticks_per_bar(&self) -> f64 {
        self.expected_ticks_per_bar
    }

    pub fn metric(&self) -> ImbalanceMetric {
        self.metric
    }

    /// Running totals of the bar in progress.
    pub fn bar_in_progress(&self) -> &BarInProgress {
        &self.bar
    }

    /// Tick count of every completed bar.
    pub fn bar_lengths(&self) -> &[u64] {
        &self.bar_lengths
    }

    /// Snapshot after the last processed tick.
    pub fn last_tick(&self) -> Option<&TickState> {
        self.last_tick.as_ref()
    }

    /// Tick-rule classifier of the stream.
    pub fn classifier(&self) -> &TickRuleClassifier {
        &self.classifier
    }

    /// Copy of the continuation state.
    pub fn state(&self) -> ContinuationState {
        ContinuationState {
            metric: self.metric,
            last_tick: self.last_tick.clone(),
            imbalance_history: self.imbalance_history.clone(),
            bar_lengths: self.bar_lengths.clone(),
        }
    }

    /// Consume the accumulator, handing back its continuation state.
    pub fn into_state(self) -> ContinuationState {
        ContinuationState {
            metric: self.metric,
            last_tick: self.last_tick,
            imbalance_history: self.imbalance_history,
            bar_lengths: self.bar_lengths,
        }
    }
}

/// Reject continuation states that could not have been produced by a stream.
fn validate_state(state: &ContinuationState) -> Result<()> {
    match &state.last_tick {
        None => {
            if !state.imbalance_history.is_empty() || !state.bar_lengths.is_empty() {
                return Err(Error::continuation_mismatch(
                    "state has history but no last tick",
                ));
            }
        }
        Some(tick) => {
            if state.imbalance_history.is_empty() {
                return Err(Error::continuation_mismatch(
                    "state has a last tick but no imbalance history",
                ));
            }
            if !(tick.expected_ticks_per_bar.is_finite() && tick.expected_ticks_per_bar > 0.0) {
                return Err(Error::continuation_mismatch(format!(
                    "expected ticks per bar must be positive, got {}",
                    tick.expected_ticks_per_bar
                )));
            }
        }
    }
    Ok(())
}

/// Process one batch of a stream, updating the caller-owned state in place.
///
/// Pass [`ContinuationState::new`] for the first batch and the same state
/// object for every following batch, in arrival order. On error the state is
/// left untouched.
pub fn process_batch(
    ticks: &[Tick],
    metric: ImbalanceMetric,
    config: &ImbalanceBarConfig,
    state: &mut ContinuationState,
) -> Result<BatchOutput> {
    config.validate()?;
    if state.metric != metric {
        return Err(Error::continuation_mismatch(format!(
            "state was built for {}, not {}",
            state.metric, metric
        )));
    }
    validate_state(state)?;
    for tick in ticks {
        tick.validate()?;
    }
    if ticks.is_empty() {
        return Ok(BatchOutput::default());
    }

    let prior = std::mem::replace(state, ContinuationState::new(metric));
    let mut accumulator = ImbalanceAccumulator::from_state(prior, config)?;
    let output = accumulator.process_batch(ticks)?;
    *state = accumulator.into_state();
    Ok(output)
}
