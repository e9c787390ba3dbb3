//! In-memory batch driver.
//!
//! Feeds consecutive batches of one stream to an [`ImbalanceAccumulator`],
//! rejects timestamps that go backwards, and collects the emitted bars.

use crate::accumulator::ImbalanceAccumulator;
use imbalance_core::{
    Bar, BarColumns, Config, ContinuationState, Error, ImbalanceBarConfig, ImbalanceMetric,
    Result, Tick, TimestampMs,
};
use tracing::info;

/// Check that timestamps never decrease, starting after `prev_ts_ms`.
///
/// Equal timestamps are allowed.
pub fn validate_timestamps(ticks: &[Tick], prev_ts_ms: Option<TimestampMs>) -> Result<()> {
    let mut prev = prev_ts_ms;
    for (index, tick) in ticks.iter().enumerate() {
        if let Some(prev_ts) = prev {
            if tick.ts_ms < prev_ts {
                return Err(Error::invalid_input(format!(
                    "ticks not time-ordered at index {}: {} after {}",
                    index, tick.ts_ms, prev_ts
                )));
            }
        }
        prev = Some(tick.ts_ms);
    }
    Ok(())
}

/// Drives one stream through the accumulator batch by batch.
#[derive(Debug, Clone)]
pub struct ImbalanceBarDriver {
    accumulator: ImbalanceAccumulator,
    bars: Vec<Bar>,
    batches_processed: usize,
}

impl ImbalanceBarDriver {
    /// Create a driver for a new stream.
    pub fn new(metric: ImbalanceMetric, config: &ImbalanceBarConfig) -> Result<Self> {
        Ok(Self {
            accumulator: ImbalanceAccumulator::new(metric, config)?,
            bars: Vec::new(),
            batches_processed: 0,
        })
    }

    /// Resume a stream from a saved continuation state.
    pub fn from_state(state: ContinuationState, config: &ImbalanceBarConfig) -> Result<Self> {
        Ok(Self {
            accumulator: ImbalanceAccumulator::from_state(state, config)?,
            bars: Vec::new(),
            batches_processed: 0,
        })
    }

    /// Process the next batch and return the bars it closed.
    ///
    /// Empty batches are skipped and not counted.
    pub fn push_batch(&mut self, ticks: &[Tick]) -> Result<&[Bar]> {
        if ticks.is_empty() {
            return Ok(&[]);
        }
        let prev_ts = self.accumulator.last_tick().map(|t| t.ts_ms);
        validate_timestamps(ticks, prev_ts)?;

        let output = self.accumulator.process_batch(ticks)?;
        let start = self.bars.len();
        self.bars.extend(output.bars);

        info!(
            batch = self.batches_processed,
            ticks = ticks.len(),
            first_tick = ?ticks[0].datetime(),
            bars = self.bars.len() - start,
            total_bars = self.bars.len(),
            "Batch processed"
        );
        self.batches_processed += 1;

        Ok(&self.bars[start..])
    }

    /// Process a whole in-memory stream in batches of `batch_size` ticks.
    pub fn run(&mut self, ticks: &[Tick], batch_size: usize) -> Result<()> {
        if batch_size == 0 {
            return Err(Error::invalid_configuration("batch_size must be at least 1"));
        }
        for batch in ticks.chunks(batch_size) {
            self.push_batch(batch)?;
        }
        Ok(())
    }

    /// All bars emitted so far.
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    /// Number of non-empty batches processed.
    pub fn batches_processed(&self) -> usize {
        self.batches_processed
    }

    pub fn accumulator(&self) -> &ImbalanceAccumulator {
        &self.accumulator
    }

    /// Copy of the continuation state.
    pub fn state(&self) -> ContinuationState {
        self.accumulator.state()
    }

    /// Take the emitted bars, dropping the stream state.
    pub fn into_bars(self) -> Vec<Bar> {
        self.bars
    }

    /// Bars emitted so far as a column table.
    pub fn to_columns(&self) -> BarColumns {
        BarColumns::from_bars(&self.bars)
    }
}

/// Run a whole in-memory stream with the given metric.
pub fn imbalance_bars(
    ticks: &[Tick],
    metric: ImbalanceMetric,
    config: &Config,
) -> Result<Vec<Bar>> {
    config.validate()?;
    let mut driver = ImbalanceBarDriver::new(metric, &config.bars)?;
    driver.run(ticks, config.batch.batch_size)?;
    Ok(driver.into_bars())
}

/// Tick imbalance bars for an in-memory stream.
pub fn tick_imbalance_bars(ticks: &[Tick], config: &Config) -> Result<Vec<Bar>> {
    imbalance_bars(ticks, ImbalanceMetric::TickImbalance, config)
}

/// Volume imbalance bars for an in-memory stream.
pub fn volume_imbalance_bars(ticks: &[Tick], config: &Config) -> Result<Vec<Bar>> {
    imbalance_bars(ticks, ImbalanceMetric::VolumeImbalance, config)
}

/// Dollar imbalance bars for an in-memory stream.
pub fn dollar_imbalance_bars(ticks: &[Tick], config: &Config) -> Result<Vec<Bar>> {
    imbalance_bars(ticks, ImbalanceMetric::DollarImbalance, config)
}
