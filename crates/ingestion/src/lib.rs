//! Imbalance bar extraction from raw tick streams.
//!
//! This crate handles:
//! - Tick-rule trade side inference
//! - EWMA estimation of expected imbalance and bar length
//! - Tick, volume and dollar imbalance bar emission
//! - Batch-to-batch continuation of a stream

pub mod accumulator;
pub mod bar_builder;
pub mod classifier;
pub mod driver;
pub mod ewma;

pub use accumulator::{process_batch, BatchOutput, ImbalanceAccumulator};
pub use bar_builder::BarInProgress;
pub use classifier::TickRuleClassifier;
pub use driver::{
    dollar_imbalance_bars, imbalance_bars, tick_imbalance_bars, validate_timestamps,
    volume_imbalance_bars, ImbalanceBarDriver,
};
pub use ewma::{ewma, ewma_last};
