//! Configuration structures for imbalance bar extraction.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::Path;

/// Main configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Imbalance bar estimation parameters.
    pub bars: ImbalanceBarConfig,
    /// Batch driver configuration.
    pub batch: BatchConfig,
}

impl Config {
    /// Parse a configuration from a JSON document. Missing sections use defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Check every section.
    pub fn validate(&self) -> Result<()> {
        self.bars.validate()?;
        self.batch.validate()
    }
}

/// Parameters of the adaptive imbalance threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImbalanceBarConfig {
    /// Initial guess of the number of ticks in a bar.
    pub initial_expected_ticks: u32,
    /// Number of previous bars spanned by the expected-imbalance EWMA
    /// (window = num_prev_bars * expected ticks per bar).
    pub num_prev_bars: u32,
    /// EWMA window over previous bar lengths for the expected ticks per bar.
    pub ewma_window_for_bar_length: u32,
}

impl Default for ImbalanceBarConfig {
    fn default() -> Self {
        Self {
            initial_expected_ticks: 100_000,
            num_prev_bars: 3,
            ewma_window_for_bar_length: 20,
        }
    }
}

impl ImbalanceBarConfig {
    /// Create a configuration from its three parameters.
    pub fn new(
        initial_expected_ticks: u32,
        num_prev_bars: u32,
        ewma_window_for_bar_length: u32,
    ) -> Self {
        Self {
            initial_expected_ticks,
            num_prev_bars,
            ewma_window_for_bar_length,
        }
    }

    /// Reject degenerate values before any tick is processed.
    pub fn validate(&self) -> Result<()> {
        if self.initial_expected_ticks < 1 {
            return Err(Error::invalid_configuration(
                "initial_expected_ticks must be at least 1",
            ));
        }
        if self.num_prev_bars < 1 {
            return Err(Error::invalid_configuration(
                "num_prev_bars must be at least 1",
            ));
        }
        if self.ewma_window_for_bar_length < 1 {
            return Err(Error::invalid_configuration(
                "ewma_window_for_bar_length must be at least 1",
            ));
        }
        Ok(())
    }

    /// Bar-length EWMA window, checked non-zero.
    pub fn bar_length_window(&self) -> Result<NonZeroUsize> {
        NonZeroUsize::new(self.ewma_window_for_bar_length as usize).ok_or_else(|| {
            Error::invalid_configuration("ewma_window_for_bar_length must be at least 1")
        })
    }
}

/// Batch driver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Number of ticks handed to the accumulator per batch.
    pub batch_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 20_000_000,
        }
    }
}

impl BatchConfig {
    /// Reject a zero batch size.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::invalid_configuration("batch_size must be at least 1"));
        }
        Ok(())
    }
}
