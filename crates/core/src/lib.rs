//! Core types and configuration for imbalance bar extraction.
//!
//! This crate provides shared types used across all other crates:
//! - Market data types (ticks, tick rules, bars)
//! - Continuation state carried between batches
//! - Configuration structures
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use config::{BatchConfig, Config, ImbalanceBarConfig};
pub use error::{Error, Result};
pub use types::*;
