//! PyO3 bindings for imbalance bar extraction.
//!
//! Exposes the Rust implementation to Python:
//! - Imbalance bar type
//! - Stateful batch processor with JSON continuation state
//! - One-shot tick / volume / dollar imbalance bar functions returning columns

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;
use tracing_subscriber::EnvFilter;

use imbalance_core::{
    Bar as RustBar, BarColumns, BatchConfig, Config as RustConfig, ContinuationState,
    Error as RustError, ImbalanceBarConfig, ImbalanceMetric, Tick,
};
use imbalance_ingestion::ImbalanceBarDriver;

fn to_py_err(err: RustError) -> PyErr {
    PyValueError::new_err(err.to_string())
}

/// Zip column arrays into ticks.
fn ticks_from_columns(
    timestamps: Vec<i64>,
    prices: Vec<f64>,
    volumes: Vec<f64>,
) -> PyResult<Vec<Tick>> {
    if timestamps.len() != prices.len() || timestamps.len() != volumes.len() {
        return Err(PyValueError::new_err(format!(
            "column lengths differ: timestamps={}, prices={}, volumes={}",
            timestamps.len(),
            prices.len(),
            volumes.len()
        )));
    }
    Ok(timestamps
        .into_iter()
        .zip(prices)
        .zip(volumes)
        .map(|((ts_ms, price), volume)| Tick::new(ts_ms, price, volume))
        .collect())
}

fn columns_to_dict(py: Python<'_>, cols: BarColumns) -> PyResult<Py<PyDict>> {
    let dict = PyDict::new_bound(py);
    dict.set_item("timestamp", cols.timestamp)?;
    dict.set_item("open", cols.open)?;
    dict.set_item("high", cols.high)?;
    dict.set_item("low", cols.low)?;
    dict.set_item("close", cols.close)?;
    dict.set_item("cumulative_volume", cols.cumulative_volume)?;
    dict.set_item("cumulative_dollar_value", cols.cumulative_dollar_value)?;
    dict.set_item("tick_count", cols.tick_count)?;
    Ok(dict.unbind())
}

// ============================================================================
// Python-exposed Types
// ============================================================================

/// An emitted imbalance bar.
#[pyclass]
#[derive(Clone)]
pub struct Bar {
    inner: RustBar,
}

#[pymethods]
impl Bar {
    #[getter]
    fn ts_ms(&self) -> i64 {
        self.inner.ts_ms
    }

    #[getter]
    fn open(&self) -> f64 {
        self.inner.open
    }

    #[getter]
    fn high(&self) -> f64 {
        self.inner.high
    }

    #[getter]
    fn low(&self) -> f64 {
        self.inner.low
    }

    #[getter]
    fn close(&self) -> f64 {
        self.inner.close
    }

    #[getter]
    fn cum_volume(&self) -> f64 {
        self.inner.cum_volume
    }

    #[getter]
    fn cum_dollar_value(&self) -> f64 {
        self.inner.cum_dollar_value
    }

    #[getter]
    fn tick_count(&self) -> u64 {
        self.inner.tick_count
    }

    #[getter]
    fn vwap(&self) -> Option<f64> {
        self.inner.vwap()
    }

    /// Close time as an RFC 3339 UTC string.
    #[getter]
    fn close_time(&self) -> Option<String> {
        self.inner.close_time().map(|t| t.to_rfc3339())
    }

    fn __repr__(&self) -> String {
        let b = &self.inner;
        format!(
            "Bar(ts_ms={}, o={}, h={}, l={}, c={}, ticks={})",
            b.ts_ms, b.open, b.high, b.low, b.close, b.tick_count
        )
    }
}

impl From<RustBar> for Bar {
    fn from(inner: RustBar) -> Self {
        Bar { inner }
    }
}

// ============================================================================
// Processor
// ============================================================================

/// Stateful imbalance bar processor for one stream, fed batch by batch.
#[pyclass]
pub struct ImbalanceBarProcessor {
    inner: ImbalanceBarDriver,
}

#[pymethods]
impl ImbalanceBarProcessor {
    #[new]
    #[pyo3(signature = (metric, initial_expected_ticks=100_000, num_prev_bars=3, ewma_window_for_bar_length=20))]
    fn new(
        metric: &str,
        initial_expected_ticks: u32,
        num_prev_bars: u32,
        ewma_window_for_bar_length: u32,
    ) -> PyResult<Self> {
        let metric: ImbalanceMetric = metric.parse().map_err(to_py_err)?;
        let config = ImbalanceBarConfig::new(
            initial_expected_ticks,
            num_prev_bars,
            ewma_window_for_bar_length,
        );
        let inner = ImbalanceBarDriver::new(metric, &config).map_err(to_py_err)?;
        Ok(ImbalanceBarProcessor { inner })
    }

    /// Resume a stream from `state_json()` output.
    #[staticmethod]
    #[pyo3(signature = (state_json, initial_expected_ticks=100_000, num_prev_bars=3, ewma_window_for_bar_length=20))]
    fn from_state_json(
        state_json: &str,
        initial_expected_ticks: u32,
        num_prev_bars: u32,
        ewma_window_for_bar_length: u32,
    ) -> PyResult<Self> {
        let state = ContinuationState::from_json(state_json).map_err(to_py_err)?;
        let config = ImbalanceBarConfig::new(
            initial_expected_ticks,
            num_prev_bars,
            ewma_window_for_bar_length,
        );
        let inner = ImbalanceBarDriver::from_state(state, &config).map_err(to_py_err)?;
        Ok(ImbalanceBarProcessor { inner })
    }

    /// Process the next batch; returns the bars it closed.
    fn process_batch(
        &mut self,
        timestamps: Vec<i64>,
        prices: Vec<f64>,
        volumes: Vec<f64>,
    ) -> PyResult<Vec<Bar>> {
        let ticks = ticks_from_columns(timestamps, prices, volumes)?;
        let bars = self.inner.push_batch(&ticks).map_err(to_py_err)?;
        Ok(bars.iter().cloned().map(Bar::from).collect())
    }

    /// Continuation state as JSON.
    fn state_json(&self) -> PyResult<String> {
        self.inner.state().to_json().map_err(to_py_err)
    }

    /// All bars emitted so far, as a dict of columns.
    fn columns(&self, py: Python<'_>) -> PyResult<Py<PyDict>> {
        columns_to_dict(py, self.inner.to_columns())
    }

    #[getter]
    fn metric(&self) -> &'static str {
        self.inner.accumulator().metric().as_str()
    }

    #[getter]
    fn expected_ticks_per_bar(&self) -> f64 {
        self.inner.accumulator().expected_ticks_per_bar()
    }

    #[getter]
    fn batches_processed(&self) -> usize {
        self.inner.batches_processed()
    }
}

// ============================================================================
// One-shot functions
// ============================================================================

#[allow(clippy::too_many_arguments)]
fn run_metric(
    py: Python<'_>,
    metric: ImbalanceMetric,
    timestamps: Vec<i64>,
    prices: Vec<f64>,
    volumes: Vec<f64>,
    initial_expected_ticks: u32,
    num_prev_bars: u32,
    ewma_window_for_bar_length: u32,
    batch_size: usize,
) -> PyResult<Py<PyDict>> {
    let ticks = ticks_from_columns(timestamps, prices, volumes)?;
    let config = RustConfig {
        bars: ImbalanceBarConfig::new(
            initial_expected_ticks,
            num_prev_bars,
            ewma_window_for_bar_length,
        ),
        batch: BatchConfig { batch_size },
    };
    let bars = py
        .allow_threads(|| imbalance_ingestion::imbalance_bars(&ticks, metric, &config))
        .map_err(to_py_err)?;
    columns_to_dict(py, BarColumns::from_bars(&bars))
}

/// Tick imbalance bars as a dict of columns.
#[pyfunction]
#[pyo3(signature = (timestamps, prices, volumes, initial_expected_ticks=100_000, num_prev_bars=3, ewma_window_for_bar_length=20, batch_size=20_000_000))]
#[allow(clippy::too_many_arguments)]
fn tick_imbalance_bars(
    py: Python<'_>,
    timestamps: Vec<i64>,
    prices: Vec<f64>,
    volumes: Vec<f64>,
    initial_expected_ticks: u32,
    num_prev_bars: u32,
    ewma_window_for_bar_length: u32,
    batch_size: usize,
) -> PyResult<Py<PyDict>> {
    run_metric(
        py,
        ImbalanceMetric::TickImbalance,
        timestamps,
        prices,
        volumes,
        initial_expected_ticks,
        num_prev_bars,
        ewma_window_for_bar_length,
        batch_size,
    )
}

/// Volume imbalance bars as a dict of columns.
#[pyfunction]
#[pyo3(signature = (timestamps, prices, volumes, initial_expected_ticks=100_000, num_prev_bars=3, ewma_window_for_bar_length=20, batch_size=20_000_000))]
#[allow(clippy::too_many_arguments)]
fn volume_imbalance_bars(
    py: Python<'_>,
    timestamps: Vec<i64>,
    prices: Vec<f64>,
    volumes: Vec<f64>,
    initial_expected_ticks: u32,
    num_prev_bars: u32,
    ewma_window_for_bar_length: u32,
    batch_size: usize,
) -> PyResult<Py<PyDict>> {
    run_metric(
        py,
        ImbalanceMetric::VolumeImbalance,
        timestamps,
        prices,
        volumes,
        initial_expected_ticks,
        num_prev_bars,
        ewma_window_for_bar_length,
        batch_size,
    )
}

/// Dollar imbalance bars as a dict of columns.
#[pyfunction]
#[pyo3(signature = (timestamps, prices, volumes, initial_expected_ticks=100_000, num_prev_bars=3, ewma_window_for_bar_length=20, batch_size=20_000_000))]
#[allow(clippy::too_many_arguments)]
fn dollar_imbalance_bars(
    py: Python<'_>,
    timestamps: Vec<i64>,
    prices: Vec<f64>,
    volumes: Vec<f64>,
    initial_expected_ticks: u32,
    num_prev_bars: u32,
    ewma_window_for_bar_length: u32,
    batch_size: usize,
) -> PyResult<Py<PyDict>> {
    run_metric(
        py,
        ImbalanceMetric::DollarImbalance,
        timestamps,
        prices,
        volumes,
        initial_expected_ticks,
        num_prev_bars,
        ewma_window_for_bar_length,
        batch_size,
    )
}

/// Install a stderr tracing subscriber. `level` is an env-filter directive
/// (e.g. "debug"); without it `RUST_LOG` is used, falling back to "info".
/// Calling it again is a no-op.
#[pyfunction]
#[pyo3(signature = (level=None))]
fn init_logging(level: Option<&str>) -> PyResult<()> {
    let filter = match level {
        Some(directive) => {
            EnvFilter::try_new(directive).map_err(|err| PyValueError::new_err(err.to_string()))?
        }
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
    {
        tracing::debug!(level = ?level, "Logging initialized");
    }
    Ok(())
}

// ============================================================================
// Module Definition
// ============================================================================

/// Imbalance Bars - tick, volume and dollar imbalance bars in Rust.
#[pymodule]
fn imbalance_bars(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Types
    m.add_class::<Bar>()?;
    m.add_class::<ImbalanceBarProcessor>()?;

    // Functions
    m.add_function(wrap_pyfunction!(tick_imbalance_bars, m)?)?;
    m.add_function(wrap_pyfunction!(volume_imbalance_bars, m)?)?;
    m.add_function(wrap_pyfunction!(dollar_imbalance_bars, m)?)?;
    m.add_function(wrap_pyfunction!(init_logging, m)?)?;

    Ok(())
}
