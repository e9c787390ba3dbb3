//! Cross-batch properties of imbalance bar extraction.
//!
//! A stream split into batches of any size, with the continuation state carried
//! between them, must produce exactly the bars of a single pass.

use imbalance_core::{Bar, ContinuationState, ImbalanceBarConfig, ImbalanceMetric, Tick};
use imbalance_ingestion::{process_batch, ImbalanceAccumulator};
use proptest::prelude::*;

const START_TS: i64 = 1_700_000_000_000;

/// Random walk in half-point steps (zero moves included). Pairs of ticks
/// share a timestamp.
fn tick_stream() -> impl Strategy<Value = Vec<Tick>> {
    prop::collection::vec((-2i32..=2, 0u32..12), 1..400).prop_map(|moves| {
        let mut price = 1_000.0;
        moves
            .into_iter()
            .enumerate()
            .map(|(i, (step, volume))| {
                price += f64::from(step) * 0.5;
                Tick::new(START_TS + (i as i64 / 2) * 250, price, f64::from(volume))
            })
            .collect()
    })
}

fn bar_config() -> impl Strategy<Value = ImbalanceBarConfig> {
    (1u32..12, 1u32..4, 1u32..6)
        .prop_map(|(initial, num_prev, window)| ImbalanceBarConfig::new(initial, num_prev, window))
}

fn any_metric() -> impl Strategy<Value = ImbalanceMetric> {
    prop::sample::select(ImbalanceMetric::ALL.to_vec())
}

fn batch_sizes() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(1usize..40, 1..20)
}

/// Zig-zag prices with a slow upward drift.
fn zigzag(n: i64) -> Vec<Tick> {
    (0..n)
        .map(|i| {
            let price = 100.0 + (i / 4) as f64 * 0.5 + if i % 3 == 0 { -0.25 } else { 0.25 };
            Tick::new(START_TS + i * 100, price, 1.0 + (i % 5) as f64)
        })
        .collect()
}

fn single_pass(
    ticks: &[Tick],
    metric: ImbalanceMetric,
    config: &ImbalanceBarConfig,
) -> (Vec<Bar>, ContinuationState) {
    let mut acc = ImbalanceAccumulator::new(metric, config).unwrap();
    let bars = acc.process_batch(ticks).unwrap().bars;
    (bars, acc.into_state())
}

/// Feed `ticks` in consecutive batches, cycling through `sizes`. With
/// `via_json` the state is saved and reloaded after every batch.
fn batched(
    ticks: &[Tick],
    metric: ImbalanceMetric,
    config: &ImbalanceBarConfig,
    sizes: &[usize],
    via_json: bool,
) -> (Vec<Bar>, ContinuationState) {
    let mut state = ContinuationState::new(metric);
    let mut bars = Vec::new();
    let mut pos = 0;
    for size in sizes.iter().cycle() {
        if pos >= ticks.len() {
            break;
        }
        let end = (pos + size).min(ticks.len());
        bars.extend(process_batch(&ticks[pos..end], metric, config, &mut state).unwrap().bars);
        if via_json {
            state = ContinuationState::from_json(&state.to_json().unwrap()).unwrap();
        }
        pos = end;
    }
    (bars, state)
}

proptest! {
    /// One batch size for the whole stream.
    #[test]
    fn test_fixed_batch_sizes_match_single_pass(
        ticks in tick_stream(),
        config in bar_config(),
        metric in any_metric(),
        size in 1usize..64,
    ) {
        let (whole, final_state) = single_pass(&ticks, metric, &config);
        let (bars, state) = batched(&ticks, metric, &config, &[size], false);
        prop_assert_eq!(bars, whole);
        prop_assert_eq!(state, final_state);
    }

    #[test]
    fn test_uneven_batch_sizes_match_single_pass(
        ticks in tick_stream(),
        config in bar_config(),
        metric in any_metric(),
        sizes in batch_sizes(),
    ) {
        let (whole, final_state) = single_pass(&ticks, metric, &config);
        let (bars, state) = batched(&ticks, metric, &config, &sizes, false);
        prop_assert_eq!(bars, whole);
        prop_assert_eq!(state, final_state);
    }

    #[test]
    fn test_state_round_trips_through_json_between_batches(
        ticks in tick_stream(),
        config in bar_config(),
        metric in any_metric(),
        sizes in batch_sizes(),
    ) {
        let (whole, final_state) = single_pass(&ticks, metric, &config);
        let (bars, state) = batched(&ticks, metric, &config, &sizes, true);
        prop_assert_eq!(bars, whole);
        prop_assert_eq!(state, final_state);
    }

    #[test]
    fn test_bars_respect_ohlc_bounds(
        ticks in tick_stream(),
        config in bar_config(),
        metric in any_metric(),
    ) {
        for bar in single_pass(&ticks, metric, &config).0 {
            prop_assert!(bar.low <= bar.open.min(bar.close), "{:?}", bar);
            prop_assert!(bar.high >= bar.open.max(bar.close), "{:?}", bar);
        }
    }

    #[test]
    fn test_tick_counts_partition_the_stream(
        ticks in tick_stream(),
        config in bar_config(),
        metric in any_metric(),
    ) {
        let (bars, state) = single_pass(&ticks, metric, &config);
        let mut start = 0usize;
        for bar in &bars {
            prop_assert!(bar.tick_count >= 1);
            let end = start + bar.tick_count as usize;
            prop_assert!(end <= ticks.len());
            let window = &ticks[start..end];
            let close_tick = &ticks[end - 1];

            // Prices come from the ticks, never from the metric.
            prop_assert_eq!(bar.ts_ms, close_tick.ts_ms);
            prop_assert_eq!(bar.close, close_tick.price);
            prop_assert_eq!(bar.open, window[0].price);
            let high = window.iter().map(|t| t.price).fold(f64::NEG_INFINITY, f64::max);
            let low = window.iter().map(|t| t.price).fold(f64::INFINITY, f64::min);
            prop_assert_eq!(bar.high, high);
            prop_assert_eq!(bar.low, low);
            let volume: f64 = window.iter().map(|t| t.volume).sum();
            prop_assert!((bar.cum_volume - volume).abs() < 1e-9);

            start = end;
        }

        let open_ticks = state.last_tick.as_ref().map_or(0, |t| t.cum_ticks);
        prop_assert_eq!(start as u64 + open_ticks, ticks.len() as u64);
    }
}

#[test]
fn test_empty_batches_are_transparent() {
    let ticks = zigzag(1000);
    let config = ImbalanceBarConfig::new(5, 3, 10);
    let metric = ImbalanceMetric::DollarImbalance;

    let mut state = ContinuationState::new(metric);
    let mut bars = Vec::new();
    for chunk in ticks.chunks(128) {
        let empty = process_batch(&[], metric, &config, &mut state).unwrap();
        assert!(empty.bars.is_empty());
        bars.extend(process_batch(chunk, metric, &config, &mut state).unwrap().bars);
    }

    let (whole, final_state) = single_pass(&ticks, metric, &config);
    assert!(!whole.is_empty());
    assert_eq!(bars, whole);
    assert_eq!(state, final_state);
}

#[test]
fn test_metrics_choose_different_boundaries() {
    let ticks = zigzag(400);
    let config = ImbalanceBarConfig::new(5, 3, 10);
    let closes = |metric| -> Vec<usize> {
        let mut pos = 0;
        single_pass(&ticks, metric, &config)
            .0
            .iter()
            .map(|b| {
                pos += b.tick_count as usize;
                pos
            })
            .collect()
    };
    assert_ne!(
        closes(ImbalanceMetric::TickImbalance),
        closes(ImbalanceMetric::DollarImbalance)
    );
}
