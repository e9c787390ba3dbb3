//! Exponentially weighted moving average.
//!
//! Bias-adjusted form with span-style decay `alpha = 2 / (window + 1)`:
//!
//! ```text
//! y_t = (x_t + (1-a) x_{t-1} + (1-a)^2 x_{t-2} + ...) / (1 + (1-a) + (1-a)^2 + ...)
//! ```
//!
//! The first output equals the first input.

use std::num::NonZeroUsize;

/// Running numerator and weight of the adjusted EWMA.
struct EwmaFold {
    decay: f64,
    numerator: f64,
    weight: f64,
    decay_pow: f64,
    started: bool,
}

impl EwmaFold {
    fn new(window: NonZeroUsize) -> Self {
        let alpha = 2.0 / (window.get() as f64 + 1.0);
        Self {
            decay: 1.0 - alpha,
            numerator: 0.0,
            weight: 0.0,
            decay_pow: 1.0,
            started: false,
        }
    }

    #[inline]
    fn push(&mut self, value: f64) -> f64 {
        if self.started {
            self.decay_pow *= self.decay;
            self.weight += self.decay_pow;
            self.numerator = self.numerator * self.decay + value;
        } else {
            self.numerator = value;
            self.weight = 1.0;
            self.started = true;
        }
        self.numerator / self.weight
    }
}

/// EWMA of every prefix of `values`. Output has the same length as the input.
pub fn ewma(values: &[f64], window: NonZeroUsize) -> Vec<f64> {
    let mut fold = EwmaFold::new(window);
    values.iter().map(|&v| fold.push(v)).collect()
}

/// Last element of [`ewma`] without materializing the sequence.
///
/// Returns `None` for empty input.
pub fn ewma_last<I>(values: I, window: NonZeroUsize) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let mut fold = EwmaFold::new(window);
    values.into_iter().fold(None, |_, v| Some(fold.push(v)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn window(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn test_first_value_seeded() {
        let out = ewma(&[42.0, 10.0], window(5));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], 42.0);
    }

    #[test]
    fn test_constant_series() {
        let out = ewma(&[3.0; 10], window(4));
        for v in out {
            assert_relative_eq!(v, 3.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_known_values() {
        // window 3 -> alpha 0.5
        // y1 = (2 + 0.5*1) / 1.5
        // y2 = (4 + 0.5*2 + 0.25*1) / 1.75
        let out = ewma(&[1.0, 2.0, 4.0], window(3));
        assert_relative_eq!(out[1], 2.5 / 1.5, epsilon = 1e-12);
        assert_relative_eq!(out[2], 5.25 / 1.75, epsilon = 1e-12);
    }

    #[test]
    fn test_window_one_tracks_input() {
        // alpha 1 puts all weight on the latest value
        let out = ewma(&[1.0, 5.0, -2.0], window(1));
        assert_eq!(out, vec![1.0, 5.0, -2.0]);
    }

    #[test]
    fn test_last_matches_full_sequence() {
        let values: Vec<f64> = (0..50).map(|i| ((i * 7) % 11) as f64 - 5.0).collect();
        for w in [1, 3, 20, 100] {
            let full = ewma(&values, window(w));
            let last = ewma_last(values.iter().copied(), window(w)).unwrap();
            assert_eq!(last, *full.last().unwrap());
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(ewma(&[], window(3)).is_empty());
        assert!(ewma_last(Vec::<f64>::new(), window(3)).is_none());
    }
}
