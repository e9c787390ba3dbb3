//! Tick-rule trade side inference.
//!
//! Labels each tick +1/-1 from the sign of its price change against the
//! previous tick. A zero change carries the previous label forward; the very
//! first tick of a stream is unclassified.

use imbalance_core::TickRule;

/// Sequential tick-rule classifier.
#[derive(Debug, Clone, Default)]
pub struct TickRuleClassifier {
    /// Last tick price.
    last_price: Option<f64>,
    /// Last tick rule (for zero-tick continuation).
    last_rule: TickRule,
}

impl TickRuleClassifier {
    /// Create a classifier for a new stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a classifier continuing after a tick with the given price and rule.
    pub fn resume(last_price: f64, last_rule: TickRule) -> Self {
        Self {
            last_price: Some(last_price),
            last_rule,
        }
    }

    /// Classify the next tick price.
    pub fn classify(&mut self, price: f64) -> TickRule {
        let rule = match self.last_price {
            None => TickRule::Unclassified,
            Some(last_price) => {
                let diff = price - last_price;
                if diff > 0.0 {
                    TickRule::Uptick
                } else if diff < 0.0 {
                    TickRule::Downtick
                } else {
                    self.last_rule
                }
            }
        };

        self.last_price = Some(price);
        self.last_rule = rule;
        rule
    }

    /// Classify a price sequence in order.
    pub fn classify_prices(&mut self, prices: &[f64]) -> Vec<TickRule> {
        prices.iter().map(|&p| self.classify(p)).collect()
    }

    /// Last classified price.
    pub fn last_price(&self) -> Option<f64> {
        self.last_price
    }

    /// Last assigned rule.
    pub fn last_rule(&self) -> TickRule {
        self.last_rule
    }
}
