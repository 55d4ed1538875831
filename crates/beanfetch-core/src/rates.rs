//! Per-instance rate aggregation.
//!
//! # Toyota Way: Kaizen (改善)
//! Counters only mean something as deltas. Each non-gauge metric keeps its
//! previous observation; the next one yields
//! `1000 * (value - previous) / (now_ms - previous_ms)`.
//!
//! One aggregator belongs to exactly one instance and is cleared only when
//! that instance reconnects.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
struct Observation {
    ts_ms: u64,
    value: f64,
}

/// Previous observations of counter-like metrics, keyed by identity.
#[derive(Debug, Clone, Default)]
pub struct RateAggregator {
    instance: String,
    state: HashMap<String, Observation>,
}

impl RateAggregator {
    /// Creates an empty aggregator for `instance`.
    #[must_use]
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
            state: HashMap::new(),
        }
    }

    /// Owning instance name.
    #[must_use]
    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Number of tracked identities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.len()
    }

    /// Returns true if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    /// Returns true if `key` has a previous observation.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.state.contains_key(key)
    }

    /// Records an observation and returns the rate since the previous one.
    ///
    /// The first observation of `key` only seeds state. A non-finite rate
    /// (clock stall) is suppressed, but state is still updated.
    pub fn observe(&mut self, key: &str, value: f64, now_ms: u64) -> Option<f64> {
        let Some(previous) = self.state.get_mut(key) else {
            self.state.insert(
                key.to_string(),
                Observation {
                    ts_ms: now_ms,
                    value,
                },
            );
            return None;
        };
        let elapsed = now_ms as f64 - previous.ts_ms as f64;
        let rate = 1000.0 * (value - previous.value) / elapsed;
        *previous = Observation {
            ts_ms: now_ms,
            value,
        };
        rate.is_finite().then_some(rate)
    }

    /// Drops every tracked identity.
    pub fn clear(&mut self) {
        self.state.clear();
    }
}
