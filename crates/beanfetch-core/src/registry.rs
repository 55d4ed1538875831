//! Matched attributes and the one-tolerated-failure policy.
//!
//! # Toyota Way: Jidoka (自働化)
//! A freshly created bean may not be readable yet, so one failed read is
//! tolerated. A second consecutive failure removes the attribute until the
//! next full rebuild.

use std::collections::HashSet;

use crate::attribute::ClassifiedAttribute;
use crate::error::Result;
use crate::source::AttributeSource;
use crate::types::{AttributeKey, MetricSample};

/// Result of recording a collection failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// First failure: keep the attribute, retry next cycle.
    Tolerated,
    /// Second consecutive failure: drop the attribute.
    Dropped,
}

/// Attributes collected each cycle, plus those that failed last cycle.
///
/// Invariant: every key in `failing` names an attribute in `matching`.
#[derive(Debug, Default)]
pub struct AttributeRegistry {
    matching: Vec<ClassifiedAttribute>,
    failing: HashSet<AttributeKey>,
}

impl AttributeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empties both collections.
    pub fn clear(&mut self) {
        self.matching.clear();
        self.failing.clear();
    }

    /// Appends a bound attribute.
    pub fn push(&mut self, attribute: ClassifiedAttribute) {
        self.matching.push(attribute);
    }

    /// Matched attributes in discovery order.
    #[must_use]
    pub fn matching(&self) -> &[ClassifiedAttribute] {
        &self.matching
    }

    /// Number of matched attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.matching.len()
    }

    /// Returns true if nothing is matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matching.is_empty()
    }

    /// Returns true if `key` failed on its last attempt.
    #[must_use]
    pub fn is_failing(&self, key: &AttributeKey) -> bool {
        self.failing.contains(key)
    }

    /// Number of attributes that failed on their last attempt.
    #[must_use]
    pub fn failing_len(&self) -> usize {
        self.failing.len()
    }

    /// Sum of declared metric counts.
    #[must_use]
    pub fn declared_metrics(&self) -> usize {
        self.matching.iter().map(ClassifiedAttribute::metrics_count).sum()
    }

    /// Clears any failure recorded for `key`.
    pub fn record_success(&mut self, key: &AttributeKey) {
        self.failing.remove(key);
    }

    /// Records a failure and decides the attribute's fate.
    ///
    /// A dropped key is also removed from `failing`; the caller removes
    /// the attribute from `matching`.
    pub fn record_failure(&mut self, key: AttributeKey) -> FailureOutcome {
        if self.failing.remove(&key) {
            FailureOutcome::Dropped
        } else {
            self.failing.insert(key);
            FailureOutcome::Tolerated
        }
    }

    /// Collects every matched attribute in order.
    ///
    /// Samples are stamped with `check_name`. On a transport error the
    /// registry is left intact and the error returned immediately.
    ///
    /// # Errors
    /// Returns the first transport-class error raised by `source`.
    pub async fn collect(
        &mut self,
        source: &dyn AttributeSource,
        check_name: &str,
    ) -> Result<Vec<MetricSample>> {
        let attributes = std::mem::take(&mut self.matching);
        let mut kept = Vec::with_capacity(attributes.len());
        let mut samples = Vec::new();
        let mut remaining = attributes.into_iter();

        while let Some(attribute) = remaining.next() {
            match attribute.collect(source).await {
                Ok(collected) => {
                    samples.extend(collected.into_iter().map(|mut s| {
                        s.check_name = Some(check_name.to_string());
                        s
                    }));
                    self.record_success(&attribute.key());
                    kept.push(attribute);
                }
                Err(e) if e.is_transport() => {
                    kept.push(attribute);
                    kept.extend(remaining);
                    self.matching = kept;
                    return Err(e);
                }
                Err(e) => {
                    tracing::debug!(attribute = %attribute, error = %e, "cannot get metrics for attribute");
                    match self.record_failure(attribute.key()) {
                        FailureOutcome::Tolerated => kept.push(attribute),
                        FailureOutcome::Dropped => tracing::debug!(
                            attribute = %attribute,
                            "cannot generate metrics twice in a row, removing it from the attribute list"
                        ),
                    }
                }
            }
        }

        self.matching = kept;
        Ok(samples)
    }
}
