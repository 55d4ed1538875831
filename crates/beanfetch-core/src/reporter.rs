//! Reporting pipeline: gauge/rate conversion and the sink contract.
//!
//! # Toyota Way: Visual Management (目で見る管理)
//! The [`Reporter`] owns everything shared across sinks: non-finite
//! filtering, rate math, identifier derivation and service-check
//! counters. A [`Sink`] only implements emission primitives and the
//! listing display hooks.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::attribute::ClassifiedAttribute;
use crate::clock::{Clock, SystemClock};
use crate::naming::{FamilyDeclaration, NameParts};
use crate::rates::RateAggregator;
use crate::types::{MetricSample, MetricType};

/// Collections logged at info level unconditionally.
const VERBOSE_COLLECTIONS: u64 = 5;

/// After the first collections, one in this many is logged at info level.
const LOG_EVERY: u64 = 10;

/// A value ready for emission.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricPoint {
    /// Output metric name (the sample alias).
    pub metric_name: String,
    /// Gauge value or computed rate.
    pub value: f64,
    /// `key:value` tags.
    pub tags: Vec<String>,
    /// Family the point belongs to.
    pub family_id: String,
    /// Dimension inside the family.
    pub dimension_id: String,
    /// Origin metric type.
    pub metric_type: MetricType,
}

/// Service check status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceCheckStatus {
    /// Instance collected normally.
    Ok,
    /// Instance collected with truncation.
    Warning,
    /// Instance could not be collected.
    Critical,
    /// Status unknown.
    Unknown,
}

impl fmt::Display for ServiceCheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ok => "OK",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
            Self::Unknown => "UNKNOWN",
        };
        write!(f, "{s}")
    }
}

/// A service check event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCheck {
    /// Formatted check name.
    pub name: String,
    /// Status.
    pub status: ServiceCheckStatus,
    /// Optional detail.
    pub message: Option<String>,
    /// `key:value` tags.
    pub tags: Vec<String>,
}

/// Emission primitives implemented by concrete outputs.
///
/// Implementations may be shared across instance workers; each call must
/// be emitted as one uninterrupted block.
pub trait Sink: Send + Sync {
    /// Declares a metric family and its dimensions.
    fn declare_family(&self, declaration: &FamilyDeclaration);

    /// Emits one metric point.
    fn send_metric_point(&self, point: &MetricPoint);

    /// Delivers a service check.
    fn do_send_service_check(&self, check: &ServiceCheck);

    /// Listing: the metric limit has been reached.
    fn display_metric_reached(&self);

    /// Listing: an attribute that matched no configuration.
    fn display_non_matching_attribute(&self, attribute: &ClassifiedAttribute);

    /// Listing: banner for the instance being scanned.
    fn display_instance_name(&self, instance: &str);

    /// Listing: a matched attribute and its rank against the limit.
    fn display_matching_attribute(&self, attribute: &ClassifiedAttribute, rank: usize, limit: usize);
}

/// Shared reporting front-end.
pub struct Reporter {
    sink: Arc<dyn Sink>,
    clock: Arc<dyn Clock>,
    service_check_counts: Mutex<HashMap<String, u64>>,
    collections: AtomicU64,
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("collections", &self.collection_count())
            .finish_non_exhaustive()
    }
}

impl Reporter {
    /// Creates a reporter reading time from `clock`.
    #[must_use]
    pub fn new(sink: Arc<dyn Sink>, clock: Arc<dyn Clock>) -> Self {
        Self {
            sink,
            clock,
            service_check_counts: Mutex::new(HashMap::new()),
            collections: AtomicU64::new(0),
        }
    }

    /// Creates a reporter on the system clock.
    #[must_use]
    pub fn with_system_clock(sink: Arc<dyn Sink>) -> Self {
        Self::new(sink, Arc::new(SystemClock))
    }

    /// The underlying sink.
    #[must_use]
    pub fn sink(&self) -> &dyn Sink {
        self.sink.as_ref()
    }

    /// Starts a new collection and returns its number (from 1).
    pub fn begin_collection(&self) -> u64 {
        self.collections.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Number of collections started.
    #[must_use]
    pub fn collection_count(&self) -> u64 {
        self.collections.load(Ordering::Relaxed)
    }

    /// Converts samples to points and emits them.
    ///
    /// Non-finite values are dropped. Gauges pass through; every other
    /// type goes through `rates`, the caller's per-instance state.
    /// Returns the number of points emitted.
    pub fn send_metrics(&self, samples: &[MetricSample], rates: &mut RateAggregator) -> usize {
        let collection = self.collection_count();
        if collection <= VERBOSE_COLLECTIONS || collection % LOG_EVERY == 0 {
            tracing::info!(
                instance = rates.instance(),
                count = samples.len(),
                collection,
                "instance is sending metrics to the metrics reporter"
            );
            if collection == VERBOSE_COLLECTIONS {
                tracing::info!("next collections will be logged only every {LOG_EVERY} collections");
            }
        } else {
            tracing::debug!(
                instance = rates.instance(),
                count = samples.len(),
                collection,
                "instance is sending metrics to the metrics reporter"
            );
        }

        let mut sent = 0;
        for sample in samples {
            if !sample.value.is_finite() {
                continue;
            }
            let value = if sample.metric_type.is_gauge() {
                sample.value
            } else {
                let now = self.clock.now_millis();
                match rates.observe(&sample.identity_key(), sample.value, now) {
                    Some(rate) => rate,
                    None => continue,
                }
            };
            let parts = NameParts::for_sample(sample);
            self.sink.send_metric_point(&MetricPoint {
                metric_name: sample.alias.clone(),
                value,
                tags: sample.tags.clone(),
                family_id: parts.family_id(),
                dimension_id: parts.dimension_id(sample.dimension),
                metric_type: sample.metric_type,
            });
            sent += 1;
        }
        sent
    }

    /// Counts and delivers a service check.
    pub fn send_service_check(
        &self,
        check_name: &str,
        status: ServiceCheckStatus,
        message: Option<String>,
        tags: Vec<String>,
    ) {
        self.increment_service_check_count(check_name);
        self.sink.do_send_service_check(&ServiceCheck {
            name: format_service_check_prefix(check_name),
            status,
            message,
            tags,
        });
    }

    /// Increments the counter for `check_name`.
    pub fn increment_service_check_count(&self, check_name: &str) {
        *self
            .service_check_counts
            .lock()
            .entry(check_name.to_string())
            .or_insert(0) += 1;
    }

    /// Service checks sent under `check_name` since the last reset.
    #[must_use]
    pub fn service_check_count(&self, check_name: &str) -> u64 {
        self.service_check_counts
            .lock()
            .get(check_name)
            .copied()
            .unwrap_or(0)
    }

    /// Resets the counter for `check_name`.
    pub fn reset_service_check_count(&self, check_name: &str) {
        self.service_check_counts
            .lock()
            .insert(check_name.to_string(), 0);
    }
}

/// Strips `[A-Z0-9:_-]` from the first dot-separated chunk of a check name.
#[must_use]
pub fn format_service_check_prefix(full_name: &str) -> String {
    let mut chunks = full_name.split('.');
    let first: String = chunks
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| !(c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, ':' | '_' | '-')))
        .collect();
    std::iter::once(first.as_str())
        .chain(chunks)
        .collect::<Vec<_>>()
        .join(".")
}
