//! Sink recording every call in order.

use parking_lot::Mutex;

use beanfetch_core::{ClassifiedAttribute, FamilyDeclaration, MetricPoint, ServiceCheck, Sink};

/// One recorded sink call.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    /// `declare_family`.
    Family(FamilyDeclaration),
    /// `send_metric_point`.
    Point(MetricPoint),
    /// `do_send_service_check`.
    ServiceCheck(ServiceCheck),
    /// `display_metric_reached`.
    LimitReached,
    /// `display_non_matching_attribute`, rendered.
    NotMatching(String),
    /// `display_instance_name`.
    Instance(String),
    /// `display_matching_attribute`, rendered, with rank and limit.
    Matching {
        /// Rendered attribute.
        attribute: String,
        /// Rank against the limit.
        rank: usize,
        /// Metric budget.
        limit: usize,
    },
}

/// Sink that keeps every event.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
}

impl RecordingSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All events in emission order.
    #[must_use]
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().clone()
    }

    /// Forgets every event.
    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// Emitted points.
    #[must_use]
    pub fn points(&self) -> Vec<MetricPoint> {
        self.filter(|e| match e {
            SinkEvent::Point(p) => Some(p.clone()),
            _ => None,
        })
    }

    /// Declared families.
    #[must_use]
    pub fn families(&self) -> Vec<FamilyDeclaration> {
        self.filter(|e| match e {
            SinkEvent::Family(f) => Some(f.clone()),
            _ => None,
        })
    }

    /// Delivered service checks.
    #[must_use]
    pub fn service_checks(&self) -> Vec<ServiceCheck> {
        self.filter(|e| match e {
            SinkEvent::ServiceCheck(c) => Some(c.clone()),
            _ => None,
        })
    }

    /// Number of limit banners displayed.
    #[must_use]
    pub fn limit_banners(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, SinkEvent::LimitReached))
            .count()
    }

    /// Ranks of the matching lines displayed.
    #[must_use]
    pub fn matching_ranks(&self) -> Vec<usize> {
        self.filter(|e| match e {
            SinkEvent::Matching { rank, .. } => Some(*rank),
            _ => None,
        })
    }

    fn filter<T>(&self, pick: impl Fn(&SinkEvent) -> Option<T>) -> Vec<T> {
        self.events.lock().iter().filter_map(pick).collect()
    }

    fn push(&self, event: SinkEvent) {
        self.events.lock().push(event);
    }
}

impl Sink for RecordingSink {
    fn declare_family(&self, declaration: &FamilyDeclaration) {
        self.push(SinkEvent::Family(declaration.clone()));
    }

    fn send_metric_point(&self, point: &MetricPoint) {
        self.push(SinkEvent::Point(point.clone()));
    }

    fn do_send_service_check(&self, check: &ServiceCheck) {
        self.push(SinkEvent::ServiceCheck(check.clone()));
    }

    fn display_metric_reached(&self) {
        self.push(SinkEvent::LimitReached);
    }

    fn display_non_matching_attribute(&self, attribute: &ClassifiedAttribute) {
        self.push(SinkEvent::NotMatching(attribute.to_string()));
    }

    fn display_instance_name(&self, instance: &str) {
        self.push(SinkEvent::Instance(instance.to_string()));
    }

    fn display_matching_attribute(&self, attribute: &ClassifiedAttribute, rank: usize, limit: usize) {
        self.push(SinkEvent::Matching {
            attribute: attribute.to_string(),
            rank,
            limit,
        });
    }
}
