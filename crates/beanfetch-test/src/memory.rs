//! In-memory bean universe.
//!
//! # Toyota Way: Genchi Genbutsu (現地現物)
//! Tests observe exactly what the engine asked for: every scope queried,
//! every read, every close.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use beanfetch_core::{
    AttributeDescriptor, AttributeSource, AttributeValue, BeanPattern, Connector, FetchError,
    InstanceConfig, ObjectName, Result,
};

#[derive(Debug, Default)]
struct Universe {
    beans: Vec<(ObjectName, Vec<AttributeDescriptor>)>,
    values: HashMap<(String, String), AttributeValue>,
    failing_reads: HashSet<(String, String)>,
    failing_listings: HashSet<String>,
    transport_down: bool,
    queries: Vec<Option<String>>,
    reads: u64,
    closes: u32,
}

fn key(bean: &ObjectName, attribute: &str) -> (String, String) {
    (bean.canonical_name(), attribute.to_string())
}

/// Shared handle on a mutable bean universe.
///
/// Clones share state, so a test keeps one handle while the connector
/// hands others to instances.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    universe: Arc<Mutex<Universe>>,
}

impl MemorySource {
    /// Creates an empty universe.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a bean exposing `descriptors`, or replaces its descriptors.
    pub fn add_bean(&self, bean: &ObjectName, descriptors: Vec<AttributeDescriptor>) {
        let mut universe = self.universe.lock();
        match universe.beans.iter_mut().find(|(b, _)| b == bean) {
            Some((_, existing)) => *existing = descriptors,
            None => universe.beans.push((bean.clone(), descriptors)),
        }
    }

    /// Adds one scalar attribute to `bean` (creating the bean if needed).
    pub fn add_scalar(&self, bean: &ObjectName, attribute: &str, type_name: &str, value: f64) {
        self.add_attribute(
            bean,
            AttributeDescriptor::new(attribute, type_name),
            AttributeValue::Number(value),
        );
    }

    /// Adds one attribute and its value to `bean`.
    pub fn add_attribute(&self, bean: &ObjectName, descriptor: AttributeDescriptor, value: AttributeValue) {
        let mut universe = self.universe.lock();
        universe
            .values
            .insert(key(bean, &descriptor.name), value);
        match universe.beans.iter_mut().find(|(b, _)| b == bean) {
            Some((_, existing)) => existing.push(descriptor),
            None => universe.beans.push((bean.clone(), vec![descriptor])),
        }
    }

    /// Removes a bean and its values.
    pub fn remove_bean(&self, bean: &ObjectName) {
        let mut universe = self.universe.lock();
        universe.beans.retain(|(b, _)| b != bean);
        let canonical = bean.canonical_name();
        universe.values.retain(|(b, _), _| *b != canonical);
    }

    /// Sets the current value of an attribute.
    pub fn set_value(&self, bean: &ObjectName, attribute: &str, value: AttributeValue) {
        self.universe.lock().values.insert(key(bean, attribute), value);
    }

    /// Makes reads of one attribute fail, or succeed again.
    pub fn fail_read(&self, bean: &ObjectName, attribute: &str, failing: bool) {
        let mut universe = self.universe.lock();
        if failing {
            universe.failing_reads.insert(key(bean, attribute));
        } else {
            universe.failing_reads.remove(&key(bean, attribute));
        }
    }

    /// Makes attribute listing of one bean fail, or succeed again.
    pub fn fail_listing(&self, bean: &ObjectName, failing: bool) {
        let mut universe = self.universe.lock();
        if failing {
            universe.failing_listings.insert(bean.canonical_name());
        } else {
            universe.failing_listings.remove(&bean.canonical_name());
        }
    }

    /// Simulates loss (or recovery) of the connection.
    pub fn set_transport_down(&self, down: bool) {
        self.universe.lock().transport_down = down;
    }

    /// Scopes queried so far, `None` for the unrestricted query.
    #[must_use]
    pub fn queries(&self) -> Vec<Option<String>> {
        self.universe.lock().queries.clone()
    }

    /// Forgets the recorded queries.
    pub fn clear_queries(&self) {
        self.universe.lock().queries.clear();
    }

    /// Number of attribute reads served or refused.
    #[must_use]
    pub fn read_count(&self) -> u64 {
        self.universe.lock().reads
    }

    /// Number of `close` calls.
    #[must_use]
    pub fn close_count(&self) -> u32 {
        self.universe.lock().closes
    }

    fn check_transport(universe: &Universe) -> Result<()> {
        if universe.transport_down {
            return Err(FetchError::transport("connection reset by peer"));
        }
        Ok(())
    }
}

#[async_trait]
impl AttributeSource for MemorySource {
    async fn query_beans(&self, scope: Option<&BeanPattern>) -> Result<Vec<ObjectName>> {
        let mut universe = self.universe.lock();
        Self::check_transport(&universe)?;
        universe.queries.push(scope.map(ToString::to_string));
        tracing::trace!(scope = ?scope.map(ToString::to_string), "query beans");
        Ok(universe
            .beans
            .iter()
            .map(|(b, _)| b)
            .filter(|b| scope.is_none_or(|s| s.matches(b)))
            .cloned()
            .collect())
    }

    async fn attributes_for_bean(&self, bean: &ObjectName) -> Result<Vec<AttributeDescriptor>> {
        let universe = self.universe.lock();
        Self::check_transport(&universe)?;
        if universe.failing_listings.contains(&bean.canonical_name()) {
            return Err(FetchError::query(bean.to_string(), "instance not found"));
        }
        universe
            .beans
            .iter()
            .find(|(b, _)| b == bean)
            .map(|(_, d)| d.clone())
            .ok_or_else(|| FetchError::query(bean.to_string(), "instance not found"))
    }

    async fn read_attribute(&self, bean: &ObjectName, attribute: &str) -> Result<AttributeValue> {
        let mut universe = self.universe.lock();
        Self::check_transport(&universe)?;
        universe.reads += 1;
        let k = key(bean, attribute);
        if universe.failing_reads.contains(&k) {
            return Err(FetchError::attribute(format!("{bean} {attribute}: read refused")));
        }
        universe
            .values
            .get(&k)
            .cloned()
            .ok_or_else(|| FetchError::attribute(format!("{bean} {attribute}: attribute not found")))
    }

    async fn close(&self) -> Result<()> {
        self.universe.lock().closes += 1;
        Ok(())
    }
}

// =============================================================================
// MemoryConnector
// =============================================================================

/// Connector serving one [`MemorySource`].
#[derive(Debug, Default)]
pub struct MemoryConnector {
    source: MemorySource,
    refuse: AtomicBool,
    attempts: AtomicU32,
    forced: AtomicU32,
}

impl MemoryConnector {
    /// Creates a connector handing out clones of `source`.
    #[must_use]
    pub fn new(source: MemorySource) -> Self {
        Self {
            source,
            ..Self::default()
        }
    }

    /// Makes connection attempts fail, or succeed again.
    pub fn set_refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// All connection attempts.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Attempts that asked for a new connection.
    #[must_use]
    pub fn forced(&self) -> u32 {
        self.forced.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(
        &self,
        config: &InstanceConfig,
        force_new: bool,
    ) -> Result<Box<dyn AttributeSource>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if force_new {
            self.forced.fetch_add(1, Ordering::SeqCst);
        }
        if self.refuse.load(Ordering::SeqCst) {
            return Err(FetchError::transport(format!(
                "connection refused to {}",
                config.target()
            )));
        }
        Ok(Box::new(self.source.clone()))
    }
}
