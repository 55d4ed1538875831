//! Agent test harness.
//!
//! # Toyota Way: Built-in Quality (品質の作り込み)
//! Quality cannot be inspected in; it must be built in.

use std::sync::Arc;

use beanfetch_core::{Action, Agent, InitConfig, Instance, InstanceConfig, ManualClock, Reporter};

use crate::memory::{MemoryConnector, MemorySource};
use crate::recording::RecordingSink;

/// Check name given to harness instances.
pub const CHECK_NAME: &str = "jmx";

/// Start time of the harness clock.
pub const START_MS: u64 = 1_000_000;

/// Source, connector, sink and clock wired together.
#[derive(Debug)]
pub struct TestHarness {
    /// Bean universe seen by every connection.
    pub source: MemorySource,
    /// Connector serving `source`.
    pub connector: Arc<MemoryConnector>,
    /// Recorder of every sink call.
    pub sink: Arc<RecordingSink>,
    /// Clock shared by instances and the reporter.
    pub clock: Arc<ManualClock>,
    /// Reporter on `sink` and `clock`.
    pub reporter: Arc<Reporter>,
}

impl TestHarness {
    /// Creates a harness with an empty universe.
    #[must_use]
    pub fn new() -> Self {
        let source = MemorySource::new();
        let connector = Arc::new(MemoryConnector::new(source.clone()));
        let sink = Arc::new(RecordingSink::new());
        let clock = Arc::new(ManualClock::new(START_MS));
        let reporter = Arc::new(Reporter::new(sink.clone(), clock.clone()));
        Self {
            source,
            connector,
            sink,
            clock,
            reporter,
        }
    }

    /// Creates an unconnected instance of the `jmx` check.
    #[must_use]
    pub fn instance(&self, config: InstanceConfig, action: Action) -> Instance {
        self.instance_with_init(config, &InitConfig::default(), action)
    }

    /// Creates an unconnected instance with shared rules.
    #[must_use]
    pub fn instance_with_init(&self, config: InstanceConfig, init: &InitConfig, action: Action) -> Instance {
        Instance::new(config, init, CHECK_NAME, action, self.clock.clone())
    }

    /// Creates an agent on the harness reporter and connector.
    #[must_use]
    pub fn agent(&self) -> Agent {
        Agent::new(self.reporter.clone(), self.connector.clone())
    }

    /// Advances the clock by `ms`.
    pub fn advance(&self, ms: u64) {
        self.clock.advance(ms);
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
