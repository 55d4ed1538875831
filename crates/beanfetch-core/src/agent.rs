//! Agent tick: collect every instance, report, and rebuild broken ones.
//!
//! # Toyota Way: Jidoka (自働化)
//! A transport failure stops the line for one instance only. The instance
//! is flagged broken, reported `CRITICAL`, and rebuilt on a fresh
//! connection at the end of the same tick.

use std::sync::Arc;

use crate::error::Result;
use crate::instance::Instance;
use crate::reporter::{Reporter, ServiceCheckStatus};
use crate::source::Connector;

/// Suffix of the connectivity service check.
pub const CAN_CONNECT: &str = "can_connect";

/// Connectivity service check name for `check_name`.
#[must_use]
pub fn can_connect_name(check_name: &str) -> String {
    format!("{check_name}.{CAN_CONNECT}")
}

// =============================================================================
// TickReport
// =============================================================================

/// Outcome of one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Collection number assigned by the reporter.
    pub collection: u64,
    /// Instances collected without error.
    pub collected: usize,
    /// Points handed to the sink.
    pub points: usize,
    /// Instances that failed during this tick.
    pub failed: usize,
    /// Broken instances re-initialised successfully.
    pub recovered: usize,
    /// Instances still broken after the tick.
    pub broken: usize,
}

// =============================================================================
// Agent
// =============================================================================

struct Slot {
    instance: Instance,
    broken: bool,
}

/// Drives every configured instance.
pub struct Agent {
    slots: Vec<Slot>,
    reporter: Arc<Reporter>,
    connector: Arc<dyn Connector>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("instances", &self.slots.len())
            .field("broken", &self.broken_count())
            .finish_non_exhaustive()
    }
}

impl Agent {
    /// Creates an agent with no instance.
    #[must_use]
    pub fn new(reporter: Arc<Reporter>, connector: Arc<dyn Connector>) -> Self {
        Self {
            slots: Vec::new(),
            reporter,
            connector,
        }
    }

    /// Adds an unconnected instance. It is connected by [`Agent::init_all`]
    /// or, failing that, rebuilt at the end of the next tick.
    pub fn add_instance(&mut self, instance: Instance) {
        self.slots.push(Slot {
            instance,
            broken: true,
        });
    }

    /// Instances in insertion order.
    pub fn instances(&self) -> impl Iterator<Item = &Instance> {
        self.slots.iter().map(|s| &s.instance)
    }

    /// Returns true if the instance named `name` is broken.
    #[must_use]
    pub fn is_broken(&self, name: &str) -> bool {
        self.slots
            .iter()
            .any(|s| s.broken && s.instance.name() == name)
    }

    /// Number of broken instances.
    #[must_use]
    pub fn broken_count(&self) -> usize {
        self.slots.iter().filter(|s| s.broken).count()
    }

    /// Shared reporter.
    #[must_use]
    pub fn reporter(&self) -> &Arc<Reporter> {
        &self.reporter
    }

    /// Connects every instance. Failures are reported `CRITICAL` and left
    /// broken. Returns the number of instances connected.
    pub async fn init_all(&mut self) -> usize {
        let reporter = &self.reporter;
        let connector = self.connector.as_ref();
        let mut connected = 0;
        for slot in &mut self.slots {
            match init_instance(&mut slot.instance, connector, reporter, false).await {
                Ok(()) => {
                    slot.broken = false;
                    connected += 1;
                }
                Err(e) => {
                    tracing::error!(instance = %slot.instance, error = %e, "cannot connect to instance");
                    report_critical(
                        reporter,
                        &slot.instance,
                        format!("Cannot connect to instance {}: {e}", slot.instance),
                    );
                    slot.broken = true;
                }
            }
        }
        connected
    }

    /// Runs one tick.
    pub async fn run_tick(&mut self) -> TickReport {
        let reporter = &self.reporter;
        let connector = self.connector.as_ref();
        let mut report = TickReport {
            collection: reporter.begin_collection(),
            ..TickReport::default()
        };

        for slot in self.slots.iter_mut().filter(|s| !s.broken) {
            let instance = &mut slot.instance;
            match instance.collect(reporter.sink()).await {
                Ok(samples) => {
                    if samples.is_empty() {
                        tracing::warn!(instance = instance.name(), "instance didn't return any metrics");
                    }
                    report.points += reporter.send_metrics(&samples, instance.rates_mut());
                    let (status, message) = if instance.is_limit_reached() {
                        (
                            ServiceCheckStatus::Warning,
                            Some(format!(
                                "Number of returned metrics is too high for instance: {}. \
                                 Truncating to {} metrics.",
                                instance.name(),
                                instance.max_returned_metrics()
                            )),
                        )
                    } else {
                        (ServiceCheckStatus::Ok, None)
                    };
                    reporter.send_service_check(
                        &can_connect_name(instance.check_name()),
                        status,
                        message,
                        instance.service_check_tags(),
                    );
                    report.collected += 1;
                }
                Err(e) => {
                    tracing::error!(instance = %instance, error = %e, "cannot collect instance, it will be reinitialised");
                    report_critical(reporter, instance, e.to_string());
                    slot.broken = true;
                    report.failed += 1;
                }
            }
        }

        for slot in self.slots.iter_mut().filter(|s| s.broken) {
            let instance = &mut slot.instance;
            instance.reset_rates();
            instance.close().await;
            match init_instance(instance, connector, reporter, true).await {
                Ok(()) => {
                    tracing::info!(instance = %instance, "instance reinitialised");
                    slot.broken = false;
                    report.recovered += 1;
                }
                Err(e) => {
                    tracing::warn!(instance = %instance, error = %e, "cannot reinitialise instance");
                    report_critical(
                        reporter,
                        instance,
                        format!("Unable to instantiate or initialize instance {instance}: {e}"),
                    );
                }
            }
        }

        report.broken = self.broken_count();
        report
    }

    /// Closes every instance.
    pub async fn shutdown(&mut self) {
        for slot in &mut self.slots {
            slot.instance.close().await;
        }
    }
}

async fn init_instance(
    instance: &mut Instance,
    connector: &dyn Connector,
    reporter: &Reporter,
    force_new: bool,
) -> Result<()> {
    let summary = instance.init(connector, reporter.sink(), force_new).await?;
    tracing::info!(
        instance = instance.name(),
        matched = summary.matched,
        metrics = summary.declared_metrics,
        "found matching attributes"
    );
    Ok(())
}

fn report_critical(reporter: &Reporter, instance: &Instance, message: String) {
    reporter.send_service_check(
        &can_connect_name(instance.check_name()),
        ServiceCheckStatus::Critical,
        Some(message),
        instance.service_check_tags(),
    );
}
