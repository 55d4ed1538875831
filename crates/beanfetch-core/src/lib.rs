// Iron Lotus: Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # beanfetch-core
//!
//! Attribute discovery and metric collection engine for processes that
//! expose a bean-style instrumentation interface.
//!
//! This crate provides:
//!
//! - [`classify`](mod@classify) for attribute type resolution
//! - [`scope`] for narrowing bean queries to the configured domains
//! - [`matcher`] and [`AttributeRegistry`] for binding attributes to rules,
//!   under a per-instance metric budget
//! - [`Instance`] for the per-tick collection pipeline
//! - [`Reporter`] and [`RateAggregator`] for gauge and rate emission
//! - [`Agent`] for driving many instances and reconnecting broken ones
//!
//! The managed process is reached through the [`AttributeSource`] and
//! [`Connector`] traits; output goes through a [`Sink`].
//!
//! ## Iron Lotus Framework
//!
//! - **Genchi Genbutsu**: every sample carries the bean and attribute it came from
//! - **Jidoka**: one tolerated failure per attribute, then removal
//! - **Kaizen**: counters are reported as rates
//! - **Muda**: scoped bean queries
//!
//! ## Example
//!
//! ```rust,ignore
//! use beanfetch_core::{Action, Agent, CheckConfig, Instance, Reporter, SystemClock};
//! use std::sync::Arc;
//!
//! let check = CheckConfig::load("jmx.toml")?;
//! let reporter = Arc::new(Reporter::with_system_clock(sink));
//! let mut agent = Agent::new(reporter, connector);
//! for config in check.instances.clone() {
//!     agent.add_instance(Instance::new(
//!         config,
//!         &check.init_config,
//!         "jmx",
//!         Action::Collect,
//!         Arc::new(SystemClock),
//!     ));
//! }
//! agent.init_all().await;
//! agent.run_tick().await;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Allow significant_drop_tightening - overly aggressive for async code with locks
#![allow(clippy::significant_drop_tightening)]

pub mod agent;
pub mod attribute;
pub mod catalogue;
pub mod classify;
pub mod clock;
pub mod config;
pub mod error;
pub mod instance;
pub mod matcher;
pub mod naming;
pub mod rates;
pub mod registry;
pub mod reporter;
pub mod scope;
pub mod source;
#[cfg(test)]
pub mod tests;
pub mod types;

pub use agent::{Agent, TickReport, can_connect_name};
pub use attribute::{AttributeContext, ClassifiedAttribute, convert_metric_name};
pub use catalogue::BeanCatalogue;
pub use classify::{CanonicalType, TypeClass, classify, readable_type_name};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    Action, AttributeFilter, AttributeSpec, CheckConfig, Configuration, Filter, InitConfig,
    InstanceConfig, ValueList,
};
pub use error::{FetchError, Result};
pub use instance::Instance;
pub use matcher::{MatchSettings, RefreshSummary, rebuild_registry};
pub use naming::{ChartType, Dimension, FamilyDeclaration, MetricFamily, NameParts};
pub use rates::RateAggregator;
pub use registry::{AttributeRegistry, FailureOutcome};
pub use reporter::{
    MetricPoint, Reporter, ServiceCheck, ServiceCheckStatus, Sink, format_service_check_prefix,
};
pub use scope::common_scopes;
pub use source::{AttributeSource, Connector};
pub use types::{
    AttributeDescriptor, AttributeKey, AttributeValue, BeanPattern, Complexity, MetricSample,
    MetricType, ObjectName,
};
