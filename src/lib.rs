//! Beanfetch: Attribute-Discovery Metrics Agent
//!
//! Discovers the beans a managed process exposes, matches their attributes
//! against configured rules within a per-instance metric budget, and
//! reports samples, rates and connectivity checks through a [`Sink`].
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use beanfetch::prelude::*;
//!
//! let config = CheckConfig::load("jmx.toml")?;
//! # Ok::<(), FetchError>(())
//! ```
//!
//! [`Sink`]: beanfetch_core::Sink

pub use beanfetch_core as core;
pub use beanfetch_sink as sink;

/// Prelude module for common imports.
pub mod prelude {
    pub use beanfetch_core::{
        Action, Agent, AttributeSource, CheckConfig, Configuration, Connector, FetchError, Filter,
        InitConfig, Instance, InstanceConfig, MetricType, ObjectName, Reporter, Sink,
        SystemClock, TickReport,
    };
    pub use beanfetch_sink::TextProtocolSink;
}
