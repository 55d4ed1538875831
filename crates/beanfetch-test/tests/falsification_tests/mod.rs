//! Popperian Falsification Tests for beanfetch
//!
//! Categories:
//! - A: Matching and budget (F001-F020)
//! - B: Collection, retry and rates (F021-F040)
//! - C: Naming and classification (F041-F060)
//! - D: Bean scoping (F061-F070)
//! - E: Agent and service checks (F071-F085)
//! - F: Text protocol output (F086-F090)

// Allow test-specific patterns that are denied in production code
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(clippy::needless_borrows_for_generic_args)]
#![allow(clippy::default_trait_access)]

mod collection;
mod protocol;
mod scoping;

use std::collections::BTreeMap;

use beanfetch_core::{
    AttributeFilter, AttributeSpec, Configuration, InstanceConfig, MetricType, ObjectName,
    ValueList,
};

/// Parses a bean name.
pub fn bean(name: &str) -> ObjectName {
    name.parse().unwrap()
}

/// Instance on `db1:7199` with its own rules.
pub fn remote(conf: Vec<Configuration>) -> InstanceConfig {
    InstanceConfig {
        conf: Some(conf),
        ..InstanceConfig::remote("db1", 7199)
    }
}

/// Attribute list filter.
pub fn attributes(names: &[&str]) -> AttributeFilter {
    AttributeFilter::List(names.iter().map(ToString::to_string).collect())
}

/// Attribute table filter giving every name the same metric type.
pub fn typed(names: &[&str], metric_type: MetricType) -> AttributeFilter {
    AttributeFilter::Detailed(
        names
            .iter()
            .map(|n| {
                (
                    (*n).to_string(),
                    AttributeSpec {
                        metric_type,
                        ..AttributeSpec::default()
                    },
                )
            })
            .collect::<BTreeMap<_, _>>(),
    )
}

/// One-or-many value list.
pub fn values(v: &[&str]) -> ValueList {
    v.iter().copied().collect()
}
