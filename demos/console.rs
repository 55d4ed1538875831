// Demos are allowed to use expect/unwrap for simplicity
#![allow(clippy::expect_used, clippy::unwrap_used)]

//! Beanfetch Console Demo
//!
//! Runs the agent against an in-memory process and prints the chart
//! protocol to stdout.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example console
//!
//! # Show the listing of every matched attribute instead of collecting
//! cargo run --example console -- --list
//!
//! # With engine logs
//! RUST_LOG=beanfetch_core=debug cargo run --example console
//! ```

use std::sync::Arc;
use std::time::Duration;

use beanfetch::prelude::*;
use beanfetch::core::AttributeValue;
use beanfetch_test::{MemoryConnector, MemorySource};
use tracing_subscriber::EnvFilter;

const CHECK: &str = r#"
[init_config]
conf = [
    { include = { domain = "java.lang", type = "Memory", attribute = ["HeapMemoryUsage"] } },
    { include = { domain = "app", attribute = { Requests = { metric_type = "counter", alias = "app.$name.requests" } } } },
]

[[instances]]
host = "localhost"
port = 7199
refresh_beans = "1m"
tags = { env = "demo" }
"#;

fn simulated_process() -> MemorySource {
    let source = MemorySource::new();
    let memory: ObjectName = "java.lang:type=Memory".parse().expect("valid bean");
    source.add_attribute(
        &memory,
        beanfetch::core::AttributeDescriptor::new(
            "HeapMemoryUsage",
            "javax.management.openmbean.CompositeData",
        )
        .with_keys(["committed", "max", "used"]),
        heap(64.0),
    );
    let handler: ObjectName = "app:type=Handler,name=Orders".parse().expect("valid bean");
    source.add_scalar(&handler, "Requests", "long", 0.0);
    source
}

fn heap(used: f64) -> AttributeValue {
    AttributeValue::Composite(
        [
            ("committed".to_string(), AttributeValue::Number(128.0)),
            ("max".to_string(), AttributeValue::Number(256.0)),
            ("used".to_string(), AttributeValue::Number(used)),
        ]
        .into_iter()
        .collect(),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let action = if std::env::args().any(|a| a == "--list") {
        Action::ListEverything
    } else {
        Action::Collect
    };

    let check = CheckConfig::from_toml_str(CHECK)?;
    let source = simulated_process();
    let sink = Arc::new(TextProtocolSink::stdout());
    let reporter = Arc::new(Reporter::with_system_clock(sink.clone()));
    let mut agent = Agent::new(reporter, Arc::new(MemoryConnector::new(source.clone())));
    for config in check.instances {
        agent.add_instance(Instance::new(
            config,
            &check.init_config,
            "jmx",
            action,
            Arc::new(SystemClock),
        ));
    }

    let connected = agent.init_all().await;
    tracing::info!(connected, "instances initialised");
    if !action.is_collect() {
        sink.flush()?;
        return Ok(());
    }

    let handler: ObjectName = "app:type=Handler,name=Orders".parse()?;
    let memory: ObjectName = "java.lang:type=Memory".parse()?;
    for tick in 1..=3u32 {
        source.set_value(&handler, "Requests", AttributeValue::Number(f64::from(tick * 40)));
        source.set_value(&memory, "HeapMemoryUsage", heap(64.0 + f64::from(tick) * 8.0));
        let report = agent.run_tick().await;
        sink.flush()?;
        for service_check in sink.take_service_checks() {
            eprintln!(
                "[CHECK] {} {} {:?}",
                service_check.name, service_check.status, service_check.tags
            );
        }
        tracing::info!(tick, points = report.points, broken = report.broken, "tick done");
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    agent.shutdown().await;
    Ok(())
}
