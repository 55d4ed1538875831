//! Falsification Tests: Category F - Text Protocol Output (F086-F090)
//!
//! # Toyota Way: Visual Management (目で見る管理)
//! The consumer parses blocks line by line. A family must be declared
//! before any of its points, and blocks must never interleave.

use std::io::{self, Write};
use std::sync::Arc;

use beanfetch_core::{
    Action, AttributeDescriptor, AttributeValue, Configuration, Filter, Instance, Reporter,
};
use beanfetch_sink::TextProtocolSink;
use beanfetch_test::{CHECK_NAME, MemoryConnector, MemorySource};
use parking_lot::Mutex;

use super::{attributes, bean, remote};

/// Writer appending to a buffer the test keeps a handle on.
#[derive(Clone, Default)]
struct Shared(Arc<Mutex<Vec<u8>>>);

impl Shared {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for Shared {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct Pipeline {
    source: MemorySource,
    connector: MemoryConnector,
    out: Shared,
    sink: Arc<TextProtocolSink<Shared>>,
    reporter: Reporter,
    clock: Arc<beanfetch_core::ManualClock>,
}

fn pipeline() -> Pipeline {
    let source = MemorySource::new();
    let out = Shared::default();
    let sink = Arc::new(TextProtocolSink::new(out.clone()));
    let clock = Arc::new(beanfetch_core::ManualClock::new(0));
    Pipeline {
        connector: MemoryConnector::new(source.clone()),
        source,
        reporter: Reporter::new(sink.clone(), clock.clone()),
        sink,
        out,
        clock,
    }
}

async fn run(p: &Pipeline, conf: Vec<Configuration>, action: Action) -> Instance {
    let mut instance = Instance::new(
        remote(conf),
        &Default::default(),
        CHECK_NAME,
        action,
        p.clock.clone(),
    );
    instance.init(&p.connector, &*p.sink, false).await.unwrap();
    instance
}

/// F086: A scalar family is declared, then its point is framed
///
/// # Falsification Attempt
/// One gauge through the reporter into the text sink.
#[tokio::test]
async fn f086_scalar_end_to_end() {
    let p = pipeline();
    p.source.add_scalar(&bean("d:type=T,name=N"), "Count", "long", 1.5);
    let mut instance = run(&p, vec![Configuration::include(Filter::domain("d"))], Action::Collect).await;

    let samples = instance.collect(&*p.sink).await.unwrap();
    p.reporter.send_metrics(&samples, instance.rates_mut());

    assert_eq!(
        p.out.text(),
        "CHART d.t-d.n.count t.n.count d.n.count long d.t d\n\
         DIMENSION d.n.count count\n\
         BEGIN d.t-d.n.count\n\
         SET d.n.count =   1.500000\n\
         END\n",
        "F086 FALSIFIED: Unexpected protocol output"
    );
}

/// F087: Composite families are stacked with one dimension per item
///
/// # Falsification Attempt
/// Heap usage with two selected items.
#[tokio::test]
async fn f087_composite_end_to_end() {
    let p = pipeline();
    let memory = bean("java.lang:type=Memory");
    p.source.add_attribute(
        &memory,
        AttributeDescriptor::new("HeapMemoryUsage", "javax.management.openmbean.CompositeData")
            .with_keys(["max", "used"]),
        AttributeValue::Composite(
            [
                ("max".to_string(), AttributeValue::Number(100.0)),
                ("used".to_string(), AttributeValue::Number(40.0)),
            ]
            .into_iter()
            .collect(),
        ),
    );
    let mut instance = run(
        &p,
        vec![Configuration::include(Filter::domain("java.lang"))],
        Action::Collect,
    )
    .await;
    let samples = instance.collect(&*p.sink).await.unwrap();
    p.reporter.send_metrics(&samples, instance.rates_mut());

    let text = p.out.text();
    let lines: Vec<&str> = text.lines().collect();
    assert!(lines[0].starts_with("CHART java.lang.memory-java.lang.heapmemoryusage "));
    assert!(lines[0].ends_with(" stacked"), "F087 FALSIFIED: Composite not stacked");
    assert_eq!(lines[1], "DIMENSION java.lang.heapmemoryusage.0 heapmemoryusage.0");
    assert_eq!(lines[2], "DIMENSION java.lang.heapmemoryusage.1 heapmemoryusage.1");
    assert_eq!(lines[4], "SET java.lang.heapmemoryusage.0 = 100.000000");
    assert_eq!(lines[7], "SET java.lang.heapmemoryusage.1 =  40.000000");
}

/// F088: Every family block precedes the first point of that family
///
/// # Falsification Attempt
/// Several beans, scanning the whole output.
#[tokio::test]
async fn f088_family_before_points() {
    let p = pipeline();
    for name in ["A", "B", "C"] {
        p.source
            .add_scalar(&bean(&format!("d:type={name}")), "Count", "long", 1.0);
    }
    let mut instance = run(&p, vec![Configuration::include(Filter::domain("d"))], Action::Collect).await;
    for _ in 0..2 {
        let samples = instance.collect(&*p.sink).await.unwrap();
        p.reporter.send_metrics(&samples, instance.rates_mut());
    }

    let text = p.out.text();
    let mut declared = Vec::new();
    let mut lines = text.lines().peekable();
    while let Some(line) = lines.next() {
        if let Some(rest) = line.strip_prefix("CHART ") {
            declared.push(rest.split(' ').next().unwrap().to_string());
            while lines.peek().is_some_and(|l| l.starts_with("DIMENSION ")) {
                lines.next();
            }
        } else if let Some(family) = line.strip_prefix("BEGIN ") {
            assert!(
                declared.iter().any(|d| d == family),
                "F088 FALSIFIED: Point for undeclared family {family}"
            );
            assert!(lines.next().is_some_and(|l| l.starts_with("SET ")));
            assert_eq!(lines.next(), Some("END"), "F088 FALSIFIED: Point block not closed");
        } else {
            panic!("F088 FALSIFIED: Stray line {line:?}");
        }
    }
    assert_eq!(declared.len(), 3);
}

/// F089: Listing output renders ranks and the banner
///
/// # Falsification Attempt
/// Budget of one with `list_matching`.
#[tokio::test]
async fn f089_listing_output() {
    let p = pipeline();
    p.source.add_scalar(&bean("d:type=A"), "Count", "long", 1.0);
    p.source.add_scalar(&bean("d:type=B"), "Count", "long", 2.0);
    let mut instance = Instance::new(
        beanfetch_core::InstanceConfig {
            max_returned_metrics: 1,
            ..remote(vec![Configuration::include(
                Filter::domain("d").with_attributes(attributes(&["Count"])),
            )])
        },
        &Default::default(),
        CHECK_NAME,
        Action::ListMatching,
        p.clock.clone(),
    );
    instance.init(&p.connector, &*p.sink, false).await.unwrap();

    let text = p.out.text();
    assert!(text.contains("Instance: db1:7199"));
    assert!(text.contains(
        "       Matching: 1/1. Bean name: d:type=A - Attribute name: Count - Attribute type: long"
    ));
    assert_eq!(
        text.matches("METRIC LIMIT REACHED").count(),
        1,
        "F089 FALSIFIED: Banner missing or repeated"
    );
    assert!(text.contains("       Matching: 2/1. Bean name: d:type=B"));
}

/// F090: Service checks never reach the protocol stream
///
/// # Falsification Attempt
/// Deliver a check through the reporter.
#[test]
fn f090_service_checks_kept_aside() {
    let p = pipeline();
    p.reporter.send_service_check(
        "jmx.can_connect",
        beanfetch_core::ServiceCheckStatus::Ok,
        None,
        vec![],
    );
    assert!(p.out.text().is_empty(), "F090 FALSIFIED: Service check written to the stream");
    let checks = p.sink.take_service_checks();
    assert_eq!(checks.len(), 1);
    assert!(p.sink.take_service_checks().is_empty());
}
