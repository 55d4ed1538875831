//! Falsification Tests: Category B - Collection, Retry and Rates (F021-F040)
//!
//! # Toyota Way: Jidoka (自働化)
//! One tolerated failure per attribute, then removal. Transport loss stops
//! the cycle.

use std::collections::BTreeMap;
use std::time::Duration;

use beanfetch_core::{
    Action, AttributeFilter, AttributeSpec, AttributeValue, Configuration, Filter, InstanceConfig,
    MetricType, RateAggregator,
};
use beanfetch_test::TestHarness;

use super::{bean, remote, typed};

async fn connected(harness: &TestHarness, config: InstanceConfig) -> beanfetch_core::Instance {
    let mut instance = harness.instance(config, Action::Collect);
    instance
        .init(&*harness.connector, &*harness.sink, false)
        .await
        .unwrap();
    instance
}

// =============================================================================
// F021-F024: Retry policy
// =============================================================================

/// F021: A single failure is tolerated
///
/// # Falsification Attempt
/// Fail one read; the attribute must remain registered.
#[tokio::test]
async fn f021_single_failure_tolerated() {
    let harness = TestHarness::new();
    let a = bean("d:type=A");
    harness.source.add_scalar(&a, "Count", "long", 1.0);
    let mut instance = connected(
        &harness,
        remote(vec![Configuration::include(Filter::domain("d"))]),
    )
    .await;

    harness.source.fail_read(&a, "Count", true);
    let samples = instance.collect(&*harness.sink).await.unwrap();
    assert!(samples.is_empty());
    assert_eq!(instance.registry().len(), 1, "F021 FALSIFIED: First failure dropped the attribute");
}

/// F022: Two consecutive failures remove the attribute
///
/// # Falsification Attempt
/// Fail the same read on two cycles.
#[tokio::test]
async fn f022_second_failure_drops() {
    let harness = TestHarness::new();
    let a = bean("d:type=A");
    harness.source.add_scalar(&a, "Count", "long", 1.0);
    harness.source.add_scalar(&bean("d:type=B"), "Count", "long", 2.0);
    let mut instance = connected(
        &harness,
        remote(vec![Configuration::include(Filter::domain("d"))]),
    )
    .await;

    harness.source.fail_read(&a, "Count", true);
    instance.collect(&*harness.sink).await.unwrap();
    instance.collect(&*harness.sink).await.unwrap();

    assert_eq!(instance.registry().len(), 1, "F022 FALSIFIED: Attribute survived two failures");
    assert!(
        instance.registry().matching().iter().all(|m| m.bean() != &a),
        "F022 FALSIFIED: The failing attribute is still registered"
    );

    harness.source.fail_read(&a, "Count", false);
    let samples = instance.collect(&*harness.sink).await.unwrap();
    assert_eq!(samples.len(), 1, "F022 FALSIFIED: Dropped attribute came back without a rebuild");
}

/// F023: A success between failures resets the count
///
/// # Falsification Attempt
/// Fail, succeed, fail; the attribute must remain registered.
#[tokio::test]
async fn f023_failures_must_be_consecutive() {
    let harness = TestHarness::new();
    let a = bean("d:type=A");
    harness.source.add_scalar(&a, "Count", "long", 1.0);
    let mut instance = connected(
        &harness,
        remote(vec![Configuration::include(Filter::domain("d"))]),
    )
    .await;

    for failing in [true, false, true] {
        harness.source.fail_read(&a, "Count", failing);
        instance.collect(&*harness.sink).await.unwrap();
    }
    assert_eq!(instance.registry().len(), 1, "F023 FALSIFIED: Non-consecutive failures dropped");
}

/// F024: A transport error aborts the cycle and keeps the registry
///
/// # Falsification Attempt
/// Take the transport down mid-life.
#[tokio::test]
async fn f024_transport_error_aborts_cycle() {
    let harness = TestHarness::new();
    harness.source.add_scalar(&bean("d:type=A"), "Count", "long", 1.0);
    harness.source.add_scalar(&bean("d:type=B"), "Count", "long", 2.0);
    let mut instance = connected(
        &harness,
        remote(vec![Configuration::include(Filter::domain("d"))]),
    )
    .await;
    let reads = harness.source.read_count();

    harness.source.set_transport_down(true);
    let err = instance.collect(&*harness.sink).await.unwrap_err();
    assert!(err.is_transport(), "F024 FALSIFIED: Transport error reclassified");
    assert_eq!(harness.source.read_count(), reads, "F024 FALSIFIED: Cycle continued after transport loss");
    assert_eq!(instance.registry().len(), 2, "F024 FALSIFIED: Registry damaged");
    assert_eq!(instance.registry().failing_len(), 0, "F024 FALSIFIED: Transport loss counted as failure");
}

// =============================================================================
// F025-F030: End-to-end scenarios and rate math
// =============================================================================

/// F025: Scenario A, three gauges with values 1, 2, 3
///
/// # Falsification Attempt
/// Collect and report; values must pass through unchanged.
#[tokio::test]
async fn f025_scenario_a_gauges_pass_through() {
    let harness = TestHarness::new();
    for (name, value) in [("A", 1.0), ("B", 2.0), ("C", 3.0)] {
        harness
            .source
            .add_scalar(&bean(&format!("d:type={name}")), "Count", "long", value);
    }
    let mut instance = connected(
        &harness,
        remote(vec![Configuration::include(
            Filter::domain("d").with_attributes(super::attributes(&["Count"])),
        )]),
    )
    .await;

    let samples = instance.collect(&*harness.sink).await.unwrap();
    let sent = harness.reporter.send_metrics(&samples, instance.rates_mut());
    assert_eq!(sent, 3, "F025 FALSIFIED: Wrong number of samples");
    let values: Vec<f64> = harness.sink.points().iter().map(|p| p.value).collect();
    assert_eq!(values, vec![1.0, 2.0, 3.0], "F025 FALSIFIED: Gauge values altered");
    assert!(instance.rates().is_empty(), "F025 FALSIFIED: Rate state created for gauges");
}

/// F026: Scenario B, a counter observed at 10 then 25 one second apart
///
/// # Falsification Attempt
/// First cycle seeds, second emits 15.0.
#[tokio::test]
async fn f026_scenario_b_counter_rate() {
    let harness = TestHarness::new();
    let a = bean("d:type=A");
    harness.source.add_scalar(&a, "Requests", "long", 10.0);
    let mut instance = connected(
        &harness,
        remote(vec![Configuration::include(
            Filter::domain("d").with_attributes(typed(&["Requests"], MetricType::Counter)),
        )]),
    )
    .await;

    let samples = instance.collect(&*harness.sink).await.unwrap();
    assert_eq!(
        harness.reporter.send_metrics(&samples, instance.rates_mut()),
        0,
        "F026 FALSIFIED: First observation emitted"
    );
    assert_eq!(instance.rates().len(), 1, "F026 FALSIFIED: State not seeded");

    harness.advance(1_000);
    harness.source.set_value(&a, "Requests", AttributeValue::Number(25.0));
    let samples = instance.collect(&*harness.sink).await.unwrap();
    harness.reporter.send_metrics(&samples, instance.rates_mut());
    let points = harness.sink.points();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].value, 15.0, "F026 FALSIFIED: Wrong rate");
}

/// F027: v0 then v0+5 one second apart yields 5.0
///
/// # Falsification Attempt
/// Drive the aggregator directly.
#[test]
fn f027_rate_math() {
    let mut rates = RateAggregator::new("i");
    assert!(rates.observe("k", 100.0, 0).is_none(), "F027 FALSIFIED: First observation emitted");
    assert_eq!(rates.observe("k", 105.0, 1_000), Some(5.0), "F027 FALSIFIED: Wrong rate");
}

/// F028: A zero time delta emits nothing but still updates state
///
/// # Falsification Attempt
/// Observe twice at the same instant, then one second later.
#[test]
fn f028_zero_delta_suppressed() {
    let mut rates = RateAggregator::new("i");
    rates.observe("k", 10.0, 5_000);
    assert!(rates.observe("k", 12.0, 5_000).is_none(), "F028 FALSIFIED: Infinite rate emitted");
    assert_eq!(
        rates.observe("k", 14.0, 6_000),
        Some(2.0),
        "F028 FALSIFIED: State not updated on suppression"
    );
}

/// F029: Non-finite values never reach the sink
///
/// # Falsification Attempt
/// Serve NaN and infinity as gauge values.
#[tokio::test]
async fn f029_non_finite_dropped() {
    let harness = TestHarness::new();
    harness.source.add_scalar(&bean("d:type=A"), "Count", "double", f64::NAN);
    harness.source.add_scalar(&bean("d:type=B"), "Count", "double", f64::INFINITY);
    harness.source.add_scalar(&bean("d:type=C"), "Count", "double", 7.0);
    let mut instance = connected(
        &harness,
        remote(vec![Configuration::include(Filter::domain("d"))]),
    )
    .await;

    let samples = instance.collect(&*harness.sink).await.unwrap();
    assert_eq!(samples.len(), 3);
    let sent = harness.reporter.send_metrics(&samples, instance.rates_mut());
    assert_eq!(sent, 1, "F029 FALSIFIED: Non-finite value emitted");
    assert!(harness.sink.points().iter().all(|p| p.value.is_finite()));
}

/// F030: Rate state belongs to one instance
///
/// # Falsification Attempt
/// Two instances read the same counter; each seeds its own state.
#[tokio::test]
async fn f030_rates_partitioned_by_instance() {
    let harness = TestHarness::new();
    harness.source.add_scalar(&bean("d:type=A"), "Requests", "long", 1.0);
    let rule = || {
        vec![Configuration::include(
            Filter::domain("d").with_attributes(typed(&["Requests"], MetricType::Counter)),
        )]
    };
    let mut first = connected(&harness, remote(rule())).await;
    let mut second = connected(
        &harness,
        InstanceConfig {
            name: Some("other".into()),
            ..remote(rule())
        },
    )
    .await;

    let samples = first.collect(&*harness.sink).await.unwrap();
    harness.reporter.send_metrics(&samples, first.rates_mut());
    assert_eq!(first.rates().len(), 1);
    assert!(second.rates().is_empty(), "F030 FALSIFIED: Rate state leaked across instances");

    let samples = second.collect(&*harness.sink).await.unwrap();
    assert_eq!(
        harness.reporter.send_metrics(&samples, second.rates_mut()),
        0,
        "F030 FALSIFIED: Second instance reused first instance state"
    );
}

// =============================================================================
// F031-F035: Refresh and value conversion
// =============================================================================

/// F031: The bean list is refreshed only once the period has elapsed
///
/// # Falsification Attempt
/// Add a bean after init and collect before and after the period.
#[tokio::test]
async fn f031_refresh_after_period() {
    let harness = TestHarness::new();
    harness.source.add_scalar(&bean("d:type=A"), "Count", "long", 1.0);
    let config = InstanceConfig {
        refresh_beans: Duration::from_secs(10),
        ..remote(vec![Configuration::include(Filter::domain("d"))])
    };
    let mut instance = connected(&harness, config).await;
    harness.source.add_scalar(&bean("d:type=B"), "Count", "long", 2.0);

    harness.advance(9_999);
    let samples = instance.collect(&*harness.sink).await.unwrap();
    assert_eq!(samples.len(), 1, "F031 FALSIFIED: Refreshed before the period");

    harness.advance(1);
    let samples = instance.collect(&*harness.sink).await.unwrap();
    assert_eq!(samples.len(), 2, "F031 FALSIFIED: Not refreshed after the period");
}

/// F032: Text and boolean values are converted
///
/// # Falsification Attempt
/// Serve a mapped string, a numeric string and a boolean.
#[tokio::test]
async fn f032_value_conversion() {
    let harness = TestHarness::new();
    let a = bean("d:type=A");
    harness.source.add_attribute(
        &a,
        beanfetch_core::AttributeDescriptor::new("State", "java.lang.String"),
        AttributeValue::Text("UP".into()),
    );
    harness.source.add_attribute(
        &a,
        beanfetch_core::AttributeDescriptor::new("Level", "java.lang.String"),
        AttributeValue::Text(" 42.5 ".into()),
    );
    harness.source.add_attribute(
        &a,
        beanfetch_core::AttributeDescriptor::new("Enabled", "boolean"),
        AttributeValue::Boolean(true),
    );
    let state = AttributeSpec {
        values: BTreeMap::from([("UP".to_string(), 1.0), ("DOWN".to_string(), 0.0)]),
        ..AttributeSpec::default()
    };
    let filter = AttributeFilter::Detailed(BTreeMap::from([
        ("State".to_string(), state),
        ("Level".to_string(), AttributeSpec::default()),
        ("Enabled".to_string(), AttributeSpec::default()),
    ]));
    let mut instance = connected(
        &harness,
        remote(vec![Configuration::include(Filter::domain("d").with_attributes(filter))]),
    )
    .await;

    let samples = instance.collect(&*harness.sink).await.unwrap();
    let by_attribute: BTreeMap<_, _> = samples
        .iter()
        .map(|s| (s.attribute.as_str(), s.value))
        .collect();
    assert_eq!(by_attribute.get("State"), Some(&1.0), "F032 FALSIFIED: Mapped text wrong");
    assert_eq!(by_attribute.get("Level"), Some(&42.5), "F032 FALSIFIED: Numeric text wrong");
    assert_eq!(by_attribute.get("Enabled"), Some(&1.0), "F032 FALSIFIED: Boolean wrong");
}

/// F033: Every sample carries the owning check and instance
///
/// # Falsification Attempt
/// Inspect check name and tags of a collected sample.
#[tokio::test]
async fn f033_samples_stamped() {
    let harness = TestHarness::new();
    harness.source.add_scalar(&bean("d:type=A,name=N"), "Count", "long", 1.0);
    let config = InstanceConfig {
        tags: BTreeMap::from([("env".to_string(), "prod".to_string())]),
        ..remote(vec![Configuration::include(Filter::domain("d"))])
    };
    let mut instance = connected(&harness, config).await;
    let samples = instance.collect(&*harness.sink).await.unwrap();
    assert_eq!(samples[0].check_name.as_deref(), Some("jmx"), "F033 FALSIFIED: Check name missing");
    assert_eq!(
        samples[0].tags,
        vec![
            "env:prod",
            "instance:jmx-db1-7199",
            "jmx_domain:d",
            "type:A",
            "name:N"
        ],
        "F033 FALSIFIED: Tag layout wrong"
    );
}
