//! Falsification Tests: Category D - Bean Scoping (F061-F070)
//!
//! # Toyota Way: Muda (無駄)
//! Scoped queries must never lose a bean a rule selects, and must fall
//! back to the full listing whenever narrowing is impossible.

use std::time::Duration;

use beanfetch_core::{Action, Configuration, Filter, InstanceConfig};
use beanfetch_test::TestHarness;

use super::{bean, remote, values};

fn populated() -> TestHarness {
    let harness = TestHarness::new();
    for name in ["d:type=A", "d:type=B", "e:type=A", "f:type=C"] {
        harness.source.add_scalar(&bean(name), "Count", "long", 1.0);
    }
    harness
}

async fn init(harness: &TestHarness, config: InstanceConfig, action: Action) -> usize {
    let mut instance = harness.instance(config, action);
    instance
        .init(&*harness.connector, &*harness.sink, false)
        .await
        .unwrap()
        .matched
}

fn rendered(harness: &TestHarness) -> Vec<Option<String>> {
    harness.source.queries()
}

// =============================================================================
// F061-F065: Query narrowing
// =============================================================================

/// F061: Collection queries the rule's domain and single-valued keys
///
/// # Falsification Attempt
/// Rule `domain=d, type=A`; only that pattern may be queried.
#[tokio::test]
async fn f061_scoped_query() {
    let harness = populated();
    let matched = init(
        &harness,
        remote(vec![Configuration::include(
            Filter::domain("d").with_property("type", values(&["A"])),
        )]),
        Action::Collect,
    )
    .await;
    assert_eq!(
        rendered(&harness),
        vec![Some("d:type=A,*".to_string())],
        "F061 FALSIFIED: Query not narrowed"
    );
    assert_eq!(matched, 1);
}

/// F062: Listing everything never narrows
///
/// # Falsification Attempt
/// Same rule under `list_everything`.
#[tokio::test]
async fn f062_list_everything_unscoped() {
    let harness = populated();
    init(
        &harness,
        remote(vec![Configuration::include(Filter::domain("d"))]),
        Action::ListEverything,
    )
    .await;
    assert_eq!(rendered(&harness), vec![None], "F062 FALSIFIED: Listing was narrowed");
}

/// F063: An empty scoped result falls back to the full listing
///
/// # Falsification Attempt
/// Rule on a domain that holds no bean.
#[tokio::test]
async fn f063_empty_scope_falls_back() {
    let harness = populated();
    init(
        &harness,
        remote(vec![Configuration::include(Filter::domain("absent"))]),
        Action::Collect,
    )
    .await;
    assert_eq!(
        rendered(&harness),
        vec![Some("absent:*".to_string()), None],
        "F063 FALSIFIED: No fallback after an empty scope"
    );
}

/// F064: A rule without a single domain queries everything
///
/// # Falsification Attempt
/// Rule constraining only a key property.
#[tokio::test]
async fn f064_irreducible_rule_unscoped() {
    let harness = populated();
    let matched = init(
        &harness,
        remote(vec![Configuration::include(
            Filter::default().with_property("type", values(&["A"])),
        )]),
        Action::Collect,
    )
    .await;
    assert_eq!(rendered(&harness), vec![None], "F064 FALSIFIED: Irreducible rule narrowed");
    assert_eq!(matched, 2, "F064 FALSIFIED: Fallback lost beans");
}

/// F065: One query per domain, in rule order
///
/// # Falsification Attempt
/// Rules on `e` then `d`.
#[tokio::test]
async fn f065_one_query_per_domain() {
    let harness = populated();
    let matched = init(
        &harness,
        remote(vec![
            Configuration::include(Filter::domain("e")),
            Configuration::include(Filter::domain("d")),
        ]),
        Action::Collect,
    )
    .await;
    assert_eq!(
        rendered(&harness),
        vec![Some("e:*".to_string()), Some("d:*".to_string())],
        "F065 FALSIFIED: Unexpected queries"
    );
    assert_eq!(matched, 3);
}

// =============================================================================
// F066-F070: Superset guarantee
// =============================================================================

/// F066: Multi-valued keys do not narrow the scope
///
/// # Falsification Attempt
/// Rule `type in [A, B]`; both beans must be collected.
#[tokio::test]
async fn f066_multi_valued_kept_wide() {
    let harness = populated();
    let matched = init(
        &harness,
        remote(vec![Configuration::include(
            Filter::domain("d").with_property("type", values(&["A", "B"])),
        )]),
        Action::Collect,
    )
    .await;
    assert_eq!(rendered(&harness), vec![Some("d:*".to_string())]);
    assert_eq!(matched, 2, "F066 FALSIFIED: A selected bean was lost");
}

/// F067: Same-domain rules keep only shared constraints
///
/// # Falsification Attempt
/// Rules `d,type=A` and `d,type=B` must query `d:*`.
#[tokio::test]
async fn f067_same_domain_rules_widen() {
    let harness = populated();
    let matched = init(
        &harness,
        remote(vec![
            Configuration::include(Filter::domain("d").with_property("type", values(&["A"]))),
            Configuration::include(Filter::domain("d").with_property("type", values(&["B"]))),
        ]),
        Action::Collect,
    )
    .await;
    assert_eq!(
        rendered(&harness),
        vec![Some("d:*".to_string())],
        "F067 FALSIFIED: Shared domain narrowed to one rule"
    );
    assert_eq!(matched, 2);
}

/// F068: Scopes are reused on later refreshes
///
/// # Falsification Attempt
/// Refresh after the period; the same pattern must be queried again.
#[tokio::test]
async fn f068_scope_reused_on_refresh() {
    let harness = populated();
    let config = InstanceConfig {
        refresh_beans: Duration::from_secs(1),
        ..remote(vec![Configuration::include(
            Filter::domain("d").with_property("type", values(&["A"])),
        )])
    };
    let mut instance = harness.instance(config, Action::Collect);
    instance
        .init(&*harness.connector, &*harness.sink, false)
        .await
        .unwrap();
    harness.advance(1_000);
    instance.collect(&*harness.sink).await.unwrap();
    assert_eq!(
        rendered(&harness),
        vec![Some("d:type=A,*".to_string()), Some("d:type=A,*".to_string())],
        "F068 FALSIFIED: Refresh changed the scope"
    );
}

/// F069: Bean-list rules scope to their shared domain
///
/// # Falsification Attempt
/// Rule naming two beans of domain `d`.
#[tokio::test]
async fn f069_bean_list_scope() {
    let harness = populated();
    let matched = init(
        &harness,
        remote(vec![Configuration::include(
            Filter::default().with_beans(values(&["d:type=A", "d:type=B"])),
        )]),
        Action::Collect,
    )
    .await;
    assert_eq!(rendered(&harness), vec![Some("d:*".to_string())]);
    assert_eq!(matched, 2, "F069 FALSIFIED: Listed bean missed");
}
