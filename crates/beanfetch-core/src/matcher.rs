//! Registry rebuild: classify every discovered attribute and bind it to
//! the first configuration that selects it.
//!
//! # Toyota Way: Heijunka (平準化)
//! The metric budget levels the load on the managed process. Under the
//! collect action the scan stops at the budget; listing actions keep
//! scanning to show what would be left out, without registering it.

use std::sync::Arc;

use crate::attribute::{AttributeContext, ClassifiedAttribute};
use crate::config::{Action, Configuration};
use crate::naming::NameParts;
use crate::registry::AttributeRegistry;
use crate::reporter::Sink;
use crate::source::AttributeSource;
use crate::types::ObjectName;

/// Inputs of one rebuild that do not change during it.
#[derive(Debug, Clone, Copy)]
pub struct MatchSettings<'a> {
    /// What the run is for.
    pub action: Action,
    /// Metric budget.
    pub max_returned_metrics: usize,
    /// Rules in declared order.
    pub configurations: &'a [Arc<Configuration>],
    /// Per-instance attribute settings.
    pub context: &'a AttributeContext,
}

/// Outcome of a rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    /// Attributes registered.
    pub matched: usize,
    /// Declared metric count of the registered attributes.
    pub declared_metrics: usize,
    /// The budget was hit.
    pub limit_reached: bool,
    /// Attributes examined (classification attempted).
    pub evaluated: usize,
}

/// Clears `registry` and repopulates it from `beans`.
///
/// Listing failures skip the bean; classification and match errors skip
/// the attribute or configuration. Nothing here aborts the rebuild.
pub async fn rebuild_registry(
    registry: &mut AttributeRegistry,
    beans: &[ObjectName],
    source: &dyn AttributeSource,
    settings: &MatchSettings<'_>,
    sink: &dyn Sink,
    instance_display: &str,
) -> RefreshSummary {
    let action = settings.action;
    let limit = settings.max_returned_metrics;
    let mut summary = RefreshSummary::default();
    let mut banner_shown = false;
    let mut listed = 0usize;

    registry.clear();

    if !action.is_collect() {
        sink.display_instance_name(instance_display);
    }

    'beans: for bean in beans {
        if summary.limit_reached && action.is_collect() {
            break;
        }

        tracing::debug!(bean = %bean, "getting attributes for bean");
        let descriptors = match source.attributes_for_bean(bean).await {
            Ok(descriptors) => descriptors,
            Err(e) => {
                tracing::warn!(bean = %bean, error = %e, "cannot get bean attributes");
                continue;
            }
        };

        for descriptor in descriptors {
            if summary.declared_metrics >= limit {
                summary.limit_reached = true;
                if action.is_collect() {
                    tracing::warn!(limit, "maximum number of metrics reached");
                    break 'beans;
                }
                if !banner_shown && action.displays_limit_banner() {
                    sink.display_metric_reached();
                    banner_shown = true;
                }
            }

            summary.evaluated += 1;
            let mut attribute = match ClassifiedAttribute::classify(descriptor, bean, settings.context) {
                Ok(Some(attribute)) => attribute,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(bean = %bean, error = %e, "cannot classify attribute");
                    continue;
                }
            };

            // Some(registered) once a configuration matched.
            let mut matched = None;
            for conf in settings.configurations {
                match attribute.matches(conf) {
                    Ok(true) => {
                        attribute.set_matching_conf(Arc::clone(conf));
                        let count = attribute.metrics_count();
                        listed += count;
                        let register = !summary.limit_reached;
                        if register {
                            summary.declared_metrics += count;
                            let parts = NameParts::new(bean, attribute.name());
                            sink.declare_family(&parts.declaration(
                                &attribute.canonical_type().name,
                                attribute.complexity(),
                                count,
                            ));
                        }
                        if action.displays_matching(summary.limit_reached) {
                            sink.display_matching_attribute(&attribute, listed, limit);
                        }
                        matched = Some(register);
                        break;
                    }
                    Ok(false) => {}
                    Err(e) => tracing::error!(
                        attribute = %attribute,
                        error = %e,
                        "error while trying to match attribute against configuration"
                    ),
                }
            }

            match matched {
                Some(true) => registry.push(attribute),
                Some(false) => {}
                None if action.displays_non_matching() => {
                    sink.display_non_matching_attribute(&attribute);
                }
                None => {}
            }
        }
    }

    summary.matched = registry.len();
    tracing::info!(matched = summary.matched, "found matching attributes");
    summary
}
