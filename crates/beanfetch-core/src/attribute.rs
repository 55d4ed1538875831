//! Classified attributes: matching, budgeting and value extraction.
//!
//! # Toyota Way: Poka-Yoke (ポカヨケ)
//! The variant set is closed. An attribute is either a single scalar or a
//! composite expanding into items; unsupported types never get this far.

use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::classify::{self, CanonicalType, TypeClass};
use crate::config::{AttributeFilter, AttributeSpec, Configuration};
use crate::error::{FetchError, Result};
use crate::source::AttributeSource;
use crate::types::{
    AttributeDescriptor, AttributeKey, AttributeValue, Complexity, MetricSample, MetricType,
    ObjectName,
};

/// Domain receiving the alternative alias layout.
pub const CASSANDRA_METRICS_DOMAIN: &str = "org.apache.cassandra.metrics";

/// Per-instance settings every attribute needs.
#[derive(Debug, Clone, Default)]
pub struct AttributeContext {
    /// Instance name, tagged as `instance:<name>`.
    pub instance_name: String,
    /// Instance tags as `key:value`.
    pub instance_tags: Vec<String>,
    /// Alternative aliasing for the cassandra metrics domain.
    pub cassandra_aliasing: bool,
}

/// State shared by both attribute variants.
#[derive(Debug, Clone)]
pub struct AttributeCore {
    descriptor: AttributeDescriptor,
    bean: ObjectName,
    canonical: CanonicalType,
    tags: Vec<String>,
    cassandra_aliasing: bool,
    matching_conf: Option<Arc<Configuration>>,
}

impl AttributeCore {
    fn new(
        descriptor: AttributeDescriptor,
        bean: ObjectName,
        canonical: CanonicalType,
        ctx: &AttributeContext,
    ) -> Self {
        let mut tags = ctx.instance_tags.clone();
        tags.push(format!("instance:{}", ctx.instance_name));
        tags.push(format!("jmx_domain:{}", bean.domain()));
        tags.extend(bean.properties().iter().map(|(k, v)| format!("{k}:{v}")));
        Self {
            descriptor,
            bean,
            canonical,
            tags,
            cassandra_aliasing: ctx.cassandra_aliasing,
            matching_conf: None,
        }
    }

    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn sample(
        &self,
        alias: String,
        value: f64,
        metric_type: MetricType,
        complexity: Complexity,
        dimension: Option<usize>,
    ) -> MetricSample {
        MetricSample {
            alias,
            value,
            tags: self.tags.clone(),
            metric_type,
            complexity,
            bean: self.bean.clone(),
            attribute: self.descriptor.name.clone(),
            dimension,
            check_name: None,
        }
    }

    /// Reporting options for the whole attribute or one of its items.
    fn spec_for(&self, item: Option<&str>) -> Option<(&AttributeSpec, bool)> {
        let filter = &self.matching_conf.as_ref()?.include.attribute;
        if let Some(key) = item {
            if let Some(spec) = filter.spec(&format!("{}.{key}", self.name())) {
                return Some((spec, true));
            }
        }
        filter.spec(self.name()).map(|spec| (spec, false))
    }

    fn metric_type(&self, item: Option<&str>) -> MetricType {
        self.spec_for(item)
            .map(|(spec, _)| spec.metric_type)
            .unwrap_or_default()
    }

    fn alias(&self, item: Option<&str>) -> String {
        let configured = self
            .spec_for(item)
            .and_then(|(spec, per_item)| spec.alias.as_deref().map(|a| (a, per_item)));
        let suffix = |base: String, per_item: bool| match item {
            Some(key) if !per_item => format!("{base}.{key}"),
            _ => base,
        };
        let raw = if let Some((alias, per_item)) = configured {
            suffix(self.substitute(alias), per_item)
        } else if self.cassandra_aliasing && self.bean.domain() == CASSANDRA_METRICS_DOMAIN {
            let name = self.bean.key_property("name").unwrap_or_default();
            let base = if self.name() == "Value" {
                format!("cassandra.{name}")
            } else {
                format!("cassandra.{name}.{}", self.name())
            };
            suffix(base, false)
        } else {
            suffix(format!("jmx.{}.{}", self.bean.domain(), self.name()), false)
        };
        convert_metric_name(&raw)
    }

    fn substitute(&self, alias: &str) -> String {
        let mut out = alias
            .replace("$domain", self.bean.domain())
            .replace("$attribute", self.name());
        let mut props: Vec<_> = self.bean.properties().iter().collect();
        // Longest keys first so `$name` cannot clobber `$namespace`.
        props.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        for (k, v) in props {
            out = out.replace(&format!("${k}"), v);
        }
        out
    }

    fn to_number(&self, value: &AttributeValue, item: Option<&str>) -> Result<f64> {
        match value {
            AttributeValue::Number(n) => Ok(*n),
            AttributeValue::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            AttributeValue::Text(s) => {
                if let Some(mapped) = self.spec_for(item).and_then(|(spec, _)| spec.values.get(s)) {
                    return Ok(*mapped);
                }
                s.trim().parse::<f64>().map_err(|_| {
                    FetchError::attribute(format!("{self}: value '{s}' is not numeric"))
                })
            }
            AttributeValue::Composite(_) | AttributeValue::Array(_) => Err(FetchError::attribute(
                format!("{self}: structured value where a scalar was expected"),
            )),
        }
    }
}

impl fmt::Display for AttributeCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Bean name: {} - Attribute name: {} - Attribute type: {}",
            self.bean, self.descriptor.name, self.canonical.name
        )
    }
}

/// An attribute whose type the engine knows how to collect.
#[derive(Debug, Clone)]
pub enum ClassifiedAttribute {
    /// Single value, one metric.
    Simple {
        /// Shared state.
        core: AttributeCore,
    },
    /// Structured value, one metric per selected item.
    Composite {
        /// Shared state.
        core: AttributeCore,
        /// Items reported, in descriptor order.
        selected: Vec<String>,
    },
}

impl ClassifiedAttribute {
    /// Classifies `descriptor` on `bean`.
    ///
    /// Returns `Ok(None)` for unsupported types.
    ///
    /// # Errors
    /// Returns [`FetchError::Classification`] when the raw type cannot be
    /// resolved.
    pub fn classify(
        descriptor: AttributeDescriptor,
        bean: &ObjectName,
        ctx: &AttributeContext,
    ) -> Result<Option<Self>> {
        let canonical = classify::classify(&descriptor.type_name)?;
        let attribute = match canonical.class {
            TypeClass::Scalar => {
                tracing::debug!(bean = %bean, attribute = %descriptor.name, "simple type");
                Self::Simple {
                    core: AttributeCore::new(descriptor, bean.clone(), canonical, ctx),
                }
            }
            TypeClass::Composite => {
                tracing::debug!(bean = %bean, attribute = %descriptor.name, "complex type");
                let selected = descriptor.keys.clone();
                Self::Composite {
                    core: AttributeCore::new(descriptor, bean.clone(), canonical, ctx),
                    selected,
                }
            }
            TypeClass::Unsupported => {
                tracing::debug!(
                    bean = %bean,
                    attribute = %descriptor.name,
                    type_name = %canonical.name,
                    "unsupported type"
                );
                return Ok(None);
            }
        };
        Ok(Some(attribute))
    }

    fn core(&self) -> &AttributeCore {
        match self {
            Self::Simple { core } | Self::Composite { core, .. } => core,
        }
    }

    /// Owning bean.
    #[must_use]
    pub fn bean(&self) -> &ObjectName {
        &self.core().bean
    }

    /// Attribute name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.core().name()
    }

    /// Resolved type.
    #[must_use]
    pub fn canonical_type(&self) -> &CanonicalType {
        &self.core().canonical
    }

    /// Simple or complex.
    #[must_use]
    pub const fn complexity(&self) -> Complexity {
        match self {
            Self::Simple { .. } => Complexity::Simple,
            Self::Composite { .. } => Complexity::Complex,
        }
    }

    /// Identity inside an instance.
    #[must_use]
    pub fn key(&self) -> AttributeKey {
        AttributeKey {
            bean: self.bean().canonical_name(),
            attribute: self.name().to_string(),
        }
    }

    /// Tags attached to every sample.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.core().tags
    }

    /// Bound configuration, if any.
    #[must_use]
    pub fn matching_conf(&self) -> Option<&Arc<Configuration>> {
        self.core().matching_conf.as_ref()
    }

    /// Number of metrics this attribute contributes.
    #[must_use]
    pub fn metrics_count(&self) -> usize {
        match self {
            Self::Simple { .. } => 1,
            Self::Composite { selected, .. } => selected.len(),
        }
    }

    /// Returns true if `conf` selects this attribute.
    ///
    /// # Errors
    /// Returns [`FetchError::Pattern`] if the configuration names a
    /// malformed bean.
    pub fn matches(&self, conf: &Configuration) -> Result<bool> {
        let core = self.core();
        if !conf.include.selects_bean(&core.bean)? {
            return Ok(false);
        }
        if let Some(exclude) = &conf.exclude {
            if exclude.hits_bean(&core.bean)? || exclude.attribute.contains(core.name()) {
                return Ok(false);
            }
        }
        Ok(match self {
            Self::Simple { .. } => {
                let filter = &conf.include.attribute;
                filter.is_empty() || filter.contains(core.name())
            }
            Self::Composite { .. } => !self.selected_items(conf).is_empty(),
        })
    }

    fn selected_items(&self, conf: &Configuration) -> Vec<String> {
        let core = self.core();
        let include = &conf.include.attribute;
        let whole = include.is_empty() || include.contains(core.name());
        let excluded = conf
            .exclude
            .as_ref()
            .map(|e| &e.attribute)
            .filter(|f| !f.is_empty());
        core.descriptor
            .keys
            .iter()
            .filter(|key| {
                let item = format!("{}.{key}", core.name());
                (whole || include.contains(&item))
                    && !excluded.is_some_and(|f: &AttributeFilter| f.contains(&item))
            })
            .cloned()
            .collect()
    }

    /// Binds the configuration that matched.
    pub fn set_matching_conf(&mut self, conf: Arc<Configuration>) {
        let items = matches!(self, Self::Composite { .. }).then(|| self.selected_items(&conf));
        match self {
            Self::Simple { core } => core.matching_conf = Some(conf),
            Self::Composite { core, selected } => {
                if let Some(items) = items {
                    *selected = items;
                }
                core.matching_conf = Some(conf);
            }
        }
    }

    /// Reads the attribute and converts it into samples.
    ///
    /// # Errors
    /// Transport errors from the source propagate unchanged; conversion
    /// failures are [`FetchError::Attribute`].
    pub async fn collect(&self, source: &dyn AttributeSource) -> Result<Vec<MetricSample>> {
        let core = self.core();
        if core.matching_conf.is_none() {
            return Err(FetchError::attribute(format!("{self}: no matching configuration")));
        }
        let value = source.read_attribute(&core.bean, core.name()).await?;
        match self {
            Self::Simple { .. } => {
                let number = core.to_number(&value, None)?;
                Ok(vec![core.sample(
                    core.alias(None),
                    number,
                    core.metric_type(None),
                    Complexity::Simple,
                    None,
                )])
            }
            Self::Composite { selected, .. } => selected
                .iter()
                .enumerate()
                .map(|(i, key)| {
                    let item = value.item(key).ok_or_else(|| {
                        FetchError::attribute(format!("{self}: missing item '{key}'"))
                    })?;
                    let number = core.to_number(&item, Some(key))?;
                    Ok(core.sample(
                        core.alias(Some(key)),
                        number,
                        core.metric_type(Some(key)),
                        Complexity::Complex,
                        Some(i),
                    ))
                })
                .collect(),
        }
    }
}

impl fmt::Display for ClassifiedAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.core().fmt(f)
    }
}

// =============================================================================
// Metric name normalisation
// =============================================================================

type NamePattern = LazyLock<Option<Regex>>;

static FIRST_CAP: NamePattern = LazyLock::new(|| Regex::new(r"(.)([A-Z][a-z]+)").ok());
static ALL_CAP: NamePattern = LazyLock::new(|| Regex::new(r"([a-z0-9])([A-Z])").ok());
static INVALID: NamePattern = LazyLock::new(|| Regex::new(r"([^a-zA-Z0-9_.]+)|(^[^a-zA-Z]+)").ok());
static DOT_UNDERSCORE: NamePattern = LazyLock::new(|| Regex::new(r"_*\._*").ok());

/// Applies `pattern`, leaving `text` as is if it failed to compile.
fn rewrite(pattern: &NamePattern, text: &str, replacement: &str) -> String {
    match pattern.as_ref() {
        Some(re) => re.replace_all(text, replacement).into_owned(),
        None => text.to_string(),
    }
}

/// Normalises an alias: camelCase to snake_case, lower-case, invalid
/// characters to `_`, underscores around dots collapsed.
#[must_use]
pub fn convert_metric_name(name: &str) -> String {
    let name = rewrite(&FIRST_CAP, name, "${1}_${2}");
    let name = rewrite(&ALL_CAP, &name, "${1}_${2}").to_lowercase();
    let name = rewrite(&INVALID, &name, "_");
    rewrite(&DOT_UNDERSCORE, &name, ".").trim().to_string()
}
