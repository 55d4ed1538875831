//! Check and instance configuration.
//!
//! Per Iron Lotus Framework: Configuration is validated at load time (Poka-Yoke),
//! with sensible defaults and clear error messages.
//!
//! A check file carries shared matching rules in `init_config` and one
//! table per monitored instance:
//!
//! ```toml
//! [init_config]
//! [[init_config.conf]]
//! include = { domain = "java.lang", type = "Threading", attribute = ["ThreadCount"] }
//!
//! [[instances]]
//! host = "localhost"
//! port = 7199
//! max_returned_metrics = 100
//! refresh_beans = "5m"
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FetchError, Result};
use crate::types::{MetricType, ObjectName};

/// Default metric budget per instance.
pub const DEFAULT_MAX_RETURNED_METRICS: usize = 350;

/// Default bean catalogue refresh period.
pub const DEFAULT_REFRESH_BEANS: Duration = Duration::from_secs(600);

// =============================================================================
// Action
// =============================================================================

/// What the agent does with matched attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Collect and report samples.
    #[default]
    Collect,
    /// List every attribute, matching or not.
    ListEverything,
    /// List matching attributes.
    ListMatching,
    /// List attributes that match no configuration.
    ListNotMatching,
    /// List attributes that will be collected (within budget).
    ListCollected,
    /// List matching attributes beyond the budget.
    ListLimited,
}

impl Action {
    /// Returns true for the collect action.
    #[must_use]
    pub const fn is_collect(&self) -> bool {
        matches!(self, Self::Collect)
    }

    /// Returns true if bean queries may be narrowed to computed scopes.
    #[must_use]
    pub const fn limits_query_scope(&self) -> bool {
        !matches!(self, Self::ListEverything)
    }

    /// Returns true if the metric-limit banner is displayed.
    #[must_use]
    pub const fn displays_limit_banner(&self) -> bool {
        !matches!(self, Self::Collect | Self::ListCollected | Self::ListNotMatching)
    }

    /// Returns true if a matching attribute is displayed, given the limit state.
    #[must_use]
    pub const fn displays_matching(&self, limit_reached: bool) -> bool {
        match self {
            Self::ListEverything | Self::ListMatching => true,
            Self::ListCollected => !limit_reached,
            Self::ListLimited => limit_reached,
            Self::Collect | Self::ListNotMatching => false,
        }
    }

    /// Returns true if non-matching attributes are displayed.
    #[must_use]
    pub const fn displays_non_matching(&self) -> bool {
        matches!(self, Self::ListEverything | Self::ListNotMatching)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Collect => "collect",
            Self::ListEverything => "list_everything",
            Self::ListMatching => "list_matching",
            Self::ListNotMatching => "list_not_matching",
            Self::ListCollected => "list_collected",
            Self::ListLimited => "list_limited",
        };
        write!(f, "{s}")
    }
}

// =============================================================================
// Matching rules
// =============================================================================

/// One string or a list of strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

/// List of accepted values for a filter criterion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "OneOrMany", into = "OneOrMany")]
pub struct ValueList(Vec<String>);

impl From<OneOrMany> for ValueList {
    fn from(value: OneOrMany) -> Self {
        match value {
            OneOrMany::One(s) => Self(vec![s]),
            OneOrMany::Many(v) => Self(v),
        }
    }
}

impl From<ValueList> for OneOrMany {
    fn from(value: ValueList) -> Self {
        Self::Many(value.0)
    }
}

impl<S: Into<String>> FromIterator<S> for ValueList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl ValueList {
    /// Returns true if `value` is listed.
    #[must_use]
    pub fn contains(&self, value: &str) -> bool {
        self.0.iter().any(|v| v == value)
    }

    /// Returns the listed values.
    #[must_use]
    pub fn values(&self) -> &[String] {
        &self.0
    }

    /// Returns true if nothing is listed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Per-attribute reporting options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeSpec {
    /// Output name; `$domain`, `$attribute` and `$<key>` are substituted.
    #[serde(default)]
    pub alias: Option<String>,

    /// Gauge (default) or counter-like.
    #[serde(default)]
    pub metric_type: MetricType,

    /// Numeric values for string-valued attributes.
    #[serde(default)]
    pub values: BTreeMap<String, f64>,
}

/// Attribute selection inside a filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeFilter {
    /// Attribute names (an empty list selects every attribute).
    List(Vec<String>),
    /// Attribute names with reporting options.
    Detailed(BTreeMap<String, AttributeSpec>),
}

impl Default for AttributeFilter {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl AttributeFilter {
    /// Returns true if no attribute is named.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::List(names) => names.is_empty(),
            Self::Detailed(specs) => specs.is_empty(),
        }
    }

    /// Returns true if `name` is listed.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        match self {
            Self::List(names) => names.iter().any(|n| n == name),
            Self::Detailed(specs) => specs.contains_key(name),
        }
    }

    /// Returns the reporting options for `name`.
    #[must_use]
    pub fn spec(&self, name: &str) -> Option<&AttributeSpec> {
        match self {
            Self::List(_) => None,
            Self::Detailed(specs) => specs.get(name),
        }
    }
}

/// Bean and attribute selection criteria.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Bean domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// Full bean names.
    #[serde(default, skip_serializing_if = "ValueList::is_empty")]
    pub bean: ValueList,

    /// Attribute selection.
    #[serde(default)]
    pub attribute: AttributeFilter,

    /// Any other key: a key property and its accepted values.
    #[serde(flatten)]
    pub properties: BTreeMap<String, ValueList>,
}

impl Filter {
    /// Creates a filter on a domain.
    #[must_use]
    pub fn domain(domain: impl Into<String>) -> Self {
        Self {
            domain: Some(domain.into()),
            ..Self::default()
        }
    }

    /// Adds a key property constraint.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, values: ValueList) -> Self {
        self.properties.insert(key.into(), values);
        self
    }

    /// Sets the attribute selection.
    #[must_use]
    pub fn with_attributes(mut self, attribute: AttributeFilter) -> Self {
        self.attribute = attribute;
        self
    }

    /// Sets the bean name list.
    #[must_use]
    pub fn with_beans(mut self, beans: ValueList) -> Self {
        self.bean = beans;
        self
    }

    /// Parses the configured bean names.
    ///
    /// # Errors
    /// Returns [`FetchError::Pattern`] for a malformed name.
    pub fn bean_names(&self) -> Result<Vec<ObjectName>> {
        self.bean.values().iter().map(|b| b.parse()).collect()
    }

    /// Returns true if every criterion of this filter accepts the bean.
    ///
    /// # Errors
    /// Returns [`FetchError::Pattern`] if a configured bean name is malformed.
    pub fn selects_bean(&self, bean: &ObjectName) -> Result<bool> {
        if let Some(domain) = &self.domain {
            if domain != bean.domain() {
                return Ok(false);
            }
        }
        if !self.bean.is_empty() && !self.bean_names()?.contains(bean) {
            return Ok(false);
        }
        Ok(self
            .properties
            .iter()
            .all(|(k, values)| bean.key_property(k).is_some_and(|v| values.contains(v))))
    }

    /// Returns true if any bean-level criterion of this filter hits the bean.
    ///
    /// Used for exclusion: each named criterion rejects on its own.
    ///
    /// # Errors
    /// Returns [`FetchError::Pattern`] if a configured bean name is malformed.
    pub fn hits_bean(&self, bean: &ObjectName) -> Result<bool> {
        if self.domain.as_deref() == Some(bean.domain()) {
            return Ok(true);
        }
        if !self.bean.is_empty() && self.bean_names()?.contains(bean) {
            return Ok(true);
        }
        Ok(self
            .properties
            .iter()
            .any(|(k, values)| bean.key_property(k).is_some_and(|v| values.contains(v))))
    }
}

/// One matching rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// What to collect.
    pub include: Filter,

    /// What to leave out of `include`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Filter>,
}

impl Configuration {
    /// Creates a rule from an include filter.
    #[must_use]
    pub fn include(include: Filter) -> Self {
        Self {
            include,
            exclude: None,
        }
    }

    /// Sets the exclude filter.
    #[must_use]
    pub fn with_exclude(mut self, exclude: Filter) -> Self {
        self.exclude = Some(exclude);
        self
    }
}

// =============================================================================
// Instance and check
// =============================================================================

/// One monitored target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceConfig {
    /// Explicit instance name.
    #[serde(default)]
    pub name: Option<String>,

    /// Target host.
    #[serde(default)]
    pub host: Option<String>,

    /// Target port.
    #[serde(default)]
    pub port: Option<u16>,

    /// Full service URL.
    #[serde(default)]
    pub jmx_url: Option<String>,

    /// Local process selector.
    #[serde(default)]
    pub process_name_regex: Option<String>,

    /// Tags attached to every sample.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,

    /// Instance-specific matching rules.
    #[serde(default)]
    pub conf: Option<Vec<Configuration>>,

    /// Metric budget.
    #[serde(default = "default_max_returned_metrics")]
    pub max_returned_metrics: usize,

    /// Bean catalogue refresh period.
    #[serde(default = "default_refresh_beans")]
    #[serde(with = "duration_serde")]
    pub refresh_beans: Duration,

    /// Alternative aliasing for `org.apache.cassandra.metrics`.
    #[serde(default)]
    pub cassandra_aliasing: bool,
}

fn default_max_returned_metrics() -> usize {
    DEFAULT_MAX_RETURNED_METRICS
}

fn default_refresh_beans() -> Duration {
    DEFAULT_REFRESH_BEANS
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            name: None,
            host: None,
            port: None,
            jmx_url: None,
            process_name_regex: None,
            tags: BTreeMap::new(),
            conf: None,
            max_returned_metrics: default_max_returned_metrics(),
            refresh_beans: default_refresh_beans(),
            cassandra_aliasing: false,
        }
    }
}

impl InstanceConfig {
    /// Creates an instance targeting `host:port`.
    #[must_use]
    pub fn remote(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: Some(host.into()),
            port: Some(port),
            ..Self::default()
        }
    }

    /// Derives the instance name used in tags.
    ///
    /// Explicit name, else `<check>-<process_name_regex>`, else
    /// `<check>-<host>-<port>`, else the check name.
    #[must_use]
    pub fn instance_name(&self, check_name: &str) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        if let Some(regex) = &self.process_name_regex {
            return format!("{check_name}-{regex}");
        }
        if let Some(host) = &self.host {
            let port = self.port.map(|p| p.to_string()).unwrap_or_default();
            return format!("{check_name}-{host}-{port}");
        }
        tracing::warn!(
            check = check_name,
            "cannot determine a unique instance name, define a name in the instance configuration"
        );
        check_name.to_string()
    }

    /// Human-readable target description.
    #[must_use]
    pub fn target(&self) -> String {
        if let Some(regex) = &self.process_name_regex {
            format!("process_regex: {regex}")
        } else if let Some(url) = &self.jmx_url {
            url.clone()
        } else {
            let host = self.host.as_deref().unwrap_or_default();
            let port = self.port.map(|p| p.to_string()).unwrap_or_default();
            format!("{host}:{port}")
        }
    }

    /// Returns the matching rules, falling back to the shared ones.
    #[must_use]
    pub fn configurations<'a>(&'a self, init: &'a InitConfig) -> &'a [Configuration] {
        self.conf.as_deref().unwrap_or(&init.conf)
    }

    /// Returns the instance tags as `key:value` strings.
    #[must_use]
    pub fn tag_list(&self) -> Vec<String> {
        self.tags.iter().map(|(k, v)| format!("{k}:{v}")).collect()
    }

    /// Validates the instance.
    ///
    /// # Errors
    /// Returns an error if the budget or refresh period is zero.
    pub fn validate(&self) -> Result<()> {
        if self.max_returned_metrics == 0 {
            return Err(FetchError::config(
                "max_returned_metrics must be greater than 0",
            ));
        }
        if self.refresh_beans.is_zero() {
            return Err(FetchError::config("refresh_beans must be greater than 0"));
        }
        Ok(())
    }
}

/// Settings shared by every instance of a check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitConfig {
    /// Shared matching rules.
    #[serde(default)]
    pub conf: Vec<Configuration>,
}

/// A check file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckConfig {
    /// Shared settings.
    #[serde(default)]
    pub init_config: InitConfig,

    /// Monitored instances.
    #[serde(default)]
    pub instances: Vec<InstanceConfig>,
}

impl CheckConfig {
    /// Parses a check from TOML.
    ///
    /// # Errors
    /// Returns [`FetchError::Serialization`] if the text is not a valid
    /// check document, [`FetchError::Config`] if it fails validation.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| FetchError::serialization(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a check from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| FetchError::config(format!("failed to read config: {e}")))?;
        Self::from_toml_str(&content)
    }

    /// Validates the check.
    ///
    /// # Errors
    /// Returns an error if there are no instances or an instance is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.instances.is_empty() {
            return Err(FetchError::config("at least one instance is required"));
        }
        for instance in &self.instances {
            instance.validate()?;
            if instance.configurations(&self.init_config).is_empty() {
                tracing::warn!(
                    target_name = %instance.target(),
                    "cannot find a conf section, no attribute will match"
                );
            }
        }
        Ok(())
    }
}

/// Serde helper for durations written as seconds or humantime strings.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    /// Serializes a duration as a human-readable string.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    /// Deserializes a duration from whole seconds or a human-readable string.
    ///
    /// # Errors
    /// Returns an error if the string cannot be parsed.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Raw::deserialize(deserializer)? {
            Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(s) => humantime::parse_duration(&s).map_err(serde::de::Error::custom),
        }
    }
}
