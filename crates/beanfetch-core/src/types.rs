//! Core types for attribute discovery and sampling.
//!
//! Bean names are immutable once obtained from a source; equality and
//! hashing use the canonical (key-sorted) form so that `d:a=1,b=2` and
//! `d:b=2,a=1` name the same bean.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FetchError, Result};

// =============================================================================
// ObjectName
// =============================================================================

/// Structured name of a queryable object ("bean").
///
/// A domain plus an ordered list of key properties, written
/// `domain:key=value,key2=value2`.
#[derive(Debug, Clone)]
pub struct ObjectName {
    domain: String,
    properties: Vec<(String, String)>,
}

impl ObjectName {
    /// Creates a bean name from a domain and key properties.
    #[must_use]
    pub fn new<K, V>(domain: impl Into<String>, properties: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            domain: domain.into(),
            properties: properties
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Returns the domain.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Returns the key properties in declaration order.
    #[must_use]
    pub fn properties(&self) -> &[(String, String)] {
        &self.properties
    }

    /// Returns the value of a key property, if present.
    #[must_use]
    pub fn key_property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the name with key properties sorted lexicographically.
    #[must_use]
    pub fn canonical_name(&self) -> String {
        let mut props: Vec<_> = self.properties.iter().collect();
        props.sort();
        let joined = props
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",");
        format!("{}:{}", self.domain, joined)
    }
}

impl PartialEq for ObjectName {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_name() == other.canonical_name()
    }
}

impl Eq for ObjectName {}

impl Hash for ObjectName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical_name().hash(state);
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.domain)?;
        for (i, (k, v)) in self.properties.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{k}={v}")?;
        }
        Ok(())
    }
}

impl FromStr for ObjectName {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self> {
        let (domain, rest) = split_domain(s)?;
        let mut properties = Vec::new();
        for pair in rest.split(',') {
            if pair == "*" {
                return Err(FetchError::pattern(format!(
                    "{s}: wildcard is not allowed in a bean name"
                )));
            }
            properties.push(parse_pair(s, pair)?);
        }
        Ok(Self {
            domain: domain.to_string(),
            properties,
        })
    }
}

fn split_domain(s: &str) -> Result<(&str, &str)> {
    let (domain, rest) = s
        .split_once(':')
        .ok_or_else(|| FetchError::pattern(format!("{s}: missing ':' after domain")))?;
    if domain.is_empty() {
        return Err(FetchError::pattern(format!("{s}: empty domain")));
    }
    if rest.is_empty() {
        return Err(FetchError::pattern(format!("{s}: no key properties")));
    }
    Ok((domain, rest))
}

fn parse_pair(s: &str, pair: &str) -> Result<(String, String)> {
    let (k, v) = pair
        .split_once('=')
        .ok_or_else(|| FetchError::pattern(format!("{s}: malformed key property '{pair}'")))?;
    if k.is_empty() || v.is_empty() {
        return Err(FetchError::pattern(format!(
            "{s}: empty key or value in '{pair}'"
        )));
    }
    Ok((k.to_string(), v.to_string()))
}

// =============================================================================
// BeanPattern
// =============================================================================

/// Name pattern restricting a bean query ("scope").
///
/// `domain:k=v,*` selects every bean of `domain` carrying `k=v`, whatever
/// its other key properties. Without the trailing `*` the property list
/// must match exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeanPattern {
    domain: String,
    properties: Vec<(String, String)>,
    wildcard: bool,
}

impl BeanPattern {
    /// Creates a property-list pattern (`domain:k=v,*`).
    #[must_use]
    pub fn new<K, V>(domain: impl Into<String>, properties: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            domain: domain.into(),
            properties: properties
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            wildcard: true,
        }
    }

    /// Creates a pattern selecting a whole domain (`domain:*`).
    #[must_use]
    pub fn domain(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            properties: Vec::new(),
            wildcard: true,
        }
    }

    /// Returns the required key properties.
    #[must_use]
    pub fn properties(&self) -> &[(String, String)] {
        &self.properties
    }

    /// Returns true if the bean falls within this pattern.
    #[must_use]
    pub fn matches(&self, bean: &ObjectName) -> bool {
        if bean.domain() != self.domain {
            return false;
        }
        let required = self
            .properties
            .iter()
            .all(|(k, v)| bean.key_property(k) == Some(v.as_str()));
        required && (self.wildcard || bean.properties().len() == self.properties.len())
    }
}

impl fmt::Display for BeanPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.domain)?;
        let mut first = true;
        for (k, v) in &self.properties {
            if !first {
                write!(f, ",")?;
            }
            write!(f, "{k}={v}")?;
            first = false;
        }
        if self.wildcard {
            if !first {
                write!(f, ",")?;
            }
            write!(f, "*")?;
        }
        Ok(())
    }
}

impl FromStr for BeanPattern {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self> {
        let (domain, rest) = split_domain(s)?;
        let mut properties = Vec::new();
        let mut wildcard = false;
        for pair in rest.split(',') {
            if pair == "*" {
                wildcard = true;
                continue;
            }
            properties.push(parse_pair(s, pair)?);
        }
        Ok(Self {
            domain: domain.to_string(),
            properties,
            wildcard,
        })
    }
}

// =============================================================================
// Attributes
// =============================================================================

/// Metadata for one attribute exposed by a bean.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    /// Attribute name.
    pub name: String,
    /// Raw type descriptor as reported by the source (`long`, `[J`, ...).
    pub type_name: String,
    /// Item names for composite values (or element indices for arrays).
    #[serde(default)]
    pub keys: Vec<String>,
}

impl AttributeDescriptor {
    /// Creates a scalar attribute descriptor.
    #[must_use]
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            keys: Vec::new(),
        }
    }

    /// Sets the composite item names.
    #[must_use]
    pub fn with_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys = keys.into_iter().map(Into::into).collect();
        self
    }
}

/// Attribute value read from the source.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Any numeric primitive or wrapper.
    Number(f64),
    /// Boolean value.
    Boolean(bool),
    /// String value.
    Text(String),
    /// Structured value keyed by item name.
    Composite(BTreeMap<String, AttributeValue>),
    /// Numeric array.
    Array(Vec<f64>),
}

impl AttributeValue {
    /// Returns the item stored under `key` for composite and array values.
    #[must_use]
    pub fn item(&self, key: &str) -> Option<Self> {
        match self {
            Self::Composite(map) => map.get(key).cloned(),
            Self::Array(values) => key
                .parse::<usize>()
                .ok()
                .and_then(|i| values.get(i))
                .map(|v| Self::Number(*v)),
            _ => None,
        }
    }
}

/// Identity of a classified attribute inside one instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeKey {
    /// Canonical bean name.
    pub bean: String,
    /// Attribute name.
    pub attribute: String,
}

// =============================================================================
// Samples
// =============================================================================

/// How a sample is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    /// Reported as-is.
    #[default]
    Gauge,
    /// Monotonic counter, reported as a per-second rate.
    Counter,
    /// Monotonic counter, reported as a per-second rate.
    Rate,
}

impl MetricType {
    /// Returns true for gauges.
    #[must_use]
    pub const fn is_gauge(&self) -> bool {
        matches!(self, Self::Gauge)
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gauge => write!(f, "gauge"),
            Self::Counter => write!(f, "counter"),
            Self::Rate => write!(f, "rate"),
        }
    }
}

/// Whether a sample came from a scalar or a composite attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    /// Scalar attribute.
    Simple,
    /// One item of a composite attribute.
    Complex,
}

/// One collected value, tagged with its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    /// Output metric name.
    pub alias: String,
    /// Raw value.
    pub value: f64,
    /// `key:value` tags.
    pub tags: Vec<String>,
    /// Gauge or counter-like.
    pub metric_type: MetricType,
    /// Simple or complex.
    pub complexity: Complexity,
    /// Owning bean.
    pub bean: ObjectName,
    /// Attribute name.
    pub attribute: String,
    /// Zero-based item index for composite attributes.
    pub dimension: Option<usize>,
    /// Check that produced the sample (stamped by the pipeline).
    pub check_name: Option<String>,
}

impl MetricSample {
    /// Returns the rate-aggregation key: the alias followed by every tag.
    #[must_use]
    pub fn identity_key(&self) -> String {
        let mut key = self.alias.clone();
        for tag in &self.tags {
            key.push_str(tag);
        }
        key
    }
}
