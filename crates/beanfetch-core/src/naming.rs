//! Output name derivation.
//!
//! Identifiers are built from the bean domain and the key properties
//! `type`, `scope`, `index`, `name` (in that order), followed by the
//! attribute name. Every segment is lower-cased; absent properties
//! contribute nothing. Dimension identifiers leave out `type` and
//! `scope`; they are only unique within their family. The same
//! derivation is used for family declarations and for samples, so
//! identifiers join across both.

use std::fmt;

use crate::types::{Complexity, MetricSample, ObjectName};

/// Key properties that take part in naming, in order.
pub const NAMING_KEYS: [&str; 4] = ["type", "scope", "index", "name"];

/// Rendering hint for a metric family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartType {
    /// One line per dimension.
    Line,
    /// Dimensions stacked (composite attributes).
    Stacked,
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Line => write!(f, "line"),
            Self::Stacked => write!(f, "stacked"),
        }
    }
}

/// Metric family declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricFamily {
    /// Domain-derived identifier.
    pub id: String,
    /// Short name (key properties + attribute, no domain).
    pub name: String,
    /// Human-readable title.
    pub title: String,
    /// Unit/type hint (the attribute's canonical type).
    pub units: String,
    /// Grouping key.
    pub family: String,
    /// Context (the domain).
    pub context: String,
    /// Rendering hint.
    pub chart_type: ChartType,
}

/// Dimension declaration inside a family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    /// Identifier, matched by samples.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// A family together with its dimensions.
///
/// Sinks receive the whole block at once so it is never interleaved
/// with another family's block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyDeclaration {
    /// The family.
    pub family: MetricFamily,
    /// One per declared sub-metric.
    pub dimensions: Vec<Dimension>,
}

/// Lower-cased naming segments of one attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameParts {
    domain: String,
    type_: String,
    scope: String,
    index: String,
    name: String,
    attribute: String,
}

impl NameParts {
    /// Derives the segments for `attribute` on `bean`.
    #[must_use]
    pub fn new(bean: &ObjectName, attribute: &str) -> Self {
        let segment = |key: &str| {
            bean.key_property(key)
                .map(|v| format!(".{}", normalize(v)))
                .unwrap_or_default()
        };
        let attr = format!(".{}", normalize(attribute));
        let attribute = attr
            .strip_suffix(".value")
            .map_or_else(|| attr.clone(), str::to_string);
        Self {
            domain: normalize(bean.domain()),
            type_: segment(NAMING_KEYS[0]),
            scope: segment(NAMING_KEYS[1]),
            index: segment(NAMING_KEYS[2]),
            name: segment(NAMING_KEYS[3]),
            attribute,
        }
    }

    /// Derives the segments a sample will be reported under.
    #[must_use]
    pub fn for_sample(sample: &MetricSample) -> Self {
        Self::new(&sample.bean, &sample.attribute)
    }

    /// Family identifier: `<domain><type><scope>-<domain><index><name><attr>`.
    #[must_use]
    pub fn family_id(&self) -> String {
        format!(
            "{d}{}{}-{d}{}{}{}",
            self.type_,
            self.scope,
            self.index,
            self.name,
            self.attribute,
            d = self.domain
        )
    }

    /// Dimension identifier: `<domain><index><name><attr>`; composite
    /// items append their index.
    #[must_use]
    pub fn dimension_id(&self, item: Option<usize>) -> String {
        let base = format!("{}{}{}{}", self.domain, self.index, self.name, self.attribute);
        match item {
            Some(i) => format!("{base}.{i}"),
            None => base,
        }
    }

    fn dimension_name(&self, item: Option<usize>) -> String {
        let base = self.attribute.replace('.', "");
        match item {
            Some(i) => format!("{base}.{i}"),
            None => base,
        }
    }

    /// Builds the family declaration and `count` dimensions.
    ///
    /// Composite attributes get indexed dimensions `0..count` and a
    /// stacked rendering hint; scalars get one plain dimension.
    #[must_use]
    pub fn declaration(&self, units: &str, complexity: Complexity, count: usize) -> FamilyDeclaration {
        let props = format!("{}{}{}{}", self.type_, self.scope, self.index, self.name);
        let short = format!("{props}{}", self.attribute);
        let chart_type = match complexity {
            Complexity::Simple => ChartType::Line,
            Complexity::Complex => ChartType::Stacked,
        };
        let family = MetricFamily {
            id: self.family_id(),
            name: short.trim_start_matches('.').to_string(),
            title: self.dimension_id(None),
            units: units.to_string(),
            family: format!("{}{}{}", self.domain, self.type_, self.scope),
            context: self.domain.clone(),
            chart_type,
        };
        let dimensions = match complexity {
            Complexity::Simple => vec![Dimension {
                id: self.dimension_id(None),
                name: self.dimension_name(None),
            }],
            Complexity::Complex => (0..count)
                .map(|i| Dimension {
                    id: self.dimension_id(Some(i)),
                    name: self.dimension_name(Some(i)),
                })
                .collect(),
        };
        FamilyDeclaration { family, dimensions }
    }
}

/// Lower-cases and replaces whitespace, which cannot appear in identifiers.
fn normalize(segment: &str) -> String {
    segment
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect::<String>()
        .to_lowercase()
}
