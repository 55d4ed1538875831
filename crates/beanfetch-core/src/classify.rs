//! Attribute type classification.
//!
//! Raw descriptors use the managed runtime's encoding: plain class names
//! (`java.lang.Long`), or leading-bracket array codes (`[J`, `[[I`,
//! `[Ljava.lang.String;`). Arrays are resolved to `<element>[]...[]`, then
//! the canonical name is bucketed into scalar, composite or unsupported.

use crate::error::{FetchError, Result};

/// Canonical names collected as a single value.
pub const SCALAR_TYPES: &[&str] = &[
    "long",
    "java.lang.String",
    "int",
    "float",
    "double",
    "java.lang.Double",
    "java.lang.Float",
    "java.lang.Integer",
    "java.lang.Long",
    "java.util.concurrent.atomic.AtomicInteger",
    "java.util.concurrent.atomic.AtomicLong",
    "java.lang.Object",
    "java.lang.Boolean",
    "boolean",
    "java.lang.Number",
];

/// Canonical names that expand into several sub-metrics.
pub const COMPOSITE_TYPES: &[&str] = &[
    "javax.management.openmbean.CompositeData",
    "java.util.HashMap",
    "long[]",
];

/// Classification bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeClass {
    /// Single numeric, string or boolean value.
    Scalar,
    /// Structured or tabular value.
    Composite,
    /// Neither; logged and skipped.
    Unsupported,
}

/// Resolved type of an attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalType {
    /// Readable name (`long[]`, `java.lang.String`, ...).
    pub name: String,
    /// Bucket.
    pub class: TypeClass,
}

/// Resolves a raw type descriptor into its readable name.
///
/// Non-array names pass through unchanged.
///
/// # Errors
/// Returns [`FetchError::Classification`] when an array element code is
/// not a known primitive or reference encoding.
pub fn readable_type_name(raw: &str) -> Result<String> {
    if !raw.starts_with('[') {
        return Ok(raw.to_string());
    }
    // `rfind` cannot miss: the string starts with '['.
    let last = raw.rfind('[').unwrap_or(0);
    let element = &raw[last..];
    let base = if let Some(class) = element.strip_prefix("[L") {
        class
            .strip_suffix(';')
            .filter(|c| !c.is_empty())
            .ok_or_else(|| FetchError::classification(format!("bad class name {raw}")))?
    } else {
        primitive_name(&element[1..])
            .ok_or_else(|| FetchError::classification(format!("bad class name {raw}")))?
    };
    let mut name = String::with_capacity(base.len() + 2 * (last + 1));
    name.push_str(base);
    for _ in 0..=last {
        name.push_str("[]");
    }
    Ok(name)
}

fn primitive_name(code: &str) -> Option<&'static str> {
    match code {
        "Z" => Some("boolean"),
        "B" => Some("byte"),
        "C" => Some("char"),
        "D" => Some("double"),
        "F" => Some("float"),
        "I" => Some("int"),
        "J" => Some("long"),
        "S" => Some("short"),
        _ => None,
    }
}

/// Classifies a raw type descriptor.
///
/// # Errors
/// Propagates [`readable_type_name`] failures; the caller skips only the
/// affected attribute.
pub fn classify(raw: &str) -> Result<CanonicalType> {
    let name = readable_type_name(raw)?;
    let class = if SCALAR_TYPES.contains(&name.as_str()) {
        TypeClass::Scalar
    } else if COMPOSITE_TYPES.contains(&name.as_str()) {
        TypeClass::Composite
    } else {
        TypeClass::Unsupported
    };
    Ok(CanonicalType { name, class })
}
