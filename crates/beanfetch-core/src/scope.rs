//! Bean query scoping.
//!
//! # Toyota Way: Muda (無駄)
//! Listing every bean of a large managed process is expensive. The scopes
//! computed here narrow the query to the domains and key properties the
//! configured rules can possibly match.
//!
//! Every pattern produced is a superset of what its rules select: a rule
//! contributes its domain and its single-valued key constraints, and rules
//! sharing a domain keep only the constraints common to all of them.

use std::borrow::Borrow;

use crate::config::{Configuration, Filter};
use crate::error::{FetchError, Result};
use crate::types::BeanPattern;

/// Computes the patterns covering every rule in `configurations`.
///
/// Output is ordered by first appearance of each domain.
///
/// # Errors
/// Returns [`FetchError::Pattern`] when a rule cannot be reduced to a
/// single domain. Callers then query every bean.
pub fn common_scopes<C: Borrow<Configuration>>(configurations: &[C]) -> Result<Vec<BeanPattern>> {
    let mut groups: Vec<(String, Vec<(String, String)>)> = Vec::new();

    for conf in configurations {
        let conf = conf.borrow();
        let domain = rule_domain(&conf.include)?;
        let constraints = single_valued(&conf.include);

        match groups.iter_mut().find(|(d, _)| *d == domain) {
            Some((_, common)) => common.retain(|pair| constraints.contains(pair)),
            None => groups.push((domain, constraints)),
        }
    }

    Ok(groups
        .into_iter()
        .map(|(domain, constraints)| BeanPattern::new(domain, constraints))
        .collect())
}

fn rule_domain(include: &Filter) -> Result<String> {
    if let Some(domain) = &include.domain {
        return Ok(domain.clone());
    }
    let beans = include.bean_names()?;
    match beans.first().map(|b| b.domain()) {
        Some(first) if beans.iter().all(|b| b.domain() == first) => Ok(first.to_string()),
        _ => Err(FetchError::pattern(
            "include filter names no single domain",
        )),
    }
}

fn single_valued(include: &Filter) -> Vec<(String, String)> {
    include
        .properties
        .iter()
        .filter_map(|(key, values)| match values.values() {
            [only] => Some((key.clone(), only.clone())),
            _ => None,
        })
        .collect()
}
