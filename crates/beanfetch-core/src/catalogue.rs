//! Discovered beans of one instance, refreshed on a timer.
//!
//! The catalogue is STALE before its first refresh and whenever
//! `now - last_refresh >= period`; otherwise it is FRESH.

use std::borrow::Borrow;
use std::collections::HashSet;
use std::time::Duration;

use crate::config::Configuration;
use crate::error::Result;
use crate::scope;
use crate::source::AttributeSource;
use crate::types::{BeanPattern, ObjectName};

/// Beans known to an instance.
#[derive(Debug, Clone)]
pub struct BeanCatalogue {
    beans: Vec<ObjectName>,
    last_refresh_ms: Option<u64>,
    period: Duration,
    scopes: Option<Vec<BeanPattern>>,
}

impl BeanCatalogue {
    /// Creates an empty, stale catalogue.
    #[must_use]
    pub fn new(period: Duration) -> Self {
        Self {
            beans: Vec::new(),
            last_refresh_ms: None,
            period,
            scopes: None,
        }
    }

    /// Known beans, in discovery order.
    #[must_use]
    pub fn beans(&self) -> &[ObjectName] {
        &self.beans
    }

    /// Number of known beans.
    #[must_use]
    pub fn len(&self) -> usize {
        self.beans.len()
    }

    /// Returns true if no bean is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.beans.is_empty()
    }

    /// Time of the last refresh.
    #[must_use]
    pub fn last_refresh_ms(&self) -> Option<u64> {
        self.last_refresh_ms
    }

    /// Refresh period.
    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Returns true if the catalogue needs a refresh at `now_ms`.
    #[must_use]
    pub fn is_stale(&self, now_ms: u64) -> bool {
        match self.last_refresh_ms {
            None => true,
            Some(last) => u128::from(now_ms.saturating_sub(last)) >= self.period.as_millis(),
        }
    }

    /// Re-queries the bean list.
    ///
    /// With `limit_scope`, beans are queried per computed scope. Should the
    /// scopes be unavailable, a scoped query fail, or the scoped result be
    /// empty, every bean is queried instead.
    ///
    /// # Errors
    /// Returns transport errors from the source.
    pub async fn refresh<C: Borrow<Configuration> + Sync>(
        &mut self,
        source: &dyn AttributeSource,
        configurations: &[C],
        limit_scope: bool,
        now_ms: u64,
    ) -> Result<usize> {
        let mut found = Vec::new();

        if limit_scope {
            match self.scopes(configurations) {
                Ok(scopes) => {
                    for pattern in &scopes {
                        match source.query_beans(Some(pattern)).await {
                            Ok(beans) => found.extend(beans),
                            Err(e) if e.is_transport() => return Err(e),
                            Err(e) => {
                                tracing::error!(
                                    scope = %pattern,
                                    error = %e,
                                    "scoped bean query failed, querying all beans as a fallback"
                                );
                                found.clear();
                                break;
                            }
                        }
                    }
                    if found.is_empty() && !scopes.is_empty() {
                        tracing::warn!("scoped bean query returned no bean, querying all beans");
                    }
                }
                Err(e) => tracing::error!(
                    error = %e,
                    "unable to compute a common bean scope, querying all beans as a fallback"
                ),
            }
        }

        if found.is_empty() {
            found = source.query_beans(None).await?;
        }

        let mut seen = HashSet::with_capacity(found.len());
        found.retain(|b| seen.insert(b.clone()));
        self.beans = found;
        self.last_refresh_ms = Some(now_ms);
        Ok(self.beans.len())
    }

    fn scopes<C: Borrow<Configuration>>(&mut self, configurations: &[C]) -> Result<Vec<BeanPattern>> {
        if let Some(cached) = &self.scopes {
            return Ok(cached.clone());
        }
        let scopes = scope::common_scopes(configurations)?;
        self.scopes = Some(scopes.clone());
        Ok(scopes)
    }
}
