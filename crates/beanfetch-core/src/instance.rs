//! A monitored instance and its per-tick collection pipeline.
//!
//! # Toyota Way: Genchi Genbutsu (現地現物)
//! Each instance owns its connection, catalogue, registry and rate state.
//! Nothing is shared across instances except the sink.

use std::fmt;
use std::sync::Arc;

use crate::attribute::AttributeContext;
use crate::catalogue::BeanCatalogue;
use crate::clock::Clock;
use crate::config::{Action, Configuration, InitConfig, InstanceConfig};
use crate::error::{FetchError, Result};
use crate::matcher::{self, MatchSettings, RefreshSummary};
use crate::rates::RateAggregator;
use crate::registry::AttributeRegistry;
use crate::reporter::Sink;
use crate::source::{AttributeSource, Connector};
use crate::types::MetricSample;

/// One monitored target.
pub struct Instance {
    config: InstanceConfig,
    configurations: Vec<Arc<Configuration>>,
    name: String,
    check_name: String,
    action: Action,
    context: AttributeContext,
    catalogue: BeanCatalogue,
    registry: AttributeRegistry,
    rates: RateAggregator,
    source: Option<Box<dyn AttributeSource>>,
    clock: Arc<dyn Clock>,
    limit_reached: bool,
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("name", &self.name)
            .field("check_name", &self.check_name)
            .field("action", &self.action)
            .field("connected", &self.source.is_some())
            .finish_non_exhaustive()
    }
}

impl Instance {
    /// Creates an unconnected instance.
    ///
    /// Matching rules come from `config.conf`, or from `init.conf` when the
    /// instance has none.
    #[must_use]
    pub fn new(
        config: InstanceConfig,
        init: &InitConfig,
        check_name: impl Into<String>,
        action: Action,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let check_name = check_name.into();
        let name = config.instance_name(&check_name);
        let configurations: Vec<_> = config
            .configurations(init)
            .iter()
            .cloned()
            .map(Arc::new)
            .collect();
        if configurations.is_empty() {
            tracing::warn!(instance = %name, "cannot find a conf section");
        }
        let context = AttributeContext {
            instance_name: name.clone(),
            instance_tags: config.tag_list(),
            cassandra_aliasing: config.cassandra_aliasing,
        };
        Self {
            catalogue: BeanCatalogue::new(config.refresh_beans),
            rates: RateAggregator::new(name.clone()),
            registry: AttributeRegistry::new(),
            configurations,
            name,
            check_name,
            action,
            context,
            config,
            source: None,
            clock,
            limit_reached: false,
        }
    }

    /// Instance name (tag value).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning check.
    #[must_use]
    pub fn check_name(&self) -> &str {
        &self.check_name
    }

    /// Instance configuration.
    #[must_use]
    pub fn config(&self) -> &InstanceConfig {
        &self.config
    }

    /// Matching rules in declared order.
    #[must_use]
    pub fn configurations(&self) -> &[Arc<Configuration>] {
        &self.configurations
    }

    /// Metric budget.
    #[must_use]
    pub fn max_returned_metrics(&self) -> usize {
        self.config.max_returned_metrics
    }

    /// Returns true if the last rebuild hit the budget.
    #[must_use]
    pub fn is_limit_reached(&self) -> bool {
        self.limit_reached
    }

    /// Returns true if a source is attached.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.source.is_some()
    }

    /// Matched attributes.
    #[must_use]
    pub fn registry(&self) -> &AttributeRegistry {
        &self.registry
    }

    /// Known beans.
    #[must_use]
    pub fn catalogue(&self) -> &BeanCatalogue {
        &self.catalogue
    }

    /// Rate state.
    #[must_use]
    pub fn rates(&self) -> &RateAggregator {
        &self.rates
    }

    /// Mutable rate state, handed to the reporter.
    pub fn rates_mut(&mut self) -> &mut RateAggregator {
        &mut self.rates
    }

    /// Drops all rate state.
    pub fn reset_rates(&mut self) {
        self.rates.clear();
    }

    /// Tags for service checks: `jmx_server:<host>` then `instance:<name>`.
    #[must_use]
    pub fn service_check_tags(&self) -> Vec<String> {
        let mut tags = Vec::with_capacity(2);
        if let Some(host) = &self.config.host {
            tags.push(format!("jmx_server:{host}"));
        }
        tags.push(format!("instance:{}", self.name));
        tags
    }

    /// Connects, then refreshes beans and rebuilds the registry.
    ///
    /// # Errors
    /// Returns connection and transport errors.
    pub async fn init(
        &mut self,
        connector: &dyn Connector,
        sink: &dyn Sink,
        force_new: bool,
    ) -> Result<RefreshSummary> {
        tracing::info!(target_name = %self, "trying to connect to JMX server");
        let source = connector.connect(&self.config, force_new).await?;
        tracing::info!(target_name = %self, "connected to JMX server");
        self.attach(source, sink).await
    }

    /// Uses `source`, then refreshes beans and rebuilds the registry.
    ///
    /// # Errors
    /// Returns transport errors raised while listing beans.
    pub async fn attach(
        &mut self,
        source: Box<dyn AttributeSource>,
        sink: &dyn Sink,
    ) -> Result<RefreshSummary> {
        self.source = Some(source);
        self.refresh_beans().await?;
        self.rebuild_matching(sink).await
    }

    /// Re-queries the bean list.
    ///
    /// # Errors
    /// Returns [`FetchError::NotConnected`] without a source, or transport
    /// errors.
    pub async fn refresh_beans(&mut self) -> Result<usize> {
        let source = self
            .source
            .as_deref()
            .ok_or_else(|| FetchError::NotConnected(self.name.clone()))?;
        self.catalogue
            .refresh(
                source,
                &self.configurations,
                self.action.limits_query_scope(),
                self.clock.now_millis(),
            )
            .await
    }

    /// Rebuilds the registry from the current catalogue.
    ///
    /// # Errors
    /// Returns [`FetchError::NotConnected`] without a source.
    pub async fn rebuild_matching(&mut self, sink: &dyn Sink) -> Result<RefreshSummary> {
        let source = self
            .source
            .as_deref()
            .ok_or_else(|| FetchError::NotConnected(self.name.clone()))?;
        let settings = MatchSettings {
            action: self.action,
            max_returned_metrics: self.config.max_returned_metrics,
            configurations: &self.configurations,
            context: &self.context,
        };
        let display = self.config.target();
        let summary = matcher::rebuild_registry(
            &mut self.registry,
            self.catalogue.beans(),
            source,
            &settings,
            sink,
            &display,
        )
        .await;
        self.limit_reached = summary.limit_reached;
        Ok(summary)
    }

    /// Runs one collection: refresh when stale, then read every matched
    /// attribute.
    ///
    /// # Errors
    /// Returns [`FetchError::NotConnected`] without a source, or the first
    /// transport error.
    pub async fn collect(&mut self, sink: &dyn Sink) -> Result<Vec<MetricSample>> {
        if self.source.is_none() {
            return Err(FetchError::NotConnected(self.name.clone()));
        }
        if self.catalogue.is_stale(self.clock.now_millis()) {
            tracing::info!(instance = %self.name, "refreshing bean list");
            self.refresh_beans().await?;
            self.rebuild_matching(sink).await?;
        }
        let source = self
            .source
            .as_deref()
            .ok_or_else(|| FetchError::NotConnected(self.name.clone()))?;
        self.registry.collect(source, &self.check_name).await
    }

    /// Releases the source.
    pub async fn close(&mut self) {
        if let Some(source) = self.source.take() {
            if let Err(e) = source.close().await {
                tracing::warn!(instance = %self.name, error = %e, "error closing connection");
            }
        }
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.config.target())
    }
}
