//! Attribute source and connector traits.
//!
//! The source is the only component that talks to the managed process.
//! Every call may suspend; a lost connection surfaces as
//! [`FetchError::Transport`](crate::error::FetchError::Transport) and
//! aborts the running cycle.

use async_trait::async_trait;

use crate::config::InstanceConfig;
use crate::error::Result;
use crate::types::{AttributeDescriptor, AttributeValue, BeanPattern, ObjectName};

/// Connection to one managed process.
#[async_trait]
pub trait AttributeSource: Send + Sync {
    /// Lists beans within `scope`, or every bean when `scope` is `None`.
    async fn query_beans(&self, scope: Option<&BeanPattern>) -> Result<Vec<ObjectName>>;

    /// Lists the attributes exposed by `bean`.
    async fn attributes_for_bean(&self, bean: &ObjectName) -> Result<Vec<AttributeDescriptor>>;

    /// Reads the current value of one attribute.
    async fn read_attribute(&self, bean: &ObjectName, attribute: &str) -> Result<AttributeValue>;

    /// Releases the connection.
    async fn close(&self) -> Result<()>;
}

/// Opens sources for instances.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connects to the process described by `config`.
    ///
    /// With `force_new` set, a cached connection must not be reused.
    async fn connect(
        &self,
        config: &InstanceConfig,
        force_new: bool,
    ) -> Result<Box<dyn AttributeSource>>;
}
