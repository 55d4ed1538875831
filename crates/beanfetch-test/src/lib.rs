// Iron Lotus: Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # beanfetch-test
//!
//! Testing infrastructure for the beanfetch agent.
//!
//! This crate provides:
//! - **In-memory source**: a mutable bean universe behind [`AttributeSource`](beanfetch_core::AttributeSource)
//! - **Scripted connector**: connection refusal and attempt counting
//! - **Recording sink**: every sink call, in order
//! - **Harness**: instances and agents wired to the above on a manual clock
//! - **Falsification tests**: Popperian tests for every documented property
//!
//! ## Iron Lotus Framework
//!
//! - **Built-in Quality** (品質の作り込み): Quality cannot be inspected in
//! - **Popperian Falsification**: Tests designed to refute claims
//!
//! ## Example
//!
//! ```rust,ignore
//! use beanfetch_test::TestHarness;
//!
//! let harness = TestHarness::new();
//! harness.source.add_scalar(&"d:type=A".parse()?, "Count", "long", 1.0);
//! let mut instance = harness.instance(config, Action::Collect);
//! instance.init(&*harness.connector, &*harness.sink, false).await?;
//! let samples = instance.collect(&*harness.sink).await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::significant_drop_tightening)]

pub mod harness;
pub mod memory;
pub mod recording;

pub use beanfetch_core::ManualClock;
pub use harness::{CHECK_NAME, TestHarness};
pub use memory::{MemoryConnector, MemorySource};
pub use recording::{RecordingSink, SinkEvent};
