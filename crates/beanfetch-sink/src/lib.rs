// Iron Lotus: Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # beanfetch-sink
//!
//! A conforming [`Sink`](beanfetch_core::Sink) for the beanfetch agent that
//! writes a line-oriented chart protocol:
//!
//! ```text
//! CHART <id> <name> <title> <units> <family> <context>[ stacked]
//! DIMENSION <id> <name>
//! BEGIN <family id>
//! SET <dimension id> = <value>
//! END
//! ```
//!
//! Listing actions print the matching and non-matching attributes in the
//! same stream.
//!
//! ## Iron Lotus Framework
//!
//! - **Visual Management** (目で見る管理): every family is declared before its samples
//! - **Jidoka** (自働化): each block is written under one lock, so concurrent
//!   instances never interleave

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::significant_drop_tightening)]

pub mod error;
pub mod text;

pub use error::{Result, SinkError};
pub use text::TextProtocolSink;
