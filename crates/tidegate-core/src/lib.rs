//! # tidegate-core
//!
//! Shared vocabulary for the tidegate workspace:
//!
//! - [`content`]: typed content fragments produced from the upstream stream
//! - [`tools`]: parsed tool invocations and the sieve's output events
//! - [`errors`]: the gateway error hierarchy
//! - [`text`]: small text helpers (token estimation, citation markers)
//! - [`logging`]: `tracing` subscriber initialization

#![deny(unsafe_code)]

pub mod content;
pub mod errors;
pub mod logging;
pub mod text;
pub mod tools;

pub use content::{ContentFragment, FragmentKind};
pub use errors::{GatewayError, Result};
pub use tools::{ParsedToolCall, SieveEvent, ToolPolicy, coalesce_text};
