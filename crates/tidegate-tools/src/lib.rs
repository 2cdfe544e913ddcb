//! # tidegate-tools
//!
//! The upstream has no tool-calling channel, so tool invocations arrive as
//! JSON written into the ordinary response text. This crate finds them:
//!
//! - [`scan`]: index-based helpers (resumable object scanner, fence and
//!   trigger detection)
//! - [`extract`]: turns one captured JSON object into [`ParsedToolCall`]s
//!   under a name policy
//! - [`sieve`]: the incremental state machine separating text from calls
//! - [`format`]: OpenAI wire shape for parsed calls
//! - [`prompt`]: instructions teaching the model the call convention
//!
//! [`ParsedToolCall`]: tidegate_core::ParsedToolCall

#![deny(unsafe_code)]

pub mod extract;
pub mod format;
pub mod prompt;
pub mod scan;
pub mod sieve;

pub use extract::{Extracted, ToolCallExtractor};
pub use format::{OpenAiFunction, OpenAiToolCall, to_openai_tool_calls};
pub use prompt::{ToolSpec, tool_instructions};
pub use sieve::{DEFAULT_RECENT_WINDOW, ToolSieve, sieve_complete_text};
