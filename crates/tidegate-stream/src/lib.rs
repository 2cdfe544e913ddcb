//! # tidegate-stream
//!
//! Interpretation of the upstream completion stream.
//!
//! - [`event`]: one raw line → terminal signal or decoded chunk
//! - [`extract`]: decoded chunk → typed content fragments
//! - [`line`]: the per-line result combining both
//! - [`pump`]: background task turning a byte stream into ordered results
//! - [`collect`]: drains a pump for non-streaming callers

#![deny(unsafe_code)]

pub mod collect;
pub mod event;
pub mod extract;
pub mod line;
pub mod pump;

pub use collect::{Collected, StopReason, collect_lines};
pub use event::{UpstreamEvent, parse_event_line};
pub use extract::{Extraction, extract_content};
pub use line::{LineResult, parse_line};
pub use pump::{LinePump, PumpError, PumpOptions, start_line_pump};
