//! Stream consumption and tool detection settings.

use serde::{Deserialize, Serialize};
use tidegate_core::ToolPolicy;

/// Limits applied while consuming one upstream response.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamSettings {
    /// Capacity of the ordered channel between pump and consumer.
    pub channel_capacity: usize,
    /// Longest upstream line accepted before the stream fails.
    pub max_line_bytes: usize,
    /// Interval between keep-alive comments on client streams, in seconds.
    pub keep_alive_secs: u64,
    /// Upstream silence tolerated before the stream is cut, in seconds.
    pub idle_timeout_secs: u64,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            channel_capacity: 128,
            max_line_bytes: 2 * 1024 * 1024,
            keep_alive_secs: 5,
            idle_timeout_secs: 30,
        }
    }
}

/// Tool-call detection settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolSettings {
    /// Treatment of undeclared tool names.
    pub policy: ToolPolicy,
    /// Bytes of recently emitted text kept for code-fence detection.
    pub recent_text_window: usize,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            policy: ToolPolicy::Permissive,
            recent_text_window: 256,
        }
    }
}
