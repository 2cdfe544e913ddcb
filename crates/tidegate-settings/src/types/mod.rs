//! Settings types.
//!
//! Every struct uses `#[serde(rename_all = "camelCase", default)]` so a
//! partial settings file fills the gaps from compiled defaults.

mod server;
mod stream;
mod upstream;

pub use server::{LoggingSettings, ServerSettings};
pub use stream::{StreamSettings, ToolSettings};
pub use upstream::{ModelSettings, UpstreamSettings};

use serde::{Deserialize, Serialize};

/// Root settings object.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewaySettings {
    /// HTTP listener and client auth.
    pub server: ServerSettings,
    /// Upstream stream consumption limits.
    pub stream: StreamSettings,
    /// Tool-call detection policy.
    pub tools: ToolSettings,
    /// Upstream completion endpoint.
    pub upstream: UpstreamSettings,
    /// Models exposed to clients.
    pub models: Vec<ModelSettings>,
    /// Log level and format.
    pub logging: LoggingSettings,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            stream: StreamSettings::default(),
            tools: ToolSettings::default(),
            upstream: UpstreamSettings::default(),
            models: ModelSettings::defaults(),
            logging: LoggingSettings::default(),
        }
    }
}

impl GatewaySettings {
    /// Look up a model by id, ignoring ASCII case.
    pub fn model(&self, id: &str) -> Option<&ModelSettings> {
        let id = id.trim();
        self.models.iter().find(|m| m.id.eq_ignore_ascii_case(id))
    }
}
