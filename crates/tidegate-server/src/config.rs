//! Server configuration.

use std::time::Duration;

use tidegate_core::ToolPolicy;
use tidegate_settings::{GatewaySettings, ModelSettings};
use tidegate_stream::PumpOptions;

/// Runtime configuration for the gateway server, derived from settings.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Accepted client keys. Empty disables auth.
    pub api_keys: Vec<String>,
    /// Models exposed to clients.
    pub models: Vec<ModelSettings>,
    /// SSE keep-alive comment interval.
    pub keep_alive: Duration,
    /// Longest wait for the next upstream line while streaming.
    pub idle_timeout: Duration,
    /// Pump result channel capacity.
    pub channel_capacity: usize,
    /// Longest accepted upstream line.
    pub max_line_bytes: usize,
    /// Unknown tool name handling.
    pub tool_policy: ToolPolicy,
    /// Emitted-text window kept by the sieve for fence detection.
    pub recent_text_window: usize,
    /// Graceful shutdown bound.
    pub shutdown_timeout: Duration,
}

impl ServerConfig {
    /// Build from loaded settings.
    pub fn from_settings(settings: &GatewaySettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            api_keys: settings.server.api_keys.clone(),
            models: settings.models.clone(),
            keep_alive: Duration::from_secs(settings.stream.keep_alive_secs.max(1)),
            idle_timeout: Duration::from_secs(settings.stream.idle_timeout_secs.max(1)),
            channel_capacity: settings.stream.channel_capacity,
            max_line_bytes: settings.stream.max_line_bytes,
            tool_policy: settings.tools.policy,
            recent_text_window: settings.tools.recent_text_window,
            shutdown_timeout: Duration::from_secs(settings.server.shutdown_timeout_secs),
        }
    }

    /// `host:port` to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Resolve a client model id, ignoring ASCII case.
    pub fn model(&self, id: &str) -> Option<&ModelSettings> {
        let id = id.trim();
        self.models.iter().find(|m| m.id.eq_ignore_ascii_case(id))
    }

    /// Pump options for one response.
    pub fn pump_options(&self, thinking_enabled: bool) -> PumpOptions {
        PumpOptions {
            thinking_enabled,
            channel_capacity: self.channel_capacity,
            max_line_bytes: self.max_line_bytes,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_settings(&GatewaySettings::default())
    }
}
