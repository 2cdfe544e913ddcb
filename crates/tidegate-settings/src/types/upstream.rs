//! Upstream endpoint and model catalogue.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Upstream completion endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpstreamSettings {
    /// URL the completion payload is posted to.
    pub completion_url: String,
    /// Bearer token for the upstream account.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Extra headers sent with every upstream request.
    pub headers: BTreeMap<String, String>,
    /// Connect timeout, in seconds.
    pub timeout_secs: u64,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        let headers = [
            ("User-Agent", "DeepSeek/1.6.11 Android/35"),
            ("Accept", "application/json"),
            ("x-client-platform", "android"),
            ("x-client-version", "1.6.11"),
            ("x-client-locale", "zh_CN"),
            ("accept-charset", "UTF-8"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            completion_url: "https://chat.deepseek.com/api/v0/chat/completion".to_string(),
            token: None,
            headers,
            timeout_secs: 30,
        }
    }
}

/// One model exposed to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelSettings {
    /// Client-facing model id.
    pub id: String,
    /// Whether upstream reasoning is enabled.
    pub thinking: bool,
    /// Whether upstream web search is enabled.
    pub search: bool,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            id: "deepseek-chat".to_string(),
            thinking: false,
            search: false,
        }
    }
}

impl ModelSettings {
    /// The built-in catalogue.
    pub fn defaults() -> Vec<Self> {
        [
            ("deepseek-chat", false, false),
            ("deepseek-reasoner", true, false),
            ("deepseek-chat-search", false, true),
            ("deepseek-reasoner-search", true, true),
        ]
        .into_iter()
        .map(|(id, thinking, search)| Self {
            id: id.to_string(),
            thinking,
            search,
        })
        .collect()
    }
}
