//! Request resolution: model flags, prompt, tool extraction.

use tidegate_core::GatewayError;
use tidegate_tools::{ToolCallExtractor, ToolSieve};

use super::prompt::build_prompt;
use super::types::ChatCompletionRequest;
use crate::config::ServerConfig;
use crate::upstream::CompletionRequest;

/// Everything needed to serve one chat completion.
#[derive(Clone, Debug)]
pub struct RequestPlan {
    /// Configured model id.
    pub model: String,
    /// Flattened prompt, tool instructions included.
    pub prompt: String,
    /// Upstream reasoning.
    pub thinking_enabled: bool,
    /// Upstream web search; also drops citation fragments.
    pub search_enabled: bool,
    /// Present when the client declared tools.
    pub extractor: Option<ToolCallExtractor>,
    /// Client asked for server-sent events.
    pub stream: bool,
}

impl RequestPlan {
    /// Validate `request` against `config` and resolve it.
    pub fn build(config: &ServerConfig, request: &ChatCompletionRequest) -> Result<Self, GatewayError> {
        let model = config
            .model(&request.model)
            .ok_or_else(|| GatewayError::UnknownModel(request.model.clone()))?;
        if request.messages.is_empty() {
            return Err(GatewayError::InvalidRequest("messages must not be empty".into()));
        }

        let tools = request.tool_specs();
        if tools.iter().any(|t| t.name.trim().is_empty()) {
            return Err(GatewayError::InvalidRequest("tool names must not be empty".into()));
        }
        let extractor = (!tools.is_empty())
            .then(|| ToolCallExtractor::new(tools.iter().map(|t| t.name.trim()), config.tool_policy));

        Ok(Self {
            model: model.id.clone(),
            prompt: build_prompt(&request.messages, &tools),
            thinking_enabled: model.thinking,
            search_enabled: model.search,
            extractor,
            stream: request.stream,
        })
    }

    /// Upstream request for this plan.
    pub fn completion_request(&self) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            prompt: self.prompt.clone(),
            thinking_enabled: self.thinking_enabled,
            search_enabled: self.search_enabled,
        }
    }

    /// A sieve when tools were declared.
    pub fn sieve(&self, recent_window: usize) -> Option<ToolSieve> {
        self.extractor
            .clone()
            .map(|extractor| ToolSieve::new(extractor, recent_window))
    }
}
