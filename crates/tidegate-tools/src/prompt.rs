//! Tool instructions appended to the prompt.
//!
//! The upstream has no notion of tools, so declared tools are described in
//! plain text together with the JSON convention the sieve recognizes.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool declared by the client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Tool name.
    pub name: String,
    /// What the tool does.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema of the arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

/// Instruction block describing `tools` and how to call them.
pub fn tool_instructions(tools: &[ToolSpec]) -> String {
    let mut out = String::from("You can call the following tools:\n");
    for tool in tools {
        let _ = write!(out, "\nTool: {}\n", tool.name);
        if let Some(description) = tool.description.as_deref().filter(|d| !d.trim().is_empty()) {
            let _ = writeln!(out, "Description: {}", description.trim());
        }
        if let Some(parameters) = &tool.parameters {
            let _ = writeln!(out, "Parameters: {parameters}");
        }
    }
    out.push_str(
        "\nTo call tools, reply with only this JSON object and nothing else:\n\
         {\"tool_calls\":[{\"name\":\"<tool name>\",\"input\":{<arguments>}}]}\n\
         Do not wrap it in a code block or add any text before or after it. \
         If no tool is needed, answer normally.",
    );
    out
}
