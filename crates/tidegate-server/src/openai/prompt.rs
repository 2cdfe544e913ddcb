//! Conversation flattening.
//!
//! The upstream takes a single prompt string, so the message list is
//! rendered as role-tagged paragraphs in order. Earlier tool calls are
//! written back in the same JSON convention the model is asked to use.

use serde_json::{Value, json};
use tidegate_tools::{ToolSpec, tool_instructions};

use super::types::ChatMessage;

fn role_label(role: &str) -> &'static str {
    match role.trim().to_ascii_lowercase().as_str() {
        "system" | "developer" => "System",
        "assistant" => "Assistant",
        "tool" | "function" => "Tool",
        _ => "User",
    }
}

fn render_message(message: &ChatMessage) -> Option<String> {
    let label = role_label(&message.role);
    let mut body = message.text().trim().to_string();

    if !message.tool_calls.is_empty() {
        let calls: Vec<Value> = message
            .tool_calls
            .iter()
            .map(|call| {
                let input = serde_json::from_str::<Value>(&call.function.arguments)
                    .unwrap_or_else(|_| Value::String(call.function.arguments.clone()));
                json!({"name": call.function.name, "input": input})
            })
            .collect();
        if !body.is_empty() {
            body.push('\n');
        }
        body.push_str(&json!({ "tool_calls": calls }).to_string());
    }

    if body.is_empty() {
        return None;
    }
    Some(match message.tool_call_id.as_deref() {
        Some(id) if label == "Tool" => format!("{label} ({id}): {body}"),
        _ => format!("{label}: {body}"),
    })
}

/// Render messages as one prompt, appending tool instructions when tools
/// are declared.
pub fn build_prompt(messages: &[ChatMessage], tools: &[ToolSpec]) -> String {
    let mut prompt = messages
        .iter()
        .filter_map(render_message)
        .collect::<Vec<_>>()
        .join("\n\n");
    if !tools.is_empty() {
        if !prompt.is_empty() {
            prompt.push_str("\n\n");
        }
        prompt.push_str(&tool_instructions(tools));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(value: Value) -> Vec<ChatMessage> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn roles_are_tagged_in_order() {
        let msgs = messages(json!([
            {"role": "system", "content": "Be brief."},
            {"role": "user", "content": "Hi"},
            {"role": "assistant", "content": "Hello!"},
            {"role": "user", "content": "  Bye  "},
        ]));
        assert_eq!(
            build_prompt(&msgs, &[]),
            "System: Be brief.\n\nUser: Hi\n\nAssistant: Hello!\n\nUser: Bye"
        );
    }

    #[test]
    fn empty_messages_are_skipped() {
        let msgs = messages(json!([
            {"role": "user", "content": ""},
            {"role": "user", "content": "x"},
        ]));
        assert_eq!(build_prompt(&msgs, &[]), "User: x");
    }

    #[test]
    fn prior_tool_calls_and_results() {
        let msgs = messages(json!([
            {"role": "assistant", "content": null, "tool_calls": [
                {"id": "call_1", "function": {"name": "search", "arguments": "{\"q\":\"rust\"}"}}
            ]},
            {"role": "tool", "tool_call_id": "call_1", "content": "3 results"},
        ]));
        assert_eq!(
            build_prompt(&msgs, &[]),
            "Assistant: {\"tool_calls\":[{\"name\":\"search\",\"input\":{\"q\":\"rust\"}}]}\n\n\
             Tool (call_1): 3 results"
        );
    }

    #[test]
    fn tool_block_appended() {
        let msgs = messages(json!([{"role": "user", "content": "weather?"}]));
        let tools = vec![ToolSpec {
            name: "get_weather".into(),
            description: None,
            parameters: None,
        }];
        let prompt = build_prompt(&msgs, &tools);
        assert!(prompt.starts_with("User: weather?\n\n"));
        assert!(prompt.contains("Tool: get_weather"));
        assert!(prompt.contains("tool_calls"));
    }

    #[test]
    fn unknown_role_is_user() {
        assert_eq!(role_label("critic"), "User");
        assert_eq!(role_label("DEVELOPER"), "System");
    }
}
