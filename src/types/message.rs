//! Message types assembled from a decoded turn.

use serde::{Deserialize, Serialize};

/// A message in a conversation.
///
/// Assistant messages are built incrementally by
/// [`MessageAssembler`](crate::stream::MessageAssembler); `id` stays empty
/// until the stream assigns one.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub parts: Vec<Part>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish: Option<FinishInfo>,
}

impl Message {
    /// Create an empty assistant message.
    pub fn assistant() -> Self {
        Self::default()
    }

    /// Create a user message with a single text part.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            role: Role::User,
            parts: vec![Part::Text { text: text.into() }],
            finish: None,
        }
    }

    /// Concatenate all text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Concatenate all reasoning parts.
    pub fn reasoning(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Reasoning { reasoning } => Some(reasoning.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Tool invocations in append order.
    pub fn tool_invocations(&self) -> Vec<&ToolInvocation> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::ToolInvocation(invocation) => Some(invocation),
                _ => None,
            })
            .collect()
    }

    /// First tool invocation with the given call id.
    pub fn tool_invocation(&self, tool_call_id: &str) -> Option<&ToolInvocation> {
        self.tool_invocations()
            .into_iter()
            .find(|invocation| invocation.tool_call_id == tool_call_id)
    }
}

/// Conversation role.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[default]
    Assistant,
}

/// A single part of message content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Part {
    Text { text: String },
    Reasoning { reasoning: String },
    ToolInvocation(ToolInvocation),
}

/// A tool call issued by the model, settled later by its result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    pub tool_call_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub args: serde_json::Value,
    pub state: ToolInvocationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

impl ToolInvocation {
    /// Whether a result has been attached.
    pub fn is_settled(&self) -> bool {
        self.state == ToolInvocationState::Result
    }
}

/// Tool invocation lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ToolInvocationState {
    PartialCall,
    Call,
    Result,
}

/// Finish metadata reported by step-boundary and stream-end records.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FinishInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Token usage for a step or a whole turn.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_invocation_serializes_with_wire_names() {
        let part = Part::ToolInvocation(ToolInvocation {
            tool_call_id: "t1".into(),
            tool_name: "bash".into(),
            args: json!({"command": "ls"}),
            state: ToolInvocationState::Call,
            result: None,
        });
        assert_eq!(
            serde_json::to_value(&part).unwrap(),
            json!({
                "type": "tool-invocation",
                "toolCallId": "t1",
                "toolName": "bash",
                "args": {"command": "ls"},
                "state": "call",
            })
        );
    }

    #[test]
    fn text_concatenates_only_text_parts() {
        let message = Message {
            parts: vec![
                Part::Text { text: "a".into() },
                Part::Reasoning { reasoning: "hmm".into() },
                Part::Text { text: "b".into() },
            ],
            ..Message::assistant()
        };
        assert_eq!(message.text(), "ab");
        assert_eq!(message.reasoning(), "hmm");
        assert!(message.tool_invocations().is_empty());
    }
}
