//! Structural events emitted while a turn is decoded.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::{Message, ToolInvocation};

/// Event fired synchronously, in record order, as the decoder applies records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    MessageId {
        id: String,
    },
    TextDelta {
        text: String,
    },
    ReasoningDelta {
        text: String,
    },
    ToolCall {
        invocation: ToolInvocation,
    },
    ToolResult {
        tool_call_id: String,
        result: serde_json::Value,
    },
    Error {
        message: String,
    },
    /// Fired exactly once when the source is exhausted.
    Finish {
        message: Message,
    },
}

/// Callback used for streaming decode events.
pub type StreamEventSink = Arc<dyn Fn(StreamEvent) + Send + Sync>;
