//! Wire records: one newline-terminated `<code>:<json>` line each.

use serde::Deserialize;
use thiserror::Error;

use super::message::FinishInfo;

/// A validated wire record. Each code has a fixed payload shape.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamRecord {
    /// `0`: text delta.
    TextDelta(String),
    /// `g`: message id.
    MessageId(String),
    /// `i`: reasoning delta.
    ReasoningDelta(String),
    /// `b`: tool call start with final arguments.
    ToolCall(ToolCallPayload),
    /// `c`: tool result.
    ToolResult(ToolResultPayload),
    /// `a`: partial tool-call arguments. Carried but not applied.
    ToolCallDelta(serde_json::Value),
    /// `e`: step boundary.
    StepFinish(Option<FinishInfo>),
    /// `d`: stream end marker.
    Finish(Option<FinishInfo>),
    /// `3`: error string.
    Error(String),
    /// Any other code; ignored for forward compatibility.
    Unknown { code: String },
}

impl StreamRecord {
    /// Wire code for this record.
    pub fn code(&self) -> &str {
        match self {
            Self::TextDelta(_) => "0",
            Self::MessageId(_) => "g",
            Self::ReasoningDelta(_) => "i",
            Self::ToolCall(_) => "b",
            Self::ToolResult(_) => "c",
            Self::ToolCallDelta(_) => "a",
            Self::StepFinish(_) => "e",
            Self::Finish(_) => "d",
            Self::Error(_) => "3",
            Self::Unknown { code } => code,
        }
    }
}

/// Payload of a `b` record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallPayload {
    pub tool_call_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

/// Payload of a `c` record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResultPayload {
    pub tool_call_id: String,
    #[serde(default)]
    pub result: serde_json::Value,
}

/// Why a line could not be turned into a record.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("line has no `:` separator")]
    MissingSeparator,
    #[error("invalid payload for record `{code}`: {source}")]
    InvalidPayload {
        code: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Parse a single line (without its newline) into a record.
///
/// The code is everything before the first `:`. Unknown codes are returned
/// as [`StreamRecord::Unknown`] without looking at the payload.
pub fn parse_line(line: &str) -> Result<StreamRecord, RecordError> {
    let (code, payload) = line.split_once(':').ok_or(RecordError::MissingSeparator)?;
    let invalid = |source| RecordError::InvalidPayload {
        code: code.to_string(),
        source,
    };

    let record = match code {
        "0" => StreamRecord::TextDelta(serde_json::from_str(payload).map_err(invalid)?),
        "g" => StreamRecord::MessageId(serde_json::from_str(payload).map_err(invalid)?),
        "i" => StreamRecord::ReasoningDelta(serde_json::from_str(payload).map_err(invalid)?),
        "b" => StreamRecord::ToolCall(serde_json::from_str(payload).map_err(invalid)?),
        "c" => StreamRecord::ToolResult(serde_json::from_str(payload).map_err(invalid)?),
        "a" => StreamRecord::ToolCallDelta(serde_json::from_str(payload).map_err(invalid)?),
        "e" => StreamRecord::StepFinish(finish_info(payload).map_err(invalid)?),
        "d" => StreamRecord::Finish(finish_info(payload).map_err(invalid)?),
        "3" => StreamRecord::Error(serde_json::from_str(payload).map_err(invalid)?),
        other => StreamRecord::Unknown {
            code: other.to_string(),
        },
    };
    Ok(record)
}

// The payload must be JSON; it only contributes finish metadata when it is
// shaped like one.
fn finish_info(payload: &str) -> Result<Option<FinishInfo>, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(payload)?;
    if !value.is_object() {
        return Ok(None);
    }
    Ok(serde_json::from_value(value).ok())
}
