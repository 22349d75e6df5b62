//! Applies wire records to an in-progress [`Message`].

use crate::types::{
    parse_line, FinishInfo, Message, Part, StreamRecord, ToolCallPayload, ToolInvocation,
    ToolInvocationState, ToolResultPayload,
};

use super::events::{StreamEvent, StreamEventSink};

/// Builds one assistant message from a sequence of records.
///
/// Text and reasoning each keep their own "open" part; a tool call, a tool
/// result or a step boundary closes both so the next delta starts a fresh
/// part. Parts are only ever appended or mutated in place.
pub struct MessageAssembler {
    message: Message,
    open_text: Option<usize>,
    open_reasoning: Option<usize>,
    sink: Option<StreamEventSink>,
    skipped: usize,
}

impl Default for MessageAssembler {
    fn default() -> Self {
        Self::new(None)
    }
}

impl MessageAssembler {
    pub fn new(sink: Option<StreamEventSink>) -> Self {
        Self {
            message: Message::assistant(),
            open_text: None,
            open_reasoning: None,
            sink,
            skipped: 0,
        }
    }

    /// The message as assembled so far.
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Number of lines dropped as malformed.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Decode and apply one raw line. Malformed lines are skipped.
    pub fn apply_line(&mut self, line: &[u8]) {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() {
            return;
        }
        let Ok(text) = std::str::from_utf8(line) else {
            self.skipped += 1;
            tracing::debug!(len = line.len(), "skipping non-utf8 record");
            return;
        };
        match parse_line(text) {
            Ok(record) => self.apply(record),
            Err(err) => {
                self.skipped += 1;
                tracing::debug!(error = %err, "skipping malformed record");
            }
        }
    }

    /// Apply one validated record.
    pub fn apply(&mut self, record: StreamRecord) {
        match record {
            StreamRecord::TextDelta(delta) => self.push_text(delta),
            StreamRecord::ReasoningDelta(delta) => self.push_reasoning(delta),
            StreamRecord::MessageId(id) => {
                self.message.id.clone_from(&id);
                self.emit(StreamEvent::MessageId { id });
            }
            StreamRecord::ToolCall(call) => self.start_tool_call(call),
            StreamRecord::ToolResult(result) => self.settle_tool_call(result),
            StreamRecord::ToolCallDelta(_) => {}
            StreamRecord::StepFinish(info) => {
                self.close_open_parts();
                self.record_finish(info);
            }
            StreamRecord::Finish(info) => self.record_finish(info),
            StreamRecord::Error(message) => {
                tracing::debug!(%message, "stream reported error");
                self.emit(StreamEvent::Error { message });
            }
            StreamRecord::Unknown { code } => {
                tracing::trace!(%code, "ignoring unknown record");
            }
        }
    }

    /// Complete the turn: fires `Finish` once and returns the message.
    pub fn finish(mut self) -> Message {
        self.close_open_parts();
        let message = std::mem::take(&mut self.message);
        self.emit(StreamEvent::Finish {
            message: message.clone(),
        });
        message
    }

    /// Stop early without firing `Finish`.
    pub fn into_partial(self) -> Message {
        self.message
    }

    fn push_text(&mut self, delta: String) {
        match self.open_text.and_then(|idx| self.message.parts.get_mut(idx)) {
            Some(Part::Text { text }) => text.push_str(&delta),
            _ => {
                self.open_text = Some(self.message.parts.len());
                self.message.parts.push(Part::Text {
                    text: delta.clone(),
                });
            }
        }
        self.emit(StreamEvent::TextDelta { text: delta });
    }

    fn push_reasoning(&mut self, delta: String) {
        match self.open_reasoning.and_then(|idx| self.message.parts.get_mut(idx)) {
            Some(Part::Reasoning { reasoning }) => reasoning.push_str(&delta),
            _ => {
                self.open_reasoning = Some(self.message.parts.len());
                self.message.parts.push(Part::Reasoning {
                    reasoning: delta.clone(),
                });
            }
        }
        self.emit(StreamEvent::ReasoningDelta { text: delta });
    }

    fn start_tool_call(&mut self, call: ToolCallPayload) {
        self.close_open_parts();
        if self.message.tool_invocation(&call.tool_call_id).is_some() {
            tracing::warn!(tool_call_id = %call.tool_call_id, "tool call id reused within turn");
        }
        let invocation = ToolInvocation {
            tool_call_id: call.tool_call_id,
            tool_name: call.tool_name,
            args: call.args,
            state: ToolInvocationState::Call,
            result: None,
        };
        self.message
            .parts
            .push(Part::ToolInvocation(invocation.clone()));
        self.emit(StreamEvent::ToolCall { invocation });
    }

    fn settle_tool_call(&mut self, payload: ToolResultPayload) {
        self.close_open_parts();
        let pending = self.message.parts.iter_mut().find_map(|part| match part {
            Part::ToolInvocation(invocation)
                if invocation.tool_call_id == payload.tool_call_id && !invocation.is_settled() =>
            {
                Some(invocation)
            }
            _ => None,
        });
        match pending {
            Some(invocation) => {
                invocation.state = ToolInvocationState::Result;
                invocation.result = Some(payload.result.clone());
            }
            None => {
                tracing::warn!(
                    tool_call_id = %payload.tool_call_id,
                    "tool result has no pending call"
                );
            }
        }
        self.emit(StreamEvent::ToolResult {
            tool_call_id: payload.tool_call_id,
            result: payload.result,
        });
    }

    fn record_finish(&mut self, info: Option<FinishInfo>) {
        if info.is_some() {
            self.message.finish = info;
        }
    }

    fn close_open_parts(&mut self) {
        self.open_text = None;
        self.open_reasoning = None;
    }

    fn emit(&self, event: StreamEvent) {
        if let Some(sink) = &self.sink {
            sink(event);
        }
    }
}
