//! Convenience re-exports for common use.

pub use crate::config::TurnkitConfig;
pub use crate::error::{Result, TurnkitError};
pub use crate::permission::{
    PermissionBroker, PermissionConfig, PermissionError, PermissionGate, PermissionRequest,
    PermissionResponse, PermissionSubscription, PermissionTicket,
};
pub use crate::stream::{
    decode_response, decode_stream, stream_events, DecodeOptions, StreamConfig, StreamEvent,
    StreamEventSink, StreamOutcome,
};
pub use crate::types::{Message, Part, Role, ToolInvocation, ToolInvocationState};
