//! Human approval for dangerous tool invocations.

pub mod broker;
pub mod gate;
pub mod request;

pub use broker::{
    PermissionBroker, PermissionConfig, PermissionSubscription, PermissionTicket,
    DEFAULT_PERMISSION_TIMEOUT_SECS,
};
pub use gate::{AutoApprove, PermissionGate};
pub use request::{PermissionError, PermissionOutcome, PermissionRequest, PermissionResponse};
