//! Seam between tool execution and the approval surface.

use async_trait::async_trait;

use super::broker::PermissionBroker;
use super::request::{PermissionOutcome, PermissionResponse};

/// Anything that can decide whether a command may run.
///
/// The tool scheduler holds one of these and calls it before any
/// side-effecting execution.
#[async_trait]
pub trait PermissionGate: Send + Sync {
    async fn authorize(&self, command: &str, base_command: &str) -> PermissionOutcome;
}

#[async_trait]
impl PermissionGate for PermissionBroker {
    async fn authorize(&self, command: &str, base_command: &str) -> PermissionOutcome {
        self.request_permission(command, base_command).await
    }
}

/// Grants everything. For headless runs and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

#[async_trait]
impl PermissionGate for AutoApprove {
    async fn authorize(&self, command: &str, _base_command: &str) -> PermissionOutcome {
        tracing::debug!(command, "auto-approving command");
        Ok(PermissionResponse::Yes)
    }
}
