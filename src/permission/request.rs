//! Permission request, response and failure types.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;
use uuid::Uuid;

/// A request for human approval, as presented to the handler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRequest {
    pub id: String,
    /// Full command line the tool wants to run.
    pub command: String,
    /// Resolved executable name, used for allow-listing.
    pub base_command: String,
    pub created_at: DateTime<Utc>,
}

/// Human decision for a request.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PermissionResponse {
    Yes,
    Always,
    No,
}

impl PermissionResponse {
    /// Whether the tool may proceed.
    pub fn is_granted(self) -> bool {
        matches!(self, Self::Yes | Self::Always)
    }
}

/// Why a request failed without a human decision.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionError {
    #[error("permission request timed out after {secs}s")]
    Timeout { secs: u64 },
    #[error("no permission handler registered")]
    NoHandler,
    #[error("permission request cancelled")]
    Cancelled,
}

/// Outcome delivered to the caller of `request_permission`.
pub type PermissionOutcome = Result<PermissionResponse, PermissionError>;

/// Issues process-unique request ids: `perm-<millis>-<random>-<seq>`.
#[derive(Debug, Default)]
pub(crate) struct RequestIdGenerator {
    seq: AtomicU64,
}

impl RequestIdGenerator {
    pub(crate) fn next_id(&self) -> String {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let random = Uuid::new_v4().simple().to_string();
        format!(
            "perm-{}-{}-{}",
            Utc::now().timestamp_millis(),
            &random[..8],
            seq
        )
    }
}
