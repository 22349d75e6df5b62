//! Process-wide arbiter for human approval requests.
//!
//! Requests queue FIFO; at most one is active (published to the handler) at a
//! time. Every request gets a timeout at creation. Human answers, timeouts
//! and cancellation all settle through [`PermissionBroker::settle_locked`],
//! which removes the entry under the state lock, so each request completes
//! exactly once and the queue advances exactly once.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use bon::Builder;
use chrono::Utc;
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;

use super::request::{
    PermissionError, PermissionOutcome, PermissionRequest, PermissionResponse, RequestIdGenerator,
};

/// Default time a request may wait for an answer.
pub const DEFAULT_PERMISSION_TIMEOUT_SECS: u64 = 120;

/// Broker settings.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionConfig {
    /// Seconds before an unanswered request is rejected.
    #[builder(default = DEFAULT_PERMISSION_TIMEOUT_SECS)]
    pub timeout_secs: u64,
    /// Reject immediately when no handler is registered.
    #[builder(default = true)]
    pub reject_without_handler: bool,
    /// Remember `always` answers per base command for the broker's lifetime.
    #[builder(default = true)]
    pub remember_always: bool,
}

impl Default for PermissionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_PERMISSION_TIMEOUT_SECS,
            reject_without_handler: true,
            remember_always: true,
        }
    }
}

impl PermissionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

struct PendingEntry {
    request: PermissionRequest,
    reply: oneshot::Sender<PermissionOutcome>,
    timer: Option<AbortHandle>,
}

struct Subscriber {
    id: u64,
    tx: mpsc::UnboundedSender<PermissionRequest>,
}

#[derive(Default)]
struct BrokerState {
    queue: VecDeque<String>,
    entries: HashMap<String, PendingEntry>,
    current: Option<String>,
    subscriber: Option<Subscriber>,
    allowed: BTreeSet<String>,
}

impl BrokerState {
    fn has_live_handler(&self) -> bool {
        self.subscriber
            .as_ref()
            .is_some_and(|subscriber| !subscriber.tx.is_closed())
    }
}

struct BrokerInner {
    config: PermissionConfig,
    state: Mutex<BrokerState>,
    ids: RequestIdGenerator,
    subscriber_seq: AtomicU64,
}

impl BrokerInner {
    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for BrokerInner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        for entry in state.entries.values() {
            if let Some(timer) = &entry.timer {
                timer.abort();
            }
        }
    }
}

/// Shared handle to the permission broker.
///
/// Construct one per process and clone it into every tool-execution call
/// site. Requests must be issued from within a tokio runtime so their
/// timeout can be scheduled.
#[derive(Clone)]
pub struct PermissionBroker {
    inner: Arc<BrokerInner>,
}

impl std::fmt::Debug for PermissionBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("PermissionBroker")
            .field("config", &self.inner.config)
            .field("queued", &state.queue.len())
            .field("current", &state.current)
            .field("has_handler", &state.has_live_handler())
            .finish()
    }
}

impl Default for PermissionBroker {
    fn default() -> Self {
        Self::new(PermissionConfig::default())
    }
}

impl PermissionBroker {
    pub fn new(config: PermissionConfig) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                config,
                state: Mutex::new(BrokerState::default()),
                ids: RequestIdGenerator::default(),
                subscriber_seq: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &PermissionConfig {
        &self.inner.config
    }

    /// Ask for permission to run `command`.
    ///
    /// The returned ticket resolves with the human decision, or fails with
    /// [`PermissionError::Timeout`], [`PermissionError::NoHandler`] or
    /// [`PermissionError::Cancelled`].
    pub fn request_permission(
        &self,
        command: impl Into<String>,
        base_command: impl Into<String>,
    ) -> PermissionTicket {
        let request = PermissionRequest {
            id: self.inner.ids.next_id(),
            command: command.into(),
            base_command: base_command.into(),
            created_at: Utc::now(),
        };
        let (reply, rx) = oneshot::channel();
        let ticket = PermissionTicket {
            id: request.id.clone(),
            rx,
        };
        let config = &self.inner.config;

        let mut state = self.inner.lock();
        if config.remember_always && state.allowed.contains(&request.base_command) {
            tracing::debug!(
                request_id = %request.id,
                base_command = %request.base_command,
                "base command already allowed"
            );
            let _ = reply.send(Ok(PermissionResponse::Always));
            return ticket;
        }
        if config.reject_without_handler && !state.has_live_handler() {
            tracing::debug!(request_id = %request.id, "no permission handler registered");
            let _ = reply.send(Err(PermissionError::NoHandler));
            return ticket;
        }

        // Scheduled while holding the lock so the timer cannot observe a
        // request that is not yet queued.
        let timer = self.spawn_timeout(request.id.clone());
        tracing::debug!(
            request_id = %request.id,
            queued = state.queue.len() + 1,
            "permission request queued"
        );
        state.queue.push_back(request.id.clone());
        state.entries.insert(
            request.id.clone(),
            PendingEntry {
                request,
                reply,
                timer,
            },
        );
        self.promote(&mut state);
        ticket
    }

    /// Answer a pending request. Returns `false` if it was already settled
    /// or never existed.
    pub fn respond_to_permission(&self, request_id: &str, response: PermissionResponse) -> bool {
        let mut state = self.inner.lock();
        self.settle_locked(&mut state, request_id, Ok(response))
    }

    /// Register the human-facing handler, replacing any previous one.
    ///
    /// The active request (if any) is re-published to the new handler and the
    /// queue head is promoted if nothing is active.
    pub fn subscribe(&self) -> PermissionSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.inner.subscriber_seq.fetch_add(1, Ordering::Relaxed);

        let mut state = self.inner.lock();
        if state.subscriber.replace(Subscriber { id, tx }).is_some() {
            tracing::debug!(subscriber = id, "replacing permission handler");
        }
        let active = state
            .current
            .as_ref()
            .and_then(|current| state.entries.get(current))
            .map(|entry| entry.request.clone());
        if let Some(request) = active {
            if let Some(subscriber) = &state.subscriber {
                let _ = subscriber.tx.send(request);
            }
        }
        self.promote(&mut state);

        PermissionSubscription {
            id,
            rx,
            broker: Arc::downgrade(&self.inner),
        }
    }

    /// Decline the active request as if the human answered `no`.
    pub fn cancel_current_request(&self) -> bool {
        let mut state = self.inner.lock();
        let Some(current) = state.current.clone() else {
            return false;
        };
        self.settle_locked(&mut state, &current, Ok(PermissionResponse::No))
    }

    /// Reject every queued and active request with
    /// [`PermissionError::Cancelled`]. Returns how many were rejected.
    pub fn cancel_all_requests(&self) -> usize {
        let drained: Vec<PendingEntry> = {
            let mut state = self.inner.lock();
            state.current = None;
            state.queue.clear();
            state.entries.drain().map(|(_, entry)| entry).collect()
        };
        let count = drained.len();
        for entry in drained {
            if let Some(timer) = entry.timer {
                timer.abort();
            }
            let _ = entry.reply.send(Err(PermissionError::Cancelled));
        }
        if count > 0 {
            tracing::info!(count, "cancelled all permission requests");
        }
        count
    }

    /// Requests not yet settled, including the active one.
    pub fn queue_len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// The request currently presented to the handler.
    pub fn current_request(&self) -> Option<PermissionRequest> {
        let state = self.inner.lock();
        state
            .current
            .as_ref()
            .and_then(|id| state.entries.get(id))
            .map(|entry| entry.request.clone())
    }

    /// Unsettled requests in arrival order.
    pub fn pending_requests(&self) -> Vec<PermissionRequest> {
        let state = self.inner.lock();
        state
            .queue
            .iter()
            .filter_map(|id| state.entries.get(id))
            .map(|entry| entry.request.clone())
            .collect()
    }

    pub fn has_handler(&self) -> bool {
        self.inner.lock().has_live_handler()
    }

    /// Base commands remembered from `always` answers.
    pub fn allowed_commands(&self) -> Vec<String> {
        self.inner.lock().allowed.iter().cloned().collect()
    }

    pub fn forget_allowed(&self) {
        self.inner.lock().allowed.clear();
    }

    fn spawn_timeout(&self, request_id: String) -> Option<AbortHandle> {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(request_id = %request_id, "no runtime; request will not time out");
            return None;
        };
        let broker = Arc::downgrade(&self.inner);
        let timeout = self.inner.config.timeout();
        let secs = self.inner.config.timeout_secs;
        let task = handle.spawn(async move {
            tokio::time::sleep(timeout).await;
            let Some(inner) = broker.upgrade() else {
                return;
            };
            let broker = PermissionBroker { inner };
            let mut state = broker.inner.lock();
            if broker.settle_locked(&mut state, &request_id, Err(PermissionError::Timeout { secs })) {
                tracing::warn!(request_id = %request_id, secs, "permission request timed out");
            }
        });
        Some(task.abort_handle())
    }

    /// The single completion path. Removes the entry, clears its timer,
    /// releases the active slot, replies, and advances the queue.
    fn settle_locked(
        &self,
        state: &mut BrokerState,
        request_id: &str,
        outcome: PermissionOutcome,
    ) -> bool {
        let Some(entry) = state.entries.remove(request_id) else {
            tracing::debug!(request_id, "permission request already settled");
            return false;
        };
        state.queue.retain(|id| id != request_id);
        if let Some(timer) = &entry.timer {
            timer.abort();
        }
        if state.current.as_deref() == Some(request_id) {
            state.current = None;
        }
        if self.inner.config.remember_always && outcome == Ok(PermissionResponse::Always) {
            state.allowed.insert(entry.request.base_command.clone());
        }

        tracing::info!(request_id, outcome = ?outcome, "permission request settled");
        if entry.reply.send(outcome).is_err() {
            tracing::debug!(request_id, "permission requester went away");
        }
        self.promote(state);
        true
    }

    /// Publish the queue head to the handler when the active slot is free.
    fn promote(&self, state: &mut BrokerState) {
        if state.current.is_some() {
            return;
        }
        let Some(head) = state.queue.front().cloned() else {
            return;
        };
        let Some(request) = state.entries.get(&head).map(|entry| entry.request.clone()) else {
            return;
        };
        let Some(subscriber) = &state.subscriber else {
            return;
        };
        if subscriber.tx.send(request).is_err() {
            tracing::debug!(subscriber = subscriber.id, "permission handler went away");
            state.subscriber = None;
            return;
        }
        tracing::debug!(request_id = %head, "permission request active");
        state.current = Some(head);
    }

    fn unsubscribe(&self, subscriber_id: u64) {
        let mut state = self.inner.lock();
        if state
            .subscriber
            .as_ref()
            .is_some_and(|subscriber| subscriber.id == subscriber_id)
        {
            state.subscriber = None;
            tracing::debug!(subscriber = subscriber_id, "permission handler unregistered");
        }
    }
}

/// Completion handle for one request. Await it for the outcome.
#[derive(Debug)]
pub struct PermissionTicket {
    id: String,
    rx: oneshot::Receiver<PermissionOutcome>,
}

impl PermissionTicket {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Future for PermissionTicket {
    type Output = PermissionOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // A dropped sender means the broker itself went away.
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(PermissionError::Cancelled)))
    }
}

/// The registered handler's view of the broker: a stream of requests as they
/// become active. Dropping it unregisters the handler; in-flight requests stay
/// queued.
#[derive(Debug)]
pub struct PermissionSubscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<PermissionRequest>,
    broker: Weak<BrokerInner>,
}

impl PermissionSubscription {
    /// Wait for the next active request. `None` once replaced or the broker is gone.
    pub async fn recv(&mut self) -> Option<PermissionRequest> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<PermissionRequest> {
        self.rx.try_recv().ok()
    }

    /// Unregister explicitly.
    pub fn close(self) {}
}

impl Stream for PermissionSubscription {
    type Item = PermissionRequest;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for PermissionSubscription {
    fn drop(&mut self) {
        if let Some(inner) = self.broker.upgrade() {
            PermissionBroker { inner }.unsubscribe(self.id);
        }
    }
}

impl std::fmt::Debug for BrokerInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerInner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
