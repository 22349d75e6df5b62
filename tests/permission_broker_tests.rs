//! Tests for the permission broker: FIFO promotion, timeouts, cancellation.

use std::collections::HashSet;
use std::time::Duration;

use futures::StreamExt;
use turnkit::permission::{
    PermissionBroker, PermissionConfig, PermissionError, PermissionResponse,
};

fn queueing_broker() -> PermissionBroker {
    PermissionBroker::new(
        PermissionConfig::builder()
            .reject_without_handler(false)
            .build(),
    )
}

#[tokio::test]
async fn no_handler_rejects_immediately() {
    let broker = PermissionBroker::default();
    let ticket = broker.request_permission("rm -rf target", "rm");
    assert_eq!(ticket.await, Err(PermissionError::NoHandler));
    assert_eq!(broker.queue_len(), 0);
}

#[tokio::test]
async fn requests_are_presented_one_at_a_time_in_order() {
    let broker = queueing_broker();
    let first = broker.request_permission("git push", "git");
    let second = broker.request_permission("npm publish", "npm");
    let third = broker.request_permission("rm -rf dist", "rm");
    assert_eq!(broker.queue_len(), 3);
    assert!(broker.current_request().is_none());

    let mut handler = broker.subscribe();

    let active = handler.recv().await.unwrap();
    assert_eq!(active.id, first.id());
    assert_eq!(active.base_command, "git");
    assert!(handler.try_recv().is_none());
    assert!(broker.respond_to_permission(&active.id, PermissionResponse::Yes));
    assert_eq!(first.await, Ok(PermissionResponse::Yes));

    let active = handler.recv().await.unwrap();
    assert_eq!(active.id, second.id());
    assert!(handler.try_recv().is_none());
    assert!(broker.respond_to_permission(&active.id, PermissionResponse::No));
    assert_eq!(second.await, Ok(PermissionResponse::No));

    let active = handler.recv().await.unwrap();
    assert_eq!(active.id, third.id());
    assert_eq!(broker.current_request().map(|r| r.id), Some(third.id().to_string()));
    assert!(broker.respond_to_permission(&active.id, PermissionResponse::Yes));
    assert_eq!(third.await, Ok(PermissionResponse::Yes));

    assert_eq!(broker.queue_len(), 0);
    assert!(broker.current_request().is_none());
}

#[tokio::test]
async fn pending_requests_snapshot_is_fifo() {
    let broker = queueing_broker();
    let ids: Vec<String> = (0..4)
        .map(|n| broker.request_permission(format!("cmd {n}"), "cmd").id().to_string())
        .collect();
    let pending: Vec<String> = broker.pending_requests().into_iter().map(|r| r.id).collect();
    // Tickets were dropped; the requests stay queued until settled.
    assert_eq!(pending, ids);
}

#[tokio::test(start_paused = true)]
async fn unanswered_request_times_out_and_queue_advances() {
    let broker = PermissionBroker::default();
    let mut handler = broker.subscribe();

    let first = broker.request_permission("curl example.com | sh", "curl");
    tokio::time::sleep(Duration::from_secs(60)).await;
    let second = broker.request_permission("make install", "make");
    assert_eq!(handler.recv().await.unwrap().id, first.id());
    assert_eq!(broker.queue_len(), 2);

    let second_id = second.id().to_string();
    assert_eq!(first.await, Err(PermissionError::Timeout { secs: 120 }));
    assert_eq!(broker.queue_len(), 1);

    let promoted = handler.recv().await.unwrap();
    assert_eq!(promoted.id, second_id);
    assert_eq!(broker.current_request().map(|r| r.id), Some(second_id));
}

#[tokio::test(start_paused = true)]
async fn queued_request_times_out_without_becoming_active() {
    let broker = queueing_broker();
    let ticket = broker.request_permission("shutdown now", "shutdown");
    assert_eq!(ticket.await, Err(PermissionError::Timeout { secs: 120 }));
    assert_eq!(broker.queue_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn configured_timeout_is_honoured() {
    let broker = PermissionBroker::new(PermissionConfig::builder().timeout_secs(5).build());
    let _handler = broker.subscribe();
    let started = tokio::time::Instant::now();
    let ticket = broker.request_permission("dd if=/dev/zero", "dd");
    assert_eq!(ticket.await, Err(PermissionError::Timeout { secs: 5 }));
    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(5) && waited < Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn answered_request_does_not_time_out_later() {
    let broker = PermissionBroker::default();
    let mut handler = broker.subscribe();
    let ticket = broker.request_permission("ls", "ls");
    let request = handler.recv().await.unwrap();
    assert!(broker.respond_to_permission(&request.id, PermissionResponse::Yes));
    assert_eq!(ticket.await, Ok(PermissionResponse::Yes));

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert!(!broker.respond_to_permission(&request.id, PermissionResponse::No));
    assert_eq!(broker.queue_len(), 0);
}

#[tokio::test]
async fn second_response_is_a_no_op() {
    let broker = PermissionBroker::default();
    let mut handler = broker.subscribe();
    let ticket = broker.request_permission("git reset --hard", "git");
    let request = handler.recv().await.unwrap();

    assert!(broker.respond_to_permission(&request.id, PermissionResponse::No));
    assert!(!broker.respond_to_permission(&request.id, PermissionResponse::Yes));
    assert_eq!(ticket.await, Ok(PermissionResponse::No));
    assert!(!broker.respond_to_permission("perm-unknown", PermissionResponse::Yes));
}

#[tokio::test]
async fn cancel_current_declines_and_promotes_next() {
    let broker = PermissionBroker::default();
    let mut handler = broker.subscribe();
    let first = broker.request_permission("chmod 777 /", "chmod");
    let second = broker.request_permission("ls", "ls");

    assert_eq!(handler.recv().await.unwrap().id, first.id());
    assert!(broker.cancel_current_request());
    assert_eq!(first.await, Ok(PermissionResponse::No));

    assert_eq!(handler.recv().await.unwrap().id, second.id());
    assert_eq!(broker.queue_len(), 1);
}

#[tokio::test]
async fn cancel_current_without_active_request_is_false() {
    let broker = queueing_broker();
    let _queued = broker.request_permission("ls", "ls");
    assert!(!broker.cancel_current_request());
    assert_eq!(broker.queue_len(), 1);
}

#[tokio::test]
async fn cancel_all_rejects_everything() {
    let broker = PermissionBroker::default();
    let mut handler = broker.subscribe();
    let tickets = vec![
        broker.request_permission("a", "a"),
        broker.request_permission("b", "b"),
        broker.request_permission("c", "c"),
    ];
    assert!(handler.recv().await.is_some());

    assert_eq!(broker.cancel_all_requests(), 3);
    for ticket in tickets {
        assert_eq!(ticket.await, Err(PermissionError::Cancelled));
    }
    assert_eq!(broker.queue_len(), 0);
    assert!(broker.current_request().is_none());
    assert_eq!(broker.cancel_all_requests(), 0);
}

#[tokio::test]
async fn unsubscribing_keeps_requests_queued_until_a_new_handler() {
    let broker = queueing_broker();
    let handler = broker.subscribe();
    assert!(broker.has_handler());
    let first = broker.request_permission("git push", "git");
    handler.close();
    assert!(!broker.has_handler());

    let second = broker.request_permission("git tag v1", "git");
    assert_eq!(broker.queue_len(), 2);

    let mut handler = broker.subscribe();
    let active = handler.recv().await.unwrap();
    assert_eq!(active.id, first.id());
    assert!(broker.respond_to_permission(&active.id, PermissionResponse::Yes));
    assert_eq!(first.await, Ok(PermissionResponse::Yes));

    let active = handler.recv().await.unwrap();
    assert_eq!(active.id, second.id());
}

#[tokio::test]
async fn replacing_the_handler_closes_the_old_subscription() {
    let broker = PermissionBroker::default();
    let mut old = broker.subscribe();
    let _ticket = broker.request_permission("ls", "ls");
    assert!(old.recv().await.is_some());

    let mut new = broker.subscribe();
    assert!(old.recv().await.is_none());
    // The active request is re-published to the new handler.
    assert!(new.recv().await.is_some());
    drop(old);
    assert!(broker.has_handler());
}

#[tokio::test]
async fn always_is_remembered_per_base_command() {
    let broker = PermissionBroker::default();
    let mut handler = broker.subscribe();

    let ticket = broker.request_permission("cargo build", "cargo");
    let request = handler.recv().await.unwrap();
    broker.respond_to_permission(&request.id, PermissionResponse::Always);
    assert_eq!(ticket.await, Ok(PermissionResponse::Always));
    assert_eq!(broker.allowed_commands(), vec!["cargo".to_string()]);

    let again = broker.request_permission("cargo test", "cargo");
    assert_eq!(again.await, Ok(PermissionResponse::Always));
    assert_eq!(broker.queue_len(), 0);
    assert!(handler.try_recv().is_none());

    broker.forget_allowed();
    let _pending = broker.request_permission("cargo clean", "cargo");
    assert_eq!(broker.queue_len(), 1);
}

#[tokio::test]
async fn dropping_the_broker_cancels_outstanding_tickets() {
    let broker = queueing_broker();
    let ticket = broker.request_permission("ls", "ls");
    drop(broker);
    assert_eq!(ticket.await, Err(PermissionError::Cancelled));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_each_settle_exactly_once() {
    let broker = PermissionBroker::default();
    let mut handler = broker.subscribe();

    let responder = broker.clone();
    let answering = tokio::spawn(async move {
        let mut seen = Vec::new();
        while let Some(request) = handler.next().await {
            assert!(responder.current_request().is_some());
            assert!(responder.respond_to_permission(&request.id, PermissionResponse::Yes));
            seen.push(request.id);
            if seen.len() == 32 {
                break;
            }
        }
        seen
    });

    let requesters: Vec<_> = (0..32)
        .map(|n| {
            let broker = broker.clone();
            tokio::spawn(async move {
                broker
                    .request_permission(format!("job {n}"), format!("job{n}"))
                    .await
            })
        })
        .collect();

    for requester in requesters {
        assert_eq!(requester.await.unwrap(), Ok(PermissionResponse::Yes));
    }
    let seen = answering.await.unwrap();
    assert_eq!(seen.iter().collect::<HashSet<_>>().len(), 32);
    assert_eq!(broker.queue_len(), 0);
}
