//! Turnkit: agent turn runtime core
//!
//! Two independent pieces drive an assistant turn:
//!
//! - [`stream`] decodes the chunked `<code>:<json>` wire stream of one turn
//!   into a [`Message`](types::Message) of text, reasoning and tool-invocation
//!   parts, firing events as records arrive.
//! - [`permission`] serializes human approval requests raised by tool
//!   executions through a FIFO queue with a single active slot and timeouts.
//!
//! # Quick Start
//!
//! ```no_run
//! use turnkit::prelude::*;
//!
//! # async fn example() -> turnkit::error::Result<()> {
//! let chunks = futures::stream::iter(vec![
//!     Ok::<_, std::io::Error>(b"0:\"Hel".to_vec()),
//!     Ok(b"lo\"\n".to_vec()),
//! ]);
//! let outcome = decode_stream(Some(chunks), DecodeOptions::default()).await?;
//! assert_eq!(outcome.map(|o| o.message.text()).as_deref(), Some("Hello"));
//!
//! let broker = PermissionBroker::new(PermissionConfig::default());
//! let mut handler = broker.subscribe();
//! let ticket = broker.request_permission("rm -rf target", "rm");
//! if let Some(request) = handler.recv().await {
//!     broker.respond_to_permission(&request.id, PermissionResponse::Yes);
//! }
//! assert_eq!(ticket.await, Ok(PermissionResponse::Yes));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod permission;
pub mod prelude;
pub mod stream;
pub mod types;

#[cfg(feature = "cli")]
pub mod cli;
