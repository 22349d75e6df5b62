//! Incremental decoding of one assistant turn from a chunked byte stream.
//!
//! The wire format is newline-terminated `<code>:<json>` records. Chunks may
//! split records anywhere; [`LineBuffer`] reassembles lines and
//! [`MessageAssembler`] applies them to the message. A malformed record is
//! skipped, never fatal.

pub mod assembler;
pub mod buffer;
pub mod events;

pub use assembler::MessageAssembler;
pub use buffer::{LineBuffer, DEFAULT_MAX_LINE_BYTES};
pub use events::{StreamEvent, StreamEventSink};

use bon::Builder;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, TurnkitError};
use crate::types::Message;

/// Decoder settings.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Lines longer than this are dropped as malformed.
    #[builder(default = DEFAULT_MAX_LINE_BYTES)]
    pub max_line_bytes: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

/// Options for a single decode.
#[derive(Clone, Default, Builder)]
pub struct DecodeOptions {
    /// Receives structural events as records are applied.
    pub sink: Option<StreamEventSink>,
    /// Cancelling returns the partial message instead of an error.
    pub cancel: Option<CancellationToken>,
    #[builder(default)]
    pub config: StreamConfig,
}

/// Result of decoding a turn.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamOutcome {
    pub message: Message,
    /// True when decoding stopped on the cancellation token.
    pub cancelled: bool,
}

/// Decode a byte stream into a message.
///
/// Returns `Ok(None)` when there is no source. Source errors are returned as
/// errors; cancellation is not an error and yields the partial message.
pub async fn decode_stream<S, B, E>(
    source: Option<S>,
    options: DecodeOptions,
) -> Result<Option<StreamOutcome>>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<TurnkitError>,
{
    let Some(source) = source else {
        return Ok(None);
    };
    let DecodeOptions {
        sink,
        cancel,
        config,
    } = options;
    let cancel = cancel.unwrap_or_else(CancellationToken::new);
    let mut buffer = LineBuffer::new(config.max_line_bytes);
    let mut assembler = MessageAssembler::new(sink);
    futures::pin_mut!(source);

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(parts = assembler.message().parts.len(), "decode cancelled");
                return Ok(Some(StreamOutcome {
                    message: assembler.into_partial(),
                    cancelled: true,
                }));
            }
            next = source.next() => next,
        };
        match next {
            Some(Ok(chunk)) => {
                for line in buffer.push(chunk.as_ref()) {
                    assembler.apply_line(&line);
                }
            }
            Some(Err(err)) => return Err(err.into()),
            None => break,
        }
    }

    if let Some(rest) = buffer.finish() {
        assembler.apply_line(&rest);
    }
    if assembler.skipped() > 0 {
        tracing::debug!(skipped = assembler.skipped(), "decode finished with skipped records");
    }
    Ok(Some(StreamOutcome {
        message: assembler.finish(),
        cancelled: false,
    }))
}

/// Decode a streaming HTTP response.
///
/// Non-success statuses become [`TurnkitError::Http`]; a response without a
/// body (`204`, or an explicit zero length) yields `Ok(None)`.
pub async fn decode_response(
    response: reqwest::Response,
    options: DecodeOptions,
) -> Result<Option<StreamOutcome>> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(TurnkitError::http(status.as_u16(), body));
    }
    if status == StatusCode::NO_CONTENT || response.content_length() == Some(0) {
        return Ok(None);
    }
    decode_stream(Some(response.bytes_stream()), options).await
}

/// Pull-based variant: yields each [`StreamEvent`] as it is produced,
/// ending with `Finish`. Dropping the stream stops decoding.
pub fn stream_events<S, B, E>(
    source: S,
    config: StreamConfig,
) -> BoxStream<'static, Result<StreamEvent>>
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<TurnkitError> + Send + 'static,
{
    let events = async_stream::stream! {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let sink: StreamEventSink = std::sync::Arc::new(move |event| {
            let _ = tx.send(event);
        });
        let mut buffer = LineBuffer::new(config.max_line_bytes);
        let mut assembler = MessageAssembler::new(Some(sink));
        let mut inner = std::pin::pin!(source);

        while let Some(item) = inner.next().await {
            match item {
                Ok(chunk) => {
                    for line in buffer.push(chunk.as_ref()) {
                        assembler.apply_line(&line);
                    }
                    while let Ok(event) = rx.try_recv() {
                        yield Ok(event);
                    }
                }
                Err(e) => {
                    let err: TurnkitError = e.into();
                    yield Err(err);
                    return;
                }
            }
        }

        if let Some(rest) = buffer.finish() {
            assembler.apply_line(&rest);
        }
        assembler.finish();
        while let Ok(event) = rx.try_recv() {
            yield Ok(event);
        }
    };
    Box::pin(events)
}
