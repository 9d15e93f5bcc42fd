//! Event stream client: one push subscription per transfer.
//!
//! A producer task subscribes through an [`EventSource`], decodes each
//! payload and forwards it to the registry as a [`StreamEvent`]. Transport
//! failures are logged here and never reach the registry.

use crate::error::{Result, TransferError};
use crate::streaming::channel::{next_stream_id, StreamEvent, StreamEventSender, StreamHandle};
use crate::streaming::protocol::parse;
use async_trait::async_trait;
use bytes::BytesMut;
use futures::stream::{BoxStream, StreamExt};
use std::collections::VecDeque;
use std::sync::Arc;

/// Raw payloads of one subscription, in delivery order
pub type PayloadStream = BoxStream<'static, Result<String>>;

/// Opens push subscriptions for transfers.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn subscribe(&self, agent_id: u64, transfer_id: &str) -> Result<PayloadStream>;
}

// =============================================================================
// HTTP server-sent events
// =============================================================================

/// `text/event-stream` subscription against the transfer server
pub struct HttpEventSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpEventSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self, agent_id: u64, transfer_id: &str) -> String {
        format!(
            "{}/api/sse/agents/{}/transfers/{}/poll",
            self.base_url, agent_id, transfer_id
        )
    }
}

#[async_trait]
impl EventSource for HttpEventSource {
    async fn subscribe(&self, agent_id: u64, transfer_id: &str) -> Result<PayloadStream> {
        let response = self
            .client
            .get(self.endpoint(agent_id, transfer_id))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TransferError::StreamStatus {
                transfer_id: transfer_id.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = Box::pin(response.bytes_stream());
        let payloads = futures::stream::unfold(
            (body, SseDecoder::default(), VecDeque::new()),
            |(mut body, mut decoder, mut ready)| async move {
                loop {
                    if let Some(payload) = ready.pop_front() {
                        return Some((Ok(payload), (body, decoder, ready)));
                    }
                    match body.next().await {
                        Some(Ok(chunk)) => ready.extend(decoder.feed(&chunk)),
                        Some(Err(err)) => {
                            return Some((Err(TransferError::from(err)), (body, decoder, ready)))
                        }
                        None => return None,
                    }
                }
            },
        );

        Ok(payloads.boxed())
    }
}

/// Incremental decoder for `text/event-stream` bodies.
///
/// Yields the `data:` field of every complete event; multi-line data is
/// joined with `\n`. Comments and other fields are skipped.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: BytesMut,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw = self.buffer.split_to(pos + 1);
            let decoded = String::from_utf8_lossy(&raw[..pos]);
            let line = decoded.strip_suffix('\r').unwrap_or(decoded.as_ref());

            if line.is_empty() {
                if !self.data.is_empty() {
                    events.push(self.data.join("\n"));
                    self.data.clear();
                }
                continue;
            }

            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };

            if field == "data" {
                self.data.push(value.to_string());
            }
        }

        events
    }
}

// =============================================================================
// Producer task
// =============================================================================

/// Open the subscription for one transfer and start forwarding its messages.
///
/// The returned handle is the only way to stop the producer; the registry
/// closes it when the record turns terminal or is removed.
pub fn open_stream(
    source: Arc<dyn EventSource>,
    agent_id: u64,
    transfer_id: String,
    events: StreamEventSender,
) -> StreamHandle {
    let stream_id = next_stream_id();

    let task = tokio::spawn(async move {
        let mut payloads = match source.subscribe(agent_id, &transfer_id).await {
            Ok(payloads) => payloads,
            Err(err) => {
                tracing::warn!(
                    transfer_id = %transfer_id,
                    stream_id,
                    error = %err,
                    "Failed to open transfer event stream"
                );
                return;
            }
        };

        tracing::debug!(transfer_id = %transfer_id, stream_id, "Transfer event stream open");

        while let Some(item) = payloads.next().await {
            let payload = match item {
                Ok(payload) => payload,
                Err(err) => {
                    tracing::warn!(
                        transfer_id = %transfer_id,
                        stream_id,
                        error = %err,
                        "Transfer event stream error"
                    );
                    continue;
                }
            };

            tracing::trace!(transfer_id = %transfer_id, stream_id, payload = %payload, "Transfer event");

            let event = StreamEvent {
                transfer_id: transfer_id.clone(),
                stream_id,
                message: parse(&payload),
            };
            if events.send(event).await.is_err() {
                // Registry is gone
                break;
            }
        }

        tracing::debug!(transfer_id = %transfer_id, stream_id, "Transfer event stream ended");
    });

    StreamHandle::new(stream_id, task.abort_handle())
}
