//! Channel types between stream producers and the registry.
//!
//! Each transfer's producer task pushes decoded [`StreamEvent`]s onto one
//! shared bounded channel; the registry task is the only consumer.

use crate::streaming::protocol::ParsedMessage;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// Channel size for producers -> registry (decoded events)
pub const EVENT_CHANNEL_SIZE: usize = 256;

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-unique stream id
pub fn next_stream_id() -> u64 {
    NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed)
}

// =============================================================================
// StreamEvent: producer -> registry
// =============================================================================

/// One decoded protocol message from a transfer's push stream.
#[derive(Debug, Clone)]
pub struct StreamEvent {
    pub transfer_id: String,

    /// Id of the subscription that delivered the message. Events from a
    /// subscription the record no longer owns are dropped by the registry.
    pub stream_id: u64,

    pub message: ParsedMessage,
}

/// Sender side, cloned into every producer task
pub type StreamEventSender = mpsc::Sender<StreamEvent>;

/// Receiver side, owned by the registry task
pub type StreamEventReceiver = mpsc::Receiver<StreamEvent>;

pub fn stream_event_channel() -> (StreamEventSender, StreamEventReceiver) {
    mpsc::channel(EVENT_CHANNEL_SIZE)
}

// =============================================================================
// StreamHandle: ownership of one live subscription
// =============================================================================

/// Handle to a transfer's live event-stream subscription.
///
/// Closing aborts the producer task, which drops the HTTP response and
/// with it the connection. Closing twice is harmless.
#[derive(Debug, Clone)]
pub struct StreamHandle {
    id: u64,
    abort: AbortHandle,
}

impl StreamHandle {
    pub fn new(id: u64, abort: AbortHandle) -> Self {
        Self { id, abort }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn close(&self) {
        self.abort.abort();
    }

    pub fn is_closed(&self) -> bool {
        self.abort.is_finished()
    }
}

impl PartialEq for StreamHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for StreamHandle {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::protocol::parse;
    use std::time::Duration;

    #[test]
    fn test_stream_ids_are_unique() {
        let a = next_stream_id();
        let b = next_stream_id();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_stream_event_channel() {
        let (tx, mut rx) = stream_event_channel();

        tx.send(StreamEvent {
            transfer_id: "t-1".to_string(),
            stream_id: 7,
            message: parse("archiving"),
        })
        .await
        .unwrap();
        drop(tx);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.transfer_id, "t-1");
        assert_eq!(event.stream_id, 7);
        assert_eq!(event.message.message, "archiving");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_close_aborts_task() {
        let task = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        let handle = StreamHandle::new(next_stream_id(), task.abort_handle());
        assert!(!handle.is_closed());

        handle.close();
        handle.close();

        let joined = task.await;
        assert!(joined.unwrap_err().is_cancelled());
        assert!(handle.is_closed());
    }
}
