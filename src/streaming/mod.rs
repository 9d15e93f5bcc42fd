//! Push event streams for tracked transfers.
//!
//! # Architecture
//!
//! ```text
//! +-----------------+     +-----------------+     +-----------------+
//! | producer task   | --> | StreamEvent     | --> | registry task   |
//! | (one/transfer)  |     | (bounded mpsc)  |     | (single owner)  |
//! +-----------------+     +-----------------+     +-----------------+
//!   SSE decode,             transfer_id,            effect_for(),
//!   protocol::parse         stream_id               commit, persist
//! ```
//!
//! Wire payloads are `MESSAGE`, `MESSAGE::DATA` or `MESSAGE::DATA::EXTRA`.

pub mod channel;
pub mod client;
pub mod effects;
pub mod protocol;
pub mod stats;

pub use channel::{
    stream_event_channel, StreamEvent, StreamEventReceiver, StreamEventSender, StreamHandle,
    EVENT_CHANNEL_SIZE,
};
pub use client::{open_stream, EventSource, HttpEventSource, PayloadStream, SseDecoder};
pub use effects::{effect_for, MessageEffect};
pub use protocol::{parse, MessageKind, ParsedMessage, ProgressKind, FIELD_SEPARATOR};
pub use stats::{
    format_archive_stats, format_byte_stats, parse_byte_stats, ArchiveStats, ByteStats, ByteUnit,
    ScaledBytes,
};
