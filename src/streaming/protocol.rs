//! Text wire grammar for transfer status messages.
//!
//! Every push event carries one UTF-8 payload of the form
//!
//! ```text
//! MESSAGE
//! MESSAGE::DATA
//! MESSAGE::DATA::EXTRA
//! ```
//!
//! Parsing is total: any payload decodes, and payloads that name no known
//! message are classified as [`MessageKind::Unrecognized`] at dispatch time.

/// Reserved field separator
pub const FIELD_SEPARATOR: &str = "::";

// =============================================================================
// Decoded payload
// =============================================================================

/// One decoded wire payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMessage {
    pub message: String,
    pub data: Option<String>,
    /// Everything after the second separator, verbatim
    pub extra: Option<String>,
}

impl ParsedMessage {
    pub fn kind(&self) -> MessageKind {
        MessageKind::from_message(&self.message)
    }

    pub fn progress_kind(&self) -> ProgressKind {
        ProgressKind::from_data(self.data.as_deref())
    }
}

/// Split a payload into its message, data and extra fields.
pub fn parse(payload: &str) -> ParsedMessage {
    let mut fields = payload.splitn(3, FIELD_SEPARATOR);

    ParsedMessage {
        message: fields.next().unwrap_or_default().to_string(),
        data: fields.next().map(str::to_string),
        extra: fields.next().map(str::to_string),
    }
}

// =============================================================================
// Message classification
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Archiving,
    Compressing,
    StartingUpload,
    Uploading,
    Extracting,
    Complete,
    Progress,
    Signal,
    /// Any other message value; treated as the transfer's own failure
    Unrecognized,
}

impl MessageKind {
    pub fn from_message(message: &str) -> Self {
        match message {
            "archiving" => Self::Archiving,
            "compressing" => Self::Compressing,
            "starting upload" | "starting-upload" => Self::StartingUpload,
            "uploading" => Self::Uploading,
            "extracting" => Self::Extracting,
            "complete" => Self::Complete,
            "progress" => Self::Progress,
            "signal" => Self::Signal,
            _ => Self::Unrecognized,
        }
    }

    /// Whether this message ends the transfer's pending state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Signal | Self::Unrecognized)
    }
}

/// The `DATA` field of a `progress` message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressKind {
    /// `progress::stats::<bytes>/<total>`
    Stats,
    /// `progress::archived::<n0>/<n1>[/<n2>]`
    Archived,
    /// `progress::compressed::<n0>/<n1>[/<n2>]`
    Compressed,
    Other,
}

impl ProgressKind {
    pub fn from_data(data: Option<&str>) -> Self {
        match data {
            Some("stats") => Self::Stats,
            Some("archived") => Self::Archived,
            Some("compressed") => Self::Compressed,
            _ => Self::Other,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
