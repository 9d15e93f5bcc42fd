//! Transfer records and the partial updates applied to them.
//!
//! A [`Transfer`] is never mutated in place: [`Transfer::apply`] returns a new
//! record, and the registry swaps whole collections. Only the fields present
//! on [`TransferUpdate`] can change after creation; `transfer_id`, `action`
//! and `title` have no counterpart there.

use crate::streaming::channel::StreamHandle;
use crate::streaming::stats::{ArchiveStats, ByteStats, ScaledBytes};
use serde::{Deserialize, Serialize};

/// Status label of a freshly created transfer
pub const INITIAL_STATUS: &str = "starting";

// =============================================================================
// Value types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Copy,
    Move,
}

impl Action {
    fn verb(&self) -> &'static str {
        match self {
            Action::Copy => "Copying",
            Action::Move => "Moving",
        }
    }

    /// Remote action name understood by the start endpoint
    pub fn remote_action(&self) -> &'static str {
        match self {
            Action::Copy => "remote-copy",
            Action::Move => "remote-rename",
        }
    }
}

/// Remote agent a transfer targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRef {
    pub id: u64,
    pub host: String,
    pub port: u16,
}

/// One item being copied or moved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferItem {
    pub from: String,
    pub to: String,
    pub name: String,
    pub is_dir: bool,
}

/// Glyph shown for the transfer's current phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhaseIcon {
    ArchiveIcon,
    UploadIcon,
    MoveIcon,
    DoneIcon,
    CancelIcon,
    ErrorIcon,
}

impl PhaseIcon {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseIcon::ArchiveIcon => "archive-icon",
            PhaseIcon::UploadIcon => "upload-icon",
            PhaseIcon::MoveIcon => "move-icon",
            PhaseIcon::DoneIcon => "done-icon",
            PhaseIcon::CancelIcon => "cancel-icon",
            PhaseIcon::ErrorIcon => "error-icon",
        }
    }
}

/// Last reported progress figures. Replaced as a whole by every
/// stats-bearing message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferStats {
    pub progress: Option<ScaledBytes>,
    pub total: Option<ScaledBytes>,
    pub archived: Option<[u64; 3]>,
}

impl From<ByteStats> for TransferStats {
    fn from(stats: ByteStats) -> Self {
        Self {
            progress: Some(stats.progress),
            total: Some(stats.total),
            archived: None,
        }
    }
}

impl From<ArchiveStats> for TransferStats {
    fn from(stats: ArchiveStats) -> Self {
        Self {
            progress: None,
            total: None,
            archived: Some(stats.archived),
        }
    }
}

/// Display title, e.g. `Copying 3 items to files.example:8080`
pub fn title_for(action: Action, item_count: usize, agent: &AgentRef) -> String {
    let plural = if item_count == 1 { "" } else { "s" };
    format!(
        "{} {} item{} to {}:{}",
        action.verb(),
        item_count,
        plural,
        agent.host,
        agent.port
    )
}

// =============================================================================
// Transfer
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Transfer {
    pub transfer_id: String,
    pub action: Action,
    pub agent: AgentRef,
    pub items: Vec<TransferItem>,
    pub title: String,

    pub status: String,
    pub icon: Option<PhaseIcon>,
    /// Whole percent of bytes uploaded, when known
    pub progress: Option<u8>,
    pub stats: TransferStats,

    pub pending: bool,
    pub canceled: bool,
    pub error: bool,
    pub uploading: bool,
    pub cancelable: bool,

    pub show_details: bool,
    pub show_items: bool,
    pub show_paths: bool,

    /// Live subscription; never persisted
    pub stream: Option<StreamHandle>,
}

impl Transfer {
    pub fn from_new(new: NewTransfer) -> Self {
        let title = title_for(new.action, new.items.len(), &new.agent);

        Self {
            transfer_id: new.transfer_id,
            action: new.action,
            agent: new.agent,
            items: new.items,
            title,
            status: new.status.unwrap_or_else(|| INITIAL_STATUS.to_string()),
            icon: new.icon,
            progress: new.progress,
            stats: new.stats.unwrap_or_default(),
            pending: new.pending,
            canceled: new.canceled,
            error: new.error,
            uploading: new.uploading,
            cancelable: new.cancelable,
            show_details: new.show_details,
            show_items: new.show_items,
            show_paths: new.show_paths,
            stream: None,
        }
    }

    /// Build the successor record: every field copied, allow-listed fields
    /// present in `update` overwritten.
    pub fn apply(&self, update: &TransferUpdate) -> Transfer {
        let mut next = self.clone();

        if let Some(agent) = &update.agent {
            next.agent = agent.clone();
        }
        if let Some(pending) = update.pending {
            next.pending = pending;
        }
        if let Some(items) = &update.items {
            next.items = items.clone();
        }
        if let Some(error) = update.error {
            next.error = error;
        }
        if let Some(status) = &update.status {
            next.status = status.clone();
        }
        if let Some(icon) = update.icon {
            next.icon = Some(icon);
        }
        if let Some(progress) = update.progress {
            next.progress = Some(progress);
        }
        if let Some(stats) = &update.stats {
            next.stats = stats.clone();
        }
        if let Some(canceled) = update.canceled {
            next.canceled = canceled;
        }
        if let Some(cancelable) = update.cancelable {
            next.cancelable = cancelable;
        }
        if let Some(uploading) = update.uploading {
            next.uploading = uploading;
        }
        if let Some(show_details) = update.show_details {
            next.show_details = show_details;
        }
        if let Some(show_items) = update.show_items {
            next.show_items = show_items;
        }
        if let Some(show_paths) = update.show_paths {
            next.show_paths = show_paths;
        }

        next
    }

    /// Whether a live subscription should exist for this record
    pub fn wants_stream(&self) -> bool {
        self.pending && !self.canceled
    }
}

// =============================================================================
// NewTransfer: creation request
// =============================================================================

/// Everything needed to start tracking a transfer.
///
/// `new` fills the defaults of a just-started operation; the remaining
/// fields exist so a persisted snapshot can be restored as it was.
#[derive(Debug, Clone)]
pub struct NewTransfer {
    pub transfer_id: String,
    pub action: Action,
    pub agent: AgentRef,
    pub items: Vec<TransferItem>,
    pub status: Option<String>,
    pub icon: Option<PhaseIcon>,
    pub progress: Option<u8>,
    pub stats: Option<TransferStats>,
    pub pending: bool,
    pub canceled: bool,
    pub error: bool,
    pub uploading: bool,
    pub cancelable: bool,
    pub show_details: bool,
    pub show_items: bool,
    pub show_paths: bool,
}

impl NewTransfer {
    pub fn new(
        transfer_id: impl Into<String>,
        action: Action,
        agent: AgentRef,
        items: Vec<TransferItem>,
    ) -> Self {
        Self {
            transfer_id: transfer_id.into(),
            action,
            agent,
            items,
            status: None,
            icon: None,
            progress: None,
            stats: None,
            pending: true,
            canceled: false,
            error: false,
            uploading: false,
            cancelable: true,
            show_details: false,
            show_items: false,
            show_paths: false,
        }
    }
}

// =============================================================================
// TransferUpdate: allow-listed partial update
// =============================================================================

/// Partial update addressed by `transfer_id`. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferUpdate {
    pub transfer_id: String,
    pub agent: Option<AgentRef>,
    pub pending: Option<bool>,
    pub items: Option<Vec<TransferItem>>,
    pub error: Option<bool>,
    pub status: Option<String>,
    pub icon: Option<PhaseIcon>,
    pub progress: Option<u8>,
    pub stats: Option<TransferStats>,
    pub canceled: Option<bool>,
    pub cancelable: Option<bool>,
    pub uploading: Option<bool>,
    pub show_details: Option<bool>,
    pub show_items: Option<bool>,
    pub show_paths: Option<bool>,
}

impl TransferUpdate {
    pub fn new(transfer_id: impl Into<String>) -> Self {
        Self {
            transfer_id: transfer_id.into(),
            ..Default::default()
        }
    }

    /// Whether applying this update ends the transfer's pending state
    pub fn is_terminal(&self) -> bool {
        self.pending == Some(false)
    }
}
