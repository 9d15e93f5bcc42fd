//! Persistence bridge: mirrors registry records into a [`KvStore`].
//!
//! Layout:
//! - `rc-transfers`: JSON array of known transfer ids, in creation order
//! - `transfer-{id}`: JSON [`TransferSnapshot`] of that transfer
//!
//! The live stream handle is never written.

use crate::error::Result;
use crate::store::KvStore;
use crate::transfer::record::{
    Action, AgentRef, NewTransfer, PhaseIcon, Transfer, TransferItem, TransferStats,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Key of the transfer id index
pub const INDEX_KEY: &str = "rc-transfers";

pub fn snapshot_key(transfer_id: &str) -> String {
    format!("transfer-{}", transfer_id)
}

/// Restorable subset of a [`Transfer`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferSnapshot {
    #[serde(rename = "transferID")]
    pub transfer_id: String,
    pub title: String,
    pub status: String,
    #[serde(default)]
    pub icon: Option<PhaseIcon>,
    pub action: Action,
    pub agent: AgentRef,
    pub items: Vec<TransferItem>,
    pub pending: bool,
    #[serde(default)]
    pub canceled: bool,
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub cancelable: bool,
    #[serde(default)]
    pub uploading: bool,
    #[serde(default)]
    pub progress: Option<u8>,
    #[serde(default)]
    pub stats: TransferStats,
    #[serde(default)]
    pub show_details: bool,
    #[serde(default)]
    pub show_items: bool,
    #[serde(default)]
    pub show_paths: bool,
    pub saved_at: DateTime<Utc>,
}

impl From<&Transfer> for TransferSnapshot {
    fn from(transfer: &Transfer) -> Self {
        Self {
            transfer_id: transfer.transfer_id.clone(),
            title: transfer.title.clone(),
            status: transfer.status.clone(),
            icon: transfer.icon,
            action: transfer.action,
            agent: transfer.agent.clone(),
            items: transfer.items.clone(),
            pending: transfer.pending,
            canceled: transfer.canceled,
            error: transfer.error,
            cancelable: transfer.cancelable,
            uploading: transfer.uploading,
            progress: transfer.progress,
            stats: transfer.stats.clone(),
            show_details: transfer.show_details,
            show_items: transfer.show_items,
            show_paths: transfer.show_paths,
            saved_at: Utc::now(),
        }
    }
}

impl TransferSnapshot {
    /// Creation request that restores this snapshot as it was saved
    pub fn into_new_transfer(self) -> NewTransfer {
        let mut new = NewTransfer::new(self.transfer_id, self.action, self.agent, self.items);
        new.status = Some(self.status);
        new.icon = self.icon;
        new.progress = self.progress;
        new.stats = Some(self.stats);
        new.pending = self.pending;
        new.canceled = self.canceled;
        new.error = self.error;
        new.uploading = self.uploading;
        new.cancelable = self.cancelable;
        new.show_details = self.show_details;
        new.show_items = self.show_items;
        new.show_paths = self.show_paths;
        new
    }
}

// =============================================================================
// Bridge
// =============================================================================

#[derive(Clone)]
pub struct PersistenceBridge {
    store: Arc<dyn KvStore>,
}

impl PersistenceBridge {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Append the id to the index if it is new, then write the snapshot
    pub fn add(&self, transfer: &Transfer) -> Result<()> {
        let mut index = self.load_index()?;
        if !index.iter().any(|id| id == &transfer.transfer_id) {
            index.push(transfer.transfer_id.clone());
            self.write_index(&index)?;
        }
        self.write_snapshot(transfer)
    }

    /// Overwrite the snapshot; the index is left alone
    pub fn update(&self, transfer: &Transfer) -> Result<()> {
        self.write_snapshot(transfer)
    }

    /// Drop the id from the index and delete its snapshot
    pub fn remove(&self, transfer_id: &str) -> Result<()> {
        let mut index = self.load_index()?;
        let before = index.len();
        index.retain(|id| id != transfer_id);
        if index.len() != before {
            self.write_index(&index)?;
        }
        self.store.remove(&snapshot_key(transfer_id))
    }

    pub fn load_index(&self) -> Result<Vec<String>> {
        match self.store.get(INDEX_KEY)? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn load(&self, transfer_id: &str) -> Result<Option<TransferSnapshot>> {
        match self.store.get(&snapshot_key(transfer_id))? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Every indexed snapshot that can be read back, in index order
    pub fn load_all(&self) -> Result<Vec<TransferSnapshot>> {
        let mut snapshots = Vec::new();

        for transfer_id in self.load_index()? {
            match self.load(&transfer_id) {
                Ok(Some(snapshot)) => snapshots.push(snapshot),
                Ok(None) => {
                    tracing::warn!(transfer_id = %transfer_id, "Indexed transfer has no snapshot");
                }
                Err(err) => {
                    tracing::warn!(
                        transfer_id = %transfer_id,
                        error = %err,
                        "Skipping unreadable transfer snapshot"
                    );
                }
            }
        }

        Ok(snapshots)
    }

    fn write_index(&self, index: &[String]) -> Result<()> {
        self.store.set(INDEX_KEY, &serde_json::to_string(index)?)
    }

    fn write_snapshot(&self, transfer: &Transfer) -> Result<()> {
        let snapshot = TransferSnapshot::from(transfer);
        self.store.set(
            &snapshot_key(&transfer.transfer_id),
            &serde_json::to_string(&snapshot)?,
        )
    }
}
