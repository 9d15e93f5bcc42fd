//! Transfer registry: the single owner of all transfer records.
//!
//! The registry runs as one task. Commands from [`RegistryHandle`]s and
//! decoded stream events are handled one at a time, each carried through
//! parse, commit, persist and indicator before the next is taken. Every
//! mutation builds a fresh `Arc<[Transfer]>` and publishes it on a watch
//! channel, so readers only ever see whole snapshots.

use crate::error::{Result, TransferError};
use crate::i18n::Translate;
use crate::indicator::IndicatorAggregator;
use crate::store::PersistenceBridge;
use crate::streaming::channel::{
    stream_event_channel, StreamEvent, StreamEventReceiver, StreamEventSender,
};
use crate::streaming::client::{open_stream, EventSource};
use crate::streaming::effects::effect_for;
use crate::transfer::record::{NewTransfer, Transfer, TransferUpdate};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};

/// Channel size for handles -> registry
pub const COMMAND_CHANNEL_SIZE: usize = 64;

/// Linear lookup by id
pub fn get<'a>(transfers: &'a [Transfer], transfer_id: &str) -> Option<&'a Transfer> {
    transfers.iter().find(|t| t.transfer_id == transfer_id)
}

pub struct Registry {
    transfers: Arc<[Transfer]>,
    published: watch::Sender<Arc<[Transfer]>>,
    bridge: PersistenceBridge,
    source: Arc<dyn EventSource>,
    events: StreamEventSender,
    indicator: IndicatorAggregator,
    translator: Arc<dyn Translate>,
}

impl Registry {
    /// Build an empty registry. The returned receiver carries the events of
    /// every stream the registry opens; hand it to [`spawn`](Self::spawn).
    pub fn new(
        bridge: PersistenceBridge,
        source: Arc<dyn EventSource>,
        indicator: IndicatorAggregator,
        translator: Arc<dyn Translate>,
    ) -> (Self, StreamEventReceiver) {
        let (events, receiver) = stream_event_channel();
        let transfers: Arc<[Transfer]> = Arc::from(Vec::new());
        let (published, _) = watch::channel(transfers.clone());

        let registry = Self {
            transfers,
            published,
            bridge,
            source,
            events,
            indicator,
            translator,
        };

        (registry, receiver)
    }

    pub fn snapshot(&self) -> Arc<[Transfer]> {
        self.transfers.clone()
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Start tracking a transfer.
    ///
    /// A record that is pending and not canceled gets its stream opened
    /// here. An id that is already tracked is rejected and the existing
    /// record is left untouched.
    pub fn create(&mut self, new: NewTransfer) -> Result<()> {
        if get(&self.transfers, &new.transfer_id).is_some() {
            tracing::warn!(transfer_id = %new.transfer_id, "Transfer already tracked");
            return Err(TransferError::Duplicate(new.transfer_id));
        }

        let mut transfer = Transfer::from_new(new);
        self.reconcile_stream(&mut transfer);

        tracing::info!(
            transfer_id = %transfer.transfer_id,
            title = %transfer.title,
            streaming = transfer.stream.is_some(),
            "Tracking transfer"
        );

        if let Err(err) = self.bridge.add(&transfer) {
            tracing::warn!(transfer_id = %transfer.transfer_id, error = %err, "Failed to persist transfer");
        }

        let next: Vec<Transfer> = self
            .transfers
            .iter()
            .cloned()
            .chain(std::iter::once(transfer))
            .collect();
        self.commit(next);
        self.indicator.recompute(&self.transfers);

        Ok(())
    }

    /// Apply an allow-listed partial update. Unknown ids are ignored.
    pub fn update(&mut self, update: &TransferUpdate) -> Option<Transfer> {
        let updated = self.replace(update)?;
        self.indicator.recompute(&self.transfers);
        Some(updated)
    }

    /// Stop tracking a transfer, releasing its stream and its persisted state.
    pub fn remove(&mut self, transfer_id: &str) -> bool {
        let Some(existing) = get(&self.transfers, transfer_id) else {
            tracing::debug!(transfer_id, "Remove of unknown transfer ignored");
            return false;
        };

        if let Some(stream) = &existing.stream {
            stream.close();
        }

        let next: Vec<Transfer> = self
            .transfers
            .iter()
            .filter(|t| t.transfer_id != transfer_id)
            .cloned()
            .collect();
        self.commit(next);

        if let Err(err) = self.bridge.remove(transfer_id) {
            tracing::warn!(transfer_id, error = %err, "Failed to remove persisted transfer");
        }

        tracing::info!(transfer_id, "Removed transfer");
        self.indicator.recompute(&self.transfers);
        true
    }

    /// Apply one decoded protocol message.
    pub fn handle_event(&mut self, event: StreamEvent) {
        let Some(transfer) = get(&self.transfers, &event.transfer_id) else {
            tracing::debug!(transfer_id = %event.transfer_id, "Event for unknown transfer dropped");
            return;
        };

        let owned = transfer.stream.as_ref().map(|s| s.id()) == Some(event.stream_id);
        if !owned {
            tracing::debug!(
                transfer_id = %event.transfer_id,
                stream_id = event.stream_id,
                "Event from stale stream dropped"
            );
            return;
        }

        let effect = effect_for(&event.transfer_id, &event.message, self.translator.as_ref());

        if effect.failed {
            tracing::warn!(
                transfer_id = %event.transfer_id,
                message = %event.message.message,
                "Transfer failed"
            );
        } else {
            tracing::debug!(
                transfer_id = %event.transfer_id,
                message = %event.message.message,
                data = ?event.message.data,
                "Transfer event"
            );
        }

        if self.replace(&effect.update).is_none() {
            return;
        }

        if effect.is_terminal() && !effect.failed {
            self.indicator.settle_after_terminal(&self.transfers);
        } else {
            self.indicator.recompute(&self.transfers);
        }
    }

    /// Close every live stream
    pub fn shutdown(&mut self) {
        for transfer in self.transfers.iter() {
            if let Some(stream) = &transfer.stream {
                stream.close();
            }
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Commit `update` copy-on-write and persist the result
    fn replace(&mut self, update: &TransferUpdate) -> Option<Transfer> {
        let Some(position) = self
            .transfers
            .iter()
            .position(|t| t.transfer_id == update.transfer_id)
        else {
            tracing::debug!(transfer_id = %update.transfer_id, "Update of unknown transfer ignored");
            return None;
        };

        let mut updated = self.transfers[position].apply(update);
        self.reconcile_stream(&mut updated);

        if let Err(err) = self.bridge.update(&updated) {
            tracing::warn!(transfer_id = %updated.transfer_id, error = %err, "Failed to persist transfer");
        }

        let mut next = self.transfers.to_vec();
        next[position] = updated.clone();
        self.commit(next);

        Some(updated)
    }

    /// Open or release the record's stream so that one exists exactly while
    /// the record is pending and not canceled
    fn reconcile_stream(&self, transfer: &mut Transfer) {
        if transfer.wants_stream() {
            if transfer.stream.is_none() {
                transfer.stream = Some(open_stream(
                    self.source.clone(),
                    transfer.agent.id,
                    transfer.transfer_id.clone(),
                    self.events.clone(),
                ));
            }
        } else if let Some(stream) = transfer.stream.take() {
            tracing::debug!(
                transfer_id = %transfer.transfer_id,
                stream_id = stream.id(),
                "Closing transfer event stream"
            );
            stream.close();
        }
    }

    fn commit(&mut self, next: Vec<Transfer>) {
        self.transfers = Arc::from(next);
        self.published.send_replace(self.transfers.clone());
    }

    // =========================================================================
    // Actor
    // =========================================================================

    /// Move the registry onto its own task
    pub fn spawn(self, events: StreamEventReceiver) -> RegistryHandle {
        let (commands, rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let snapshots = self.published.subscribe();

        tokio::spawn(self.run(rx, events));

        RegistryHandle {
            commands,
            snapshots,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<RegistryCommand>,
        mut events: StreamEventReceiver,
    ) {
        tracing::debug!("Transfer registry running");

        loop {
            tokio::select! {
                biased;

                command = commands.recv() => {
                    let Some(command) = command else { break };
                    if !self.handle_command(command) {
                        break;
                    }
                }
                Some(event) = events.recv() => {
                    self.handle_event(event);
                }
            }
        }

        self.shutdown();
        tracing::debug!("Transfer registry stopped");
    }

    /// Returns false once the registry should stop
    fn handle_command(&mut self, command: RegistryCommand) -> bool {
        match command {
            RegistryCommand::Create { new, reply } => {
                let _ = reply.send(self.create(new));
            }
            RegistryCommand::Update { update, reply } => {
                let _ = reply.send(self.update(&update));
            }
            RegistryCommand::Remove { transfer_id, reply } => {
                let _ = reply.send(self.remove(&transfer_id));
            }
            RegistryCommand::Shutdown { reply } => {
                self.shutdown();
                let _ = reply.send(());
                return false;
            }
        }
        true
    }
}

// =============================================================================
// Handle
// =============================================================================

pub enum RegistryCommand {
    Create {
        new: NewTransfer,
        reply: oneshot::Sender<Result<()>>,
    },
    Update {
        update: TransferUpdate,
        reply: oneshot::Sender<Option<Transfer>>,
    },
    Remove {
        transfer_id: String,
        reply: oneshot::Sender<bool>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable front end of a running registry
#[derive(Clone)]
pub struct RegistryHandle {
    commands: mpsc::Sender<RegistryCommand>,
    snapshots: watch::Receiver<Arc<[Transfer]>>,
}

impl RegistryHandle {
    pub async fn create(&self, new: NewTransfer) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(RegistryCommand::Create { new, reply }).await?;
        rx.await.map_err(|_| TransferError::RegistryClosed)?
    }

    pub async fn update(&self, update: TransferUpdate) -> Result<Option<Transfer>> {
        let (reply, rx) = oneshot::channel();
        self.send(RegistryCommand::Update { update, reply }).await?;
        rx.await.map_err(|_| TransferError::RegistryClosed)
    }

    pub async fn remove(&self, transfer_id: impl Into<String>) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(RegistryCommand::Remove {
            transfer_id: transfer_id.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| TransferError::RegistryClosed)
    }

    /// Stop the registry task and close every stream
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(RegistryCommand::Shutdown { reply }).await?;
        rx.await.map_err(|_| TransferError::RegistryClosed)
    }

    /// Latest committed collection
    pub fn snapshot(&self) -> Arc<[Transfer]> {
        self.snapshots.borrow().clone()
    }

    pub fn get(&self, transfer_id: &str) -> Option<Transfer> {
        get(&self.snapshot(), transfer_id).cloned()
    }

    /// Receiver notified on every commit
    pub fn subscribe(&self) -> watch::Receiver<Arc<[Transfer]>> {
        self.snapshots.clone()
    }

    /// Wait until no tracked transfer is pending
    pub async fn wait_idle(&self) -> Result<()> {
        let mut snapshots = self.subscribe();
        loop {
            if !snapshots.borrow_and_update().iter().any(|t| t.pending) {
                return Ok(());
            }
            snapshots
                .changed()
                .await
                .map_err(|_| TransferError::RegistryClosed)?;
        }
    }

    async fn send(&self, command: RegistryCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| TransferError::RegistryClosed)
    }
}
