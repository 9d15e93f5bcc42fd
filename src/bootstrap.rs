//! Registry rehydration from durable storage.

use crate::error::{Result, TransferError};
use crate::store::PersistenceBridge;
use crate::transfer::registry::RegistryHandle;

/// Outcome of a rehydration pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Rehydrated {
    pub restored: usize,
    pub skipped: usize,
}

/// Recreate every persisted transfer in `registry`.
///
/// Records go through `create`, so those still pending get a fresh event
/// stream. Ids the registry already tracks are skipped.
pub async fn rehydrate(registry: &RegistryHandle, bridge: &PersistenceBridge) -> Result<Rehydrated> {
    let mut outcome = Rehydrated::default();

    for snapshot in bridge.load_all()? {
        let transfer_id = snapshot.transfer_id.clone();
        match registry.create(snapshot.into_new_transfer()).await {
            Ok(()) => outcome.restored += 1,
            Err(TransferError::Duplicate(_)) => {
                tracing::debug!(transfer_id = %transfer_id, "Transfer already live, not restored");
                outcome.skipped += 1;
            }
            Err(err) => return Err(err),
        }
    }

    tracing::info!(
        restored = outcome.restored,
        skipped = outcome.skipped,
        "Rehydrated transfers"
    );
    Ok(outcome)
}
