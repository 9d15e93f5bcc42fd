//! Global activity indicator.
//!
//! [`classify`] reduces the registry to an [`IndicatorSummary`]; the
//! [`IndicatorAggregator`] turns summaries into calls on an
//! [`IndicatorSignal`] from its own worker task, so a slow signal never
//! holds up the registry.

use crate::transfer::record::Transfer;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Default fixed delay of the settle transition
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Resting glyph once the indicator settles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Glyph {
    Synced,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndicatorSummary {
    pub pending: usize,
    pub errors: usize,
}

impl IndicatorSummary {
    pub fn active(&self) -> bool {
        self.pending > 0
    }

    pub fn glyph(&self) -> Glyph {
        if self.errors > 0 {
            Glyph::Error
        } else {
            Glyph::Synced
        }
    }
}

/// Count pending and failed records
pub fn classify(transfers: &[Transfer]) -> IndicatorSummary {
    transfers
        .iter()
        .fold(IndicatorSummary::default(), |mut summary, transfer| {
            if transfer.pending {
                summary.pending += 1;
            }
            if transfer.error {
                summary.errors += 1;
            }
            summary
        })
}

/// Visual side of the indicator (spinner, tray icon, ...)
#[async_trait]
pub trait IndicatorSignal: Send + Sync {
    async fn set_active(&self, active: bool);

    /// Enter the busy state
    async fn busy(&self);

    /// Leave the busy state
    async fn settle(&self);

    /// Short success flash after a transfer completes
    async fn success(&self);

    async fn set_glyph(&self, glyph: Glyph);
}

/// Signal that shows nothing
pub struct NoopSignal;

#[async_trait]
impl IndicatorSignal for NoopSignal {
    async fn set_active(&self, _active: bool) {}
    async fn busy(&self) {}
    async fn settle(&self) {}
    async fn success(&self) {}
    async fn set_glyph(&self, _glyph: Glyph) {}
}

// =============================================================================
// Aggregator
// =============================================================================

#[derive(Debug)]
enum IndicatorCommand {
    Recompute(IndicatorSummary),
    Flash(IndicatorSummary),
}

/// Handle to the indicator worker. Cheap to clone.
#[derive(Clone)]
pub struct IndicatorAggregator {
    commands: mpsc::UnboundedSender<IndicatorCommand>,
    active: Arc<AtomicBool>,
}

impl IndicatorAggregator {
    /// Spawn the worker driving `signal`
    pub fn spawn(signal: Arc<dyn IndicatorSignal>, settle_delay: Duration) -> Self {
        let (commands, mut rx) = mpsc::unbounded_channel();
        let active = Arc::new(AtomicBool::new(false));

        tokio::spawn(async move {
            let mut last: Option<IndicatorSummary> = None;

            while let Some(command) = rx.recv().await {
                match command {
                    IndicatorCommand::Recompute(summary) => {
                        if last == Some(summary) {
                            continue;
                        }
                        apply(signal.as_ref(), summary, settle_delay).await;
                        last = Some(summary);
                    }
                    IndicatorCommand::Flash(summary) => {
                        signal.success().await;
                        apply(signal.as_ref(), summary, settle_delay).await;
                        last = Some(summary);
                    }
                }
            }

            tracing::debug!("Indicator worker stopped");
        });

        Self { commands, active }
    }

    /// Whether any transfer was pending at the last recompute
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn recompute(&self, transfers: &[Transfer]) -> IndicatorSummary {
        let summary = self.record(transfers);
        self.send(IndicatorCommand::Recompute(summary));
        summary
    }

    /// Success flash, then the same transition as [`recompute`](Self::recompute)
    pub fn settle_after_terminal(&self, transfers: &[Transfer]) -> IndicatorSummary {
        let summary = self.record(transfers);
        self.send(IndicatorCommand::Flash(summary));
        summary
    }

    fn record(&self, transfers: &[Transfer]) -> IndicatorSummary {
        let summary = classify(transfers);
        self.active.store(summary.active(), Ordering::SeqCst);
        summary
    }

    fn send(&self, command: IndicatorCommand) {
        if self.commands.send(command).is_err() {
            tracing::debug!("Indicator worker gone, dropping update");
        }
    }
}

async fn apply(signal: &dyn IndicatorSignal, summary: IndicatorSummary, settle_delay: Duration) {
    signal.set_active(summary.active()).await;
    if summary.active() {
        signal.busy().await;
    } else {
        signal.settle().await;
    }
    tokio::time::sleep(settle_delay).await;
    signal.set_glyph(summary.glyph()).await;
}
