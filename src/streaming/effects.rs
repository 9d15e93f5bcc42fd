//! Mapping from decoded protocol messages to record updates.
//!
//! | message (data)         | icon          | pending | cancelable | uploading | stats            |
//! |------------------------|---------------|---------|------------|-----------|------------------|
//! | archiving, compressing | archive-icon  | true    | false      |           |                  |
//! | starting upload        | upload-icon   | true    | true       | true      |                  |
//! | uploading              | upload-icon   | true    | true       | true      |                  |
//! | extracting             | move-icon     | true    | false      |           |                  |
//! | complete               | done-icon     | false   | true       |           |                  |
//! | progress (stats)       | upload-icon   | true    | true       | true      | byte stats       |
//! | progress (archived)    | archive-icon  | true    | false      |           | archive counters |
//! | progress (compressed)  | archive-icon  | true    | false      |           | archive counters |
//! | signal                 | cancel-icon   | false   | true       | false     |                  |
//! | anything else          | error-icon    | false   | unchanged  | false     |                  |

use crate::i18n::{localize, Translate};
use crate::streaming::protocol::{MessageKind, ParsedMessage, ProgressKind};
use crate::streaming::stats::{format_archive_stats, parse_byte_stats};
use crate::transfer::record::{PhaseIcon, TransferStats, TransferUpdate};

/// The record update a message calls for
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEffect {
    pub update: TransferUpdate,

    /// Set for unrecognized messages: the update is the transfer's failure
    /// and is committed without the success flash.
    pub failed: bool,
}

impl MessageEffect {
    pub fn is_terminal(&self) -> bool {
        self.update.is_terminal()
    }
}

/// Compute the update for one message addressed to `transfer_id`.
pub fn effect_for(
    transfer_id: &str,
    parsed: &ParsedMessage,
    translator: &dyn Translate,
) -> MessageEffect {
    let mut update = TransferUpdate::new(transfer_id);
    let mut label = parsed.message.clone();

    match parsed.kind() {
        MessageKind::Archiving | MessageKind::Compressing => {
            update.icon = Some(PhaseIcon::ArchiveIcon);
            update.pending = Some(true);
            update.cancelable = Some(false);
        }
        MessageKind::StartingUpload | MessageKind::Uploading => {
            update.icon = Some(PhaseIcon::UploadIcon);
            update.pending = Some(true);
            update.cancelable = Some(true);
            update.uploading = Some(true);
        }
        MessageKind::Extracting => {
            update.icon = Some(PhaseIcon::MoveIcon);
            update.pending = Some(true);
            update.cancelable = Some(false);
        }
        MessageKind::Complete => {
            update.icon = Some(PhaseIcon::DoneIcon);
            update.pending = Some(false);
            update.cancelable = Some(true);
        }
        MessageKind::Progress => {
            let extra = parsed.extra.as_deref().unwrap_or_default();
            match parsed.progress_kind() {
                ProgressKind::Stats => {
                    label = "uploading".to_string();
                    update.icon = Some(PhaseIcon::UploadIcon);
                    update.pending = Some(true);
                    update.cancelable = Some(true);
                    update.uploading = Some(true);
                    if let Some(stats) = parse_byte_stats(extra) {
                        update.progress = Some(stats.percent);
                        update.stats = Some(TransferStats::from(stats));
                    }
                }
                kind @ (ProgressKind::Archived | ProgressKind::Compressed) => {
                    label = match kind {
                        ProgressKind::Compressed => "compressing",
                        _ => "archiving",
                    }
                    .to_string();
                    update.icon = Some(PhaseIcon::ArchiveIcon);
                    update.pending = Some(true);
                    update.cancelable = Some(false);
                    update.stats = format_archive_stats(extra).map(TransferStats::from);
                }
                ProgressKind::Other => {
                    label = "uploading".to_string();
                    update.icon = Some(PhaseIcon::UploadIcon);
                    update.pending = Some(true);
                    update.cancelable = Some(true);
                    update.uploading = Some(true);
                }
            }
        }
        MessageKind::Signal => {
            // the server's own wording, shown untranslated
            update.status = Some(
                parsed
                    .extra
                    .clone()
                    .or_else(|| parsed.data.clone())
                    .unwrap_or_else(|| parsed.message.clone()),
            );
            update.icon = Some(PhaseIcon::CancelIcon);
            update.pending = Some(false);
            update.cancelable = Some(true);
            update.uploading = Some(false);
            update.canceled = Some(true);
            return MessageEffect {
                update,
                failed: false,
            };
        }
        MessageKind::Unrecognized => {
            update.icon = Some(PhaseIcon::ErrorIcon);
            update.pending = Some(false);
            update.uploading = Some(false);
            update.error = Some(true);
            update.status = Some(localize(translator, &label));
            return MessageEffect {
                update,
                failed: true,
            };
        }
    }

    update.status = Some(localize(translator, &label));
    MessageEffect {
        update,
        failed: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::{Catalog, Untranslated};
    use crate::streaming::protocol::parse;

    fn effect(payload: &str) -> MessageEffect {
        effect_for("t-1", &parse(payload), &Untranslated)
    }

    #[test]
    fn test_archiving_is_not_cancelable() {
        for payload in ["archiving", "compressing"] {
            let effect = effect(payload);
            assert!(!effect.failed);
            assert_eq!(effect.update.icon, Some(PhaseIcon::ArchiveIcon));
            assert_eq!(effect.update.pending, Some(true));
            assert_eq!(effect.update.cancelable, Some(false));
            assert_eq!(effect.update.uploading, None);
            assert_eq!(effect.update.status.as_deref(), Some(payload));
        }
    }

    #[test]
    fn test_upload_phases() {
        for payload in ["starting upload", "uploading"] {
            let update = effect(payload).update;
            assert_eq!(update.icon, Some(PhaseIcon::UploadIcon));
            assert_eq!(update.pending, Some(true));
            assert_eq!(update.cancelable, Some(true));
            assert_eq!(update.uploading, Some(true));
            assert_eq!(update.stats, None);
        }
    }

    #[test]
    fn test_extracting() {
        let update = effect("extracting").update;
        assert_eq!(update.icon, Some(PhaseIcon::MoveIcon));
        assert_eq!(update.pending, Some(true));
        assert_eq!(update.cancelable, Some(false));
    }

    #[test]
    fn test_complete_is_terminal() {
        let effect = effect("complete");
        assert!(effect.is_terminal());
        assert!(!effect.failed);
        assert_eq!(effect.update.icon, Some(PhaseIcon::DoneIcon));
        assert_eq!(effect.update.cancelable, Some(true));
        assert_eq!(effect.update.error, None);
    }

    #[test]
    fn test_progress_stats() {
        let update = effect("progress::stats::500000/3000000").update;
        assert_eq!(update.status.as_deref(), Some("uploading"));
        assert_eq!(update.icon, Some(PhaseIcon::UploadIcon));
        assert_eq!(update.uploading, Some(true));
        assert_eq!(update.progress, Some(16));

        let stats = update.stats.unwrap();
        assert_eq!(stats.progress.unwrap().to_string(), "488.28 KB");
        assert_eq!(stats.total.unwrap().to_string(), "2.86 MB");
        assert!(stats.archived.is_none());
    }

    #[test]
    fn test_progress_stats_malformed_skips_stats_only() {
        let update = effect("progress::stats::garbage").update;
        assert_eq!(update.stats, None);
        assert_eq!(update.progress, None);
        assert_eq!(update.status.as_deref(), Some("uploading"));
        assert_eq!(update.pending, Some(true));
    }

    #[test]
    fn test_progress_archived() {
        let update = effect("progress::archived::3/10/42").update;
        assert_eq!(update.status.as_deref(), Some("archiving"));
        assert_eq!(update.icon, Some(PhaseIcon::ArchiveIcon));
        assert_eq!(update.cancelable, Some(false));
        assert_eq!(update.stats.unwrap().archived, Some([3, 10, 42]));
    }

    #[test]
    fn test_progress_compressed_relabels() {
        let update = effect("progress::compressed::-/5/-").update;
        assert_eq!(update.status.as_deref(), Some("compressing"));
        assert_eq!(update.stats.unwrap().archived, Some([0, 5, 0]));
    }

    #[test]
    fn test_signal_cancels() {
        let effect = effect("signal::interrupt::Transfer canceled");
        assert!(effect.is_terminal());
        assert!(!effect.failed);
        let update = effect.update;
        assert_eq!(update.status.as_deref(), Some("Transfer canceled"));
        assert_eq!(update.icon, Some(PhaseIcon::CancelIcon));
        assert_eq!(update.canceled, Some(true));
        assert_eq!(update.uploading, Some(false));
        assert_eq!(update.cancelable, Some(true));
    }

    #[test]
    fn test_signal_without_extra_uses_data() {
        let update = effect("signal::interrupt").update;
        assert_eq!(update.status.as_deref(), Some("interrupt"));
    }

    #[test]
    fn test_unrecognized_message_fails_transfer() {
        let effect = effect("disk_full");
        assert!(effect.failed);
        assert!(effect.is_terminal());
        let update = effect.update;
        assert_eq!(update.error, Some(true));
        assert_eq!(update.pending, Some(false));
        assert_eq!(update.uploading, Some(false));
        assert_eq!(update.cancelable, None);
        assert_eq!(update.icon, Some(PhaseIcon::ErrorIcon));
        assert_eq!(update.status.as_deref(), Some("disk_full"));
    }

    #[test]
    fn test_status_is_localized() {
        let catalog =
            Catalog::from_json_str(r#"{"disk_full": "Disk is full", "extracting": "Unpacking"}"#)
                .unwrap();
        let failed = effect_for("t-1", &parse("disk_full"), &catalog);
        assert_eq!(failed.update.status.as_deref(), Some("Disk is full"));

        let phase = effect_for("t-1", &parse("extracting"), &catalog);
        assert_eq!(phase.update.status.as_deref(), Some("Unpacking"));
    }

    #[test]
    fn test_signal_label_is_not_localized() {
        let catalog =
            Catalog::from_json_str(r#"{"Canceled by user": "Vom Benutzer abgebrochen"}"#).unwrap();
        let canceled = effect_for("t-1", &parse("signal::interrupt::Canceled by user"), &catalog);
        assert_eq!(canceled.update.status.as_deref(), Some("Canceled by user"));
    }

    #[test]
    fn test_structural_fields_never_set() {
        for payload in [
            "archiving",
            "complete",
            "progress::stats::1/2",
            "signal::x::y",
            "boom",
        ] {
            let update = effect(payload).update;
            assert_eq!(update.transfer_id, "t-1");
            assert!(update.agent.is_none());
            assert!(update.items.is_none());
            assert!(update.show_details.is_none());
        }
    }
}
