#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use futures::StreamExt;
    use rc_transfers::bootstrap::rehydrate;
    use rc_transfers::i18n::Untranslated;
    use rc_transfers::indicator::{Glyph, IndicatorAggregator, IndicatorSignal};
    use rc_transfers::store::{FjallStore, KvStore, PersistenceBridge, INDEX_KEY};
    use rc_transfers::streaming::{EventSource, PayloadStream};
    use rc_transfers::transfer::{
        Action, AgentRef, NewTransfer, PhaseIcon, Registry, RegistryHandle, TransferItem,
    };
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    /// Event source whose streams are fed by the test
    #[derive(Default)]
    struct ScriptedSource {
        feeds: Mutex<HashMap<String, mpsc::UnboundedSender<rc_transfers::Result<String>>>>,
        subscriptions: Mutex<Vec<String>>,
    }

    impl ScriptedSource {
        fn push(&self, transfer_id: &str, payload: &str) {
            let feeds = self.feeds.lock().unwrap();
            feeds
                .get(transfer_id)
                .unwrap()
                .send(Ok(payload.to_string()))
                .unwrap();
        }

        fn subscriptions_for(&self, transfer_id: &str) -> usize {
            self.subscriptions
                .lock()
                .unwrap()
                .iter()
                .filter(|id| id.as_str() == transfer_id)
                .count()
        }

        async fn wait_subscribed(&self, transfer_id: &str, count: usize) {
            for _ in 0..400 {
                if self.subscriptions_for(transfer_id) >= count {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            panic!("{} never subscribed", transfer_id);
        }
    }

    #[async_trait]
    impl EventSource for ScriptedSource {
        async fn subscribe(
            &self,
            _agent_id: u64,
            transfer_id: &str,
        ) -> rc_transfers::Result<PayloadStream> {
            let (tx, rx) = mpsc::unbounded_channel();
            self.feeds
                .lock()
                .unwrap()
                .insert(transfer_id.to_string(), tx);
            self.subscriptions
                .lock()
                .unwrap()
                .push(transfer_id.to_string());

            Ok(futures::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            })
            .boxed())
        }
    }

    #[derive(Default)]
    struct GlyphRecorder {
        glyphs: Mutex<Vec<Glyph>>,
        flashes: Mutex<usize>,
    }

    #[async_trait]
    impl IndicatorSignal for GlyphRecorder {
        async fn set_active(&self, _active: bool) {}
        async fn busy(&self) {}
        async fn settle(&self) {}
        async fn success(&self) {
            *self.flashes.lock().unwrap() += 1;
        }
        async fn set_glyph(&self, glyph: Glyph) {
            self.glyphs.lock().unwrap().push(glyph);
        }
    }

    fn spawn(
        store: Arc<FjallStore>,
        source: Arc<ScriptedSource>,
        signal: Arc<GlyphRecorder>,
    ) -> RegistryHandle {
        let (registry, events) = Registry::new(
            PersistenceBridge::new(store),
            source,
            IndicatorAggregator::spawn(signal, Duration::from_millis(1)),
            Arc::new(Untranslated),
        );
        registry.spawn(events)
    }

    fn new_transfer(id: &str) -> NewTransfer {
        NewTransfer::new(
            id,
            Action::Copy,
            AgentRef {
                id: 5,
                host: "storage.lan".to_string(),
                port: 8080,
            },
            vec![TransferItem {
                from: "/files/projects/".to_string(),
                to: "/backup/projects".to_string(),
                name: "projects".to_string(),
                is_dir: true,
            }],
        )
    }

    async fn wait_glyph(signal: &GlyphRecorder, glyph: Glyph) {
        for _ in 0..400 {
            if signal.glyphs.lock().unwrap().last() == Some(&glyph) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("indicator never settled on {:?}", glyph);
    }

    #[tokio::test]
    async fn test_transfers_run_to_completion_and_failure() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let store = Arc::new(FjallStore::open(&temp.path().join("state"))?);
        let source = Arc::new(ScriptedSource::default());
        let signal = Arc::new(GlyphRecorder::default());
        let registry = spawn(store.clone(), source.clone(), signal.clone());

        registry.create(new_transfer("t-ok")).await?;
        registry.create(new_transfer("t-bad")).await?;
        source.wait_subscribed("t-ok", 1).await;
        source.wait_subscribed("t-bad", 1).await;

        for payload in [
            "archiving",
            "progress::archived::1/2/3",
            "starting upload",
            "progress::stats::500000/3000000",
            "extracting",
        ] {
            source.push("t-ok", payload);
        }
        source.push("t-bad", "uploading");
        source.push("t-bad", "disk_full");

        // the failure ends t-bad while t-ok is still extracting
        let mut updates = registry.subscribe();
        loop {
            {
                let snapshot = updates.borrow_and_update();
                let ok = snapshot.iter().find(|t| t.transfer_id == "t-ok").unwrap();
                let bad = snapshot.iter().find(|t| t.transfer_id == "t-bad").unwrap();
                if ok.status == "extracting" && bad.error {
                    break;
                }
            }
            updates.changed().await?;
        }

        let extracting = registry.get("t-ok").unwrap();
        assert!(extracting.pending);
        assert!(!extracting.cancelable);
        assert_eq!(extracting.icon, Some(PhaseIcon::MoveIcon));
        assert_eq!(extracting.progress, Some(16));
        assert_eq!(
            extracting.stats.total.as_ref().map(|t| t.to_string()),
            Some("2.86 MB".to_string())
        );

        source.push("t-ok", "complete");
        tokio::time::timeout(Duration::from_secs(5), registry.wait_idle()).await??;

        let done = registry.get("t-ok").unwrap();
        assert_eq!(done.icon, Some(PhaseIcon::DoneIcon));
        assert!(done.stream.is_none());
        assert!(!done.error);

        let failed = registry.get("t-bad").unwrap();
        assert!(failed.error);
        assert!(!failed.pending);
        assert_eq!(failed.status, "disk_full");
        assert_eq!(failed.icon, Some(PhaseIcon::ErrorIcon));

        wait_glyph(&signal, Glyph::Error).await;
        assert_eq!(*signal.flashes.lock().unwrap(), 1);

        // both records made it to disk in their final state
        let bridge = PersistenceBridge::new(store.clone());
        assert_eq!(bridge.load_index()?, vec!["t-ok", "t-bad"]);
        assert_eq!(bridge.load("t-ok")?.unwrap().status, "complete");
        assert!(bridge.load("t-bad")?.unwrap().error);

        registry.shutdown().await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_signal_cancels_transfer() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let store = Arc::new(FjallStore::open(&temp.path().join("state"))?);
        let source = Arc::new(ScriptedSource::default());
        let signal = Arc::new(GlyphRecorder::default());
        let registry = spawn(store, source.clone(), signal.clone());

        registry.create(new_transfer("t-1")).await?;
        source.wait_subscribed("t-1", 1).await;

        source.push("t-1", "uploading");
        source.push("t-1", "signal::interrupt::Canceled by user");
        tokio::time::timeout(Duration::from_secs(5), registry.wait_idle()).await??;

        let canceled = registry.get("t-1").unwrap();
        assert!(canceled.canceled);
        assert!(!canceled.uploading);
        assert_eq!(canceled.status, "Canceled by user");
        assert_eq!(canceled.icon, Some(PhaseIcon::CancelIcon));
        assert!(canceled.stream.is_none());

        wait_glyph(&signal, Glyph::Synced).await;

        registry.shutdown().await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_remove_clears_storage() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let store = Arc::new(FjallStore::open(&temp.path().join("state"))?);
        let source = Arc::new(ScriptedSource::default());
        let registry = spawn(store.clone(), source.clone(), Arc::default());

        registry.create(new_transfer("t-1")).await?;
        registry.create(new_transfer("t-2")).await?;

        assert!(registry.remove("t-1").await?);
        assert!(!registry.remove("t-1").await?);

        assert!(registry.get("t-1").is_none());
        assert_eq!(store.get("transfer-t-1")?, None);
        assert_eq!(store.get(INDEX_KEY)?.as_deref(), Some(r#"["t-2"]"#));

        registry.shutdown().await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_rehydrate_restores_records_and_reopens_pending_streams() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let store = Arc::new(FjallStore::open(&temp.path().join("state"))?);
        let source = Arc::new(ScriptedSource::default());

        let first = spawn(store.clone(), source.clone(), Arc::default());
        first.create(new_transfer("t-done")).await?;
        first.create(new_transfer("t-running")).await?;
        source.wait_subscribed("t-done", 1).await;
        source.wait_subscribed("t-running", 1).await;

        source.push("t-done", "complete");
        source.push("t-running", "progress::compressed::4/-/9");

        let mut updates = first.subscribe();
        loop {
            {
                let snapshot = updates.borrow_and_update();
                let done = snapshot.iter().any(|t| t.transfer_id == "t-done" && !t.pending);
                let running = snapshot
                    .iter()
                    .any(|t| t.transfer_id == "t-running" && t.status == "compressing");
                if done && running {
                    break;
                }
            }
            updates.changed().await?;
        }
        first.shutdown().await?;

        // a fresh process over the same store
        let second = spawn(store.clone(), source.clone(), Arc::default());
        let bridge = PersistenceBridge::new(store.clone());
        let outcome = rehydrate(&second, &bridge).await?;
        assert_eq!(outcome.restored, 2);
        assert_eq!(outcome.skipped, 0);

        let done = second.get("t-done").unwrap();
        assert!(!done.pending);
        assert!(done.stream.is_none());
        assert_eq!(done.icon, Some(PhaseIcon::DoneIcon));

        let running = second.get("t-running").unwrap();
        assert!(running.pending);
        assert!(running.stream.is_some());
        assert_eq!(running.stats.archived, Some([4, 0, 9]));

        source.wait_subscribed("t-running", 2).await;
        assert_eq!(source.subscriptions_for("t-done"), 1);

        // the new stream drives the restored record
        source.push("t-running", "complete");
        tokio::time::timeout(Duration::from_secs(5), second.wait_idle()).await??;
        assert_eq!(second.get("t-running").unwrap().status, "complete");

        // rehydrating again only finds live ids
        let again = rehydrate(&second, &bridge).await?;
        assert_eq!(again.restored, 0);
        assert_eq!(again.skipped, 2);

        second.shutdown().await?;
        Ok(())
    }
}
