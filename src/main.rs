use anyhow::{Context, Result};
use clap::Parser;
use rc_transfers::bootstrap::rehydrate;
use rc_transfers::cli::{Cli, Commands};
use rc_transfers::config::Config;
use rc_transfers::console::{format_transfer_line, print_error, print_transfer, TerminalIndicator};
use rc_transfers::i18n::{Catalog, Translate, Untranslated};
use rc_transfers::indicator::{IndicatorAggregator, IndicatorSignal, NoopSignal};
use rc_transfers::remote::{parse_item, start_tracked, HttpTransferApi, StartTransfer, TransferApi};
use rc_transfers::store::{FjallStore, PersistenceBridge};
use rc_transfers::streaming::HttpEventSource;
use rc_transfers::transfer::{AgentRef, Registry, RegistryHandle, Transfer};
use std::collections::HashMap;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level())),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if let Err(err) = run(cli).await {
        print_error(&format!("{:#}", err));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref()).context("Failed to load config")?;
    if let Some(server) = cli.server {
        config.server_url = server;
    }

    match cli.command {
        Commands::Start {
            agent_id,
            host,
            port,
            action,
            overwrite,
            keep,
            compress,
            watch,
            items,
        } => {
            let items = items
                .iter()
                .map(String::as_str)
                .map(parse_item)
                .collect::<rc_transfers::Result<Vec<_>>>()?;
            let request = StartTransfer {
                agent: AgentRef {
                    id: agent_id,
                    host,
                    port,
                },
                action,
                items,
                overwrite,
                keep,
                compress,
            };

            let indicator = watch.then(|| Arc::new(TerminalIndicator::new()));
            let signal = match &indicator {
                Some(indicator) => indicator.clone() as Arc<dyn IndicatorSignal>,
                None => Arc::new(NoopSignal) as Arc<dyn IndicatorSignal>,
            };
            let registry = spawn_registry(&config, open_bridge(&config)?, signal)?;

            let api = HttpTransferApi::new(config.server_url.clone());
            let transfer_id = start_tracked(&api, &registry, request)
                .await
                .context("Failed to start transfer")?;
            println!("{}", transfer_id);

            if let Some(indicator) = &indicator {
                follow(&registry, indicator, false).await?;
            }
            registry.shutdown().await?;
        }

        Commands::Watch { clear_finished } => {
            let bridge = open_bridge(&config)?;
            let indicator = Arc::new(TerminalIndicator::new());
            let registry = spawn_registry(&config, bridge.clone(), indicator.clone())?;
            rehydrate(&registry, &bridge).await?;

            follow(&registry, &indicator, clear_finished).await?;
            registry.shutdown().await?;
        }

        Commands::Cancel {
            agent_id,
            transfer_id,
        } => {
            let api = HttpTransferApi::new(config.server_url.clone());
            api.cancel(agent_id, &transfer_id)
                .await
                .with_context(|| format!("Failed to cancel {}", transfer_id))?;
            println!("Cancel requested for {}", transfer_id);
        }

        Commands::List { json } => {
            let snapshots = open_bridge(&config)?.load_all()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshots)?);
            } else if snapshots.is_empty() {
                println!("No tracked transfers");
            } else {
                for snapshot in snapshots {
                    print_transfer(&Transfer::from_new(snapshot.into_new_transfer()));
                }
            }
        }

        Commands::Remove { transfer_id } => {
            // Not running: there is no live stream to release, only storage
            let bridge = open_bridge(&config)?;
            if bridge.load(&transfer_id)?.is_none() {
                anyhow::bail!("Transfer {} is not tracked", transfer_id);
            }
            bridge.remove(&transfer_id)?;
            println!("Removed {}", transfer_id);
        }
    }

    Ok(())
}

fn open_bridge(config: &Config) -> Result<PersistenceBridge> {
    let state_dir = config.state_dir();
    let store = FjallStore::open(&state_dir)
        .with_context(|| format!("Failed to open transfer store at {}", state_dir.display()))?;
    Ok(PersistenceBridge::new(Arc::new(store)))
}

fn spawn_registry(
    config: &Config,
    bridge: PersistenceBridge,
    signal: Arc<dyn IndicatorSignal>,
) -> Result<RegistryHandle> {
    let translator: Arc<dyn Translate> = match &config.catalog {
        Some(path) => Arc::new(
            Catalog::load(path)
                .with_context(|| format!("Failed to load catalog {}", path.display()))?,
        ),
        None => Arc::new(Untranslated),
    };

    let (registry, events) = Registry::new(
        bridge,
        Arc::new(HttpEventSource::new(config.server_url.clone())),
        IndicatorAggregator::spawn(signal, config.settle_delay()),
        translator,
    );
    Ok(registry.spawn(events))
}

/// Print every record change until nothing is pending or Ctrl-C
async fn follow(
    registry: &RegistryHandle,
    indicator: &TerminalIndicator,
    clear_finished: bool,
) -> Result<()> {
    let mut updates = registry.subscribe();
    let mut printed: HashMap<String, String> = HashMap::new();

    loop {
        let snapshot = updates.borrow_and_update().clone();

        for transfer in snapshot.iter() {
            let line = format_transfer_line(transfer);
            if printed.get(&transfer.transfer_id) != Some(&line) {
                indicator.println(&line);
                printed.insert(transfer.transfer_id.clone(), line);
            }
        }

        if clear_finished {
            for transfer in snapshot.iter().filter(|t| !t.pending) {
                registry.remove(transfer.transfer_id.clone()).await?;
            }
        }

        if !snapshot.iter().any(|t| t.pending) {
            break;
        }

        tokio::select! {
            changed = updates.changed() => {
                changed.context("Transfer registry stopped")?;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, transfers keep running remotely");
                break;
            }
        }
    }

    indicator.finish();
    Ok(())
}
