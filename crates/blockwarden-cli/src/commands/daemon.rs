//! The long-lived controller process.
//!
//! Reacts to the three event sources the substrate delivers: wake-timer
//! fires, storage change notifications, and (when a context host is wired
//! in) navigation events. One-shot CLI invocations mutate the shared store;
//! this loop picks the changes up at its next wake timer.

use std::sync::Arc;

use chrono::Local;
use tracing_subscriber::EnvFilter;

use blockwarden_core::storage::{ChangeEvent, Partition, SETTINGS_KEY};
use blockwarden_core::{Controller, NoopContexts, SqliteStore, StorageArea, TokioAlarms};

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let store = Arc::new(SqliteStore::open()?);
        let (alarms, mut fired) = TokioAlarms::new();
        let controller = Controller::new(
            store.clone(),
            Arc::new(alarms),
            Arc::new(NoopContexts),
        );

        let (change_tx, mut changes) = tokio::sync::mpsc::unbounded_channel::<ChangeEvent>();
        store.subscribe(Box::new(move |event| {
            let _ = change_tx.send(event.clone());
        }));

        let decision = controller.on_startup(Local::now());
        tracing::info!(
            should_block = decision.should_block,
            next_check_ms = decision.next_check_ms,
            "controller started"
        );

        loop {
            tokio::select! {
                Some(name) = fired.recv() => {
                    tracing::debug!(%name, "alarm fired");
                    controller.on_alarm(&name, Local::now());
                }
                Some(event) = changes.recv() => {
                    if event.partition == Partition::Synced && event.key == SETTINGS_KEY {
                        controller.on_settings_changed(Local::now());
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("shutting down");
                    break;
                }
            }
        }
        Ok(())
    })
}
