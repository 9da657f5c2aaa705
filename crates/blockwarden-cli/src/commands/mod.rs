pub mod cards;
pub mod daemon;
pub mod focus;
pub mod hosts;
pub mod settings;
pub mod unblock;
pub mod windows;

use std::sync::Arc;

use blockwarden_core::{Controller, MemoryAlarms, NoopContexts, SqliteStore};

/// Controller over the on-disk store for one-shot commands.
///
/// Alarm and context hosts are inert here: armed-timer identity lives in
/// persistence and the `run` daemon re-arms everything on startup, so a
/// short-lived invocation only needs to leave the records behind.
pub(crate) fn open_controller() -> Result<Controller, Box<dyn std::error::Error>> {
    let store = Arc::new(SqliteStore::open()?);
    Ok(Controller::new(
        store,
        Arc::new(MemoryAlarms::new()),
        Arc::new(NoopContexts),
    ))
}
