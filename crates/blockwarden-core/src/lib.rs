//! # Blockwarden Core Library
//!
//! Core logic for Blockwarden, a time-boxed access blocker with two
//! enforcement modes (a weekly schedule and a single focus countdown) and a
//! card-draw reprieve mechanism. The CLI binary and any embedding host are
//! thin layers over this crate.
//!
//! ## Architecture
//!
//! - **Window scheduler**: pure functions deciding "blocked now?" and "when
//!   can that change?" from weekly windows
//! - **Controller**: stateless decision/enforcement reactor over persisted
//!   settings, re-armed by named wake timers
//! - **Unblock ledger**: time-limited exemptions with lazy pruning
//! - **Reroll machine**: the card-draw state machine and its pause/resume
//!   coupling with the focus timer
//! - **Substrate**: key-value partitions, named alarms, and browsing-context
//!   control as traits, with in-memory and SQLite implementations
//!
//! ## Key Components
//!
//! - [`Controller`]: blocking decision and enforcement
//! - [`RerollMachine`]: card rounds and countdown coupling
//! - [`UnblockLedger`]: temporary exemptions
//! - [`Countdown`]: the shared pausable-countdown primitive

pub mod alarms;
pub mod contexts;
pub mod controller;
pub mod countdown;
pub mod domain;
pub mod error;
pub mod ledger;
pub mod messages;
pub mod reroll;
pub mod schedule;
pub mod settings;
pub mod storage;

pub use alarms::{AlarmService, MemoryAlarms, TokioAlarms};
pub use contexts::{ContextHost, FakeContexts, NoopContexts, OpenContext};
pub use controller::{decide, Controller, Decision};
pub use countdown::{now_ms, Countdown};
pub use error::{CoreError, Result, StorageError};
pub use ledger::{TemporaryUnblock, UnblockLedger};
pub use messages::{Request, Response};
pub use reroll::{CardOption, Phase, RerollMachine, RerollState};
pub use schedule::{is_within_any_window, next_boundary_after, BlockWindow};
pub use settings::{Mode, Settings, SettingsStore};
pub use storage::{MemoryStore, Partition, SqliteStore, StorageArea};
