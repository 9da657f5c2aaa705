//! The singleton settings record.
//!
//! Lives in the synced partition under [`SETTINGS_KEY`]. Every field carries
//! a serde default so a record written by an older revision, or damaged in
//! place, deserializes into something usable instead of poisoning the
//! controller.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::countdown::Countdown;
use crate::error::Result;
use crate::schedule::BlockWindow;
use crate::storage::{read_or_default, write_json, Partition, StorageArea, SETTINGS_KEY};

/// Which enforcement regime is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Scheduled,
    #[default]
    Focus,
}

/// User-configured enforcement settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Global toggle; nothing is enforced while false.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Hostnames to enforce against, e.g. "twitter.com".
    #[serde(default = "default_blocked_hosts")]
    pub blocked_hosts: Vec<String>,
    /// Weekly windows used in scheduled mode.
    #[serde(default = "default_windows")]
    pub windows: Vec<BlockWindow>,
    /// Per-host menus of unblock durations (minutes) the card draw picks from.
    #[serde(default = "default_domain_durations")]
    pub domain_durations: BTreeMap<String, Vec<u32>>,
    #[serde(default)]
    pub mode: Mode,
    /// Duration a freshly started focus session runs for.
    #[serde(default = "default_focus_hours")]
    pub focus_hours: f64,
    /// The focus countdown itself (running / paused / inactive).
    #[serde(default)]
    pub focus_timer: Countdown,
}

fn default_enabled() -> bool {
    true
}

fn default_focus_hours() -> f64 {
    2.0
}

fn default_blocked_hosts() -> Vec<String> {
    [
        "tiktok.com",
        "netflix.com",
        "facebook.com",
        "instagram.com",
        "youtube.com",
        "twitter.com",
        "primevideo.com",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_windows() -> Vec<BlockWindow> {
    // Mon-Fri working hours.
    (1..=5)
        .map(|day| BlockWindow {
            day,
            start: "09:00".to_string(),
            end: "17:00".to_string(),
        })
        .collect()
}

fn default_domain_durations() -> BTreeMap<String, Vec<u32>> {
    default_blocked_hosts()
        .into_iter()
        .map(|host| (host, vec![10, 15, 20, 25, 30]))
        .collect()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            blocked_hosts: default_blocked_hosts(),
            windows: default_windows(),
            domain_durations: default_domain_durations(),
            mode: Mode::default(),
            focus_hours: default_focus_hours(),
            focus_timer: Countdown::Inactive,
        }
    }
}

/// Handle over the synced partition for loading and mutating [`Settings`].
#[derive(Clone)]
pub struct SettingsStore {
    store: Arc<dyn StorageArea>,
}

impl SettingsStore {
    pub fn new(store: Arc<dyn StorageArea>) -> Self {
        Self { store }
    }

    /// Load settings; absent or unreadable records yield defaults.
    pub fn load(&self) -> Settings {
        read_or_default(self.store.as_ref(), Partition::Synced, SETTINGS_KEY)
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        write_json(self.store.as_ref(), Partition::Synced, SETTINGS_KEY, settings)
    }

    /// Read-modify-write in one step; returns the stored result.
    pub fn update(&self, mutate: impl FnOnce(&mut Settings)) -> Result<Settings> {
        let mut settings = self.load();
        mutate(&mut settings);
        self.save(&settings)?;
        Ok(settings)
    }
}
