//! Suppression of duplicate injection triggers.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// What asked for an injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerSource {
    /// Explicit request from the editor
    Editor,
    /// File watcher noticed a save
    Watcher,
}

impl TriggerSource {
    pub fn opposite(self) -> Self {
        match self {
            TriggerSource::Editor => TriggerSource::Watcher,
            TriggerSource::Watcher => TriggerSource::Editor,
        }
    }
}

/// Last trigger time per file and source.
///
/// Saving from the editor also fires the file watcher. A trigger is
/// dropped when the other source fired for the same file within the
/// window; otherwise it is recorded under its own source.
#[derive(Debug)]
pub struct LockoutTable {
    window: Duration,
    last: HashMap<(String, TriggerSource), Instant>,
}

impl LockoutTable {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last: HashMap::new(),
        }
    }

    /// True if this trigger should be suppressed.
    pub fn check(&mut self, file: &str, source: TriggerSource) -> bool {
        self.check_at(file, source, Instant::now())
    }

    pub fn check_at(&mut self, file: &str, source: TriggerSource, now: Instant) -> bool {
        let window = self.window;
        self.last
            .retain(|_, then| now.saturating_duration_since(*then) < window);

        let opposite = (file.to_string(), source.opposite());
        if let Some(&then) = self.last.get(&opposite) {
            if now.saturating_duration_since(then) < self.window {
                return true;
            }
        }
        self.last.insert((file.to_string(), source), now);
        false
    }

    /// Note a write made by the service itself so the watcher echo of it
    /// is ignored.
    pub fn record(&mut self, file: &str, source: TriggerSource) {
        self.last.insert((file.to_string(), source), Instant::now());
    }
}
