//! Presentation channel.
//!
//! Background contexts never touch the presentation layer directly; they
//! send [`UiEvent`]s through a [`Ui`] handle and a single consumer drains
//! them in order.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

pub use crate::config::Preferences;

/// Status shown by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BundleState {
    Ok,
    Idle,
    Stale,
    Connected,
    Building,
    Injected,
    CompileError,
    LoadingError,
}

/// One message for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Progress {
        message: String,
        detail: Option<String>,
    },
    Error {
        message: String,
        detail: Option<String>,
    },
    Debug(String),
    State(BundleState),
    ActiveProject(String),
}

/// Clonable sender plus shared preference and parameter state.
#[derive(Debug, Clone)]
pub struct Ui {
    sender: Sender<UiEvent>,
    preferences: Arc<RwLock<Preferences>>,
    parameters: Arc<RwLock<Vec<String>>>,
}

impl Ui {
    /// Create a handle and the receiver its events arrive on.
    pub fn channel(preferences: Preferences, parameters: Vec<String>) -> (Self, Receiver<UiEvent>) {
        let (sender, receiver) = mpsc::channel();
        let ui = Self {
            sender,
            preferences: Arc::new(RwLock::new(preferences)),
            parameters: Arc::new(RwLock::new(parameters)),
        };
        (ui, receiver)
    }

    fn send(&self, event: UiEvent) {
        // the consumer going away only loses messages
        let _ = self.sender.send(event);
    }

    pub fn progress(&self, message: impl Into<String>, detail: Option<&str>) {
        self.send(UiEvent::Progress {
            message: message.into(),
            detail: detail.map(str::to_string),
        });
    }

    pub fn error(&self, message: impl Into<String>, detail: Option<&str>) {
        self.send(UiEvent::Error {
            message: message.into(),
            detail: detail.map(str::to_string),
        });
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.send(UiEvent::Debug(message.into()));
    }

    pub fn update_state(&self, state: BundleState) {
        self.send(UiEvent::State(state));
    }

    pub fn active_project(&self, name: impl Into<String>) {
        self.send(UiEvent::ActiveProject(name.into()));
    }

    pub fn preferences(&self) -> Preferences {
        match self.preferences.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn set_preferences(&self, preferences: Preferences) {
        match self.preferences.write() {
            Ok(mut guard) => *guard = preferences,
            Err(poisoned) => *poisoned.into_inner() = preferences,
        }
    }

    /// Current parameter values, in slot order.
    pub fn parameters(&self) -> Vec<String> {
        match self.parameters.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn set_parameter(&self, index: usize, value: impl Into<String>) {
        let mut guard = match self.parameters.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.len() <= index {
            guard.resize(index + 1, String::new());
        }
        guard[index] = value.into();
    }
}

/// Drain events into the log until every [`Ui`] handle is dropped.
pub fn run_console(receiver: Receiver<UiEvent>) {
    for event in receiver {
        match event {
            UiEvent::Progress { message, detail } => match detail {
                Some(detail) => info!(target: "injector::console", detail = %detail, "{}", message),
                None => info!(target: "injector::console", "{}", message),
            },
            UiEvent::Error { message, detail } => match detail {
                Some(detail) => error!(target: "injector::console", "{}\n{}", message, detail),
                None => error!(target: "injector::console", "{}", message),
            },
            UiEvent::Debug(message) => debug!(target: "injector::console", "{}", message),
            UiEvent::State(state) => info!(target: "injector::console", state = ?state, "state changed"),
            UiEvent::ActiveProject(name) => info!(target: "injector::console", project = %name, "active project"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_arrive_in_order() {
        let (ui, rx) = Ui::channel(Preferences::default(), Vec::new());
        ui.progress("Compiling Foo.m", Some("clang ..."));
        ui.update_state(BundleState::Building);
        ui.error("Bundle build failed", None);

        let events: Vec<UiEvent> = rx.try_iter().collect();
        assert_eq!(events.len(), 3);
        assert_eq!(events[1], UiEvent::State(BundleState::Building));
        assert!(matches!(&events[2], UiEvent::Error { message, .. } if message == "Bundle build failed"));
    }

    #[test]
    fn test_preferences_shared_between_clones() {
        let (ui, _rx) = Ui::channel(Preferences::default(), Vec::new());
        let other = ui.clone();
        other.set_preferences(Preferences {
            inject_storyboards: true,
            ..Preferences::default()
        });
        assert!(ui.preferences().inject_storyboards);
    }

    #[test]
    fn test_set_parameter_grows_slots() {
        let (ui, _rx) = Ui::channel(Preferences::default(), vec!["1".to_string()]);
        ui.set_parameter(2, "0.5");
        assert_eq!(ui.parameters(), vec!["1", "", "0.5"]);
    }

    #[test]
    fn test_sending_after_consumer_dropped_is_silent() {
        let (ui, rx) = Ui::channel(Preferences::default(), Vec::new());
        drop(rx);
        ui.progress("nobody listening", None);
    }
}
