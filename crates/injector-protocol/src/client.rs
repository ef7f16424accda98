//! Classification of a connecting client by its executable path.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The three kinds of process that can connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClientKind {
    /// macOS app bundle.
    Desktop,
    /// iOS app running in the simulator.
    #[serde(rename = "simulated-mobile")]
    Simulated,
    /// iOS app on a physical device.
    #[serde(rename = "physical-device")]
    Device,
}

impl ClientKind {
    /// Classify by executable path. `None` when nothing matched; callers
    /// fall back to [`ClientKind::Simulated`].
    pub fn recognise(executable_path: &str) -> Option<Self> {
        if executable_path.contains("/Contents/MacOS/") {
            Some(ClientKind::Desktop)
        } else if executable_path.contains("iPhone Simulator")
            || executable_path.contains("CoreSimulator")
        {
            Some(ClientKind::Simulated)
        } else if executable_path.starts_with("/var/mobile/")
            || executable_path.starts_with("/private/var/mobile/")
        {
            Some(ClientKind::Device)
        } else {
            None
        }
    }

    /// Classify, defaulting unrecognised paths to the simulator.
    pub fn classify(executable_path: &str) -> Self {
        Self::recognise(executable_path).unwrap_or(ClientKind::Simulated)
    }

    /// OS family name used for bundle project templates.
    pub fn os_name(&self) -> &'static str {
        match self {
            ClientKind::Desktop => "OSX",
            ClientKind::Simulated | ClientKind::Device => "iOS",
        }
    }

    /// `-sdk` argument for xcodebuild, if any.
    pub fn sdk(&self) -> Option<&'static str> {
        match self {
            ClientKind::Desktop => None,
            ClientKind::Simulated => Some("iphonesimulator"),
            ClientKind::Device => Some("iphoneos"),
        }
    }

    /// Prefix of prebuilt loader bundles shipped for plugins.
    pub fn loader_prefix(&self) -> &'static str {
        match self {
            ClientKind::Desktop => "OSX",
            ClientKind::Simulated => "Sim",
            ClientKind::Device => "Device",
        }
    }

    pub fn is_desktop(&self) -> bool {
        *self == ClientKind::Desktop
    }

    pub fn is_simulator(&self) -> bool {
        *self == ClientKind::Simulated
    }

    pub fn is_device(&self) -> bool {
        *self == ClientKind::Device
    }
}

impl fmt::Display for ClientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientKind::Desktop => write!(f, "desktop"),
            ClientKind::Simulated => write!(f, "simulated-mobile"),
            ClientKind::Device => write!(f, "physical-device"),
        }
    }
}
