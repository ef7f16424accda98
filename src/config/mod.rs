//! Service configuration
//!
//! Three layers, later ones winning:
//! 1. Built-in defaults
//! 2. User config (~/.config/injector/injector.toml or `--config`)
//! 3. CLI flags

pub mod defaults;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use injector_protocol::PARAMETER_COUNT;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// User toggles that shape each injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Inject files reported by the file watcher
    pub file_watch: bool,

    /// Allow storyboard and xib injection
    pub inject_storyboards: bool,

    /// Show a notification in the app after each load
    pub notify: bool,

    /// Bring the app (or Simulator) to the front after each load
    pub order_front: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            file_watch: true,
            inject_storyboards: false,
            notify: true,
            order_front: false,
        }
    }
}

/// Effective configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listening port; also determines the handshake magic
    pub port: u16,

    /// Listening address
    pub bind_address: String,

    /// Xcode installation
    pub xcode_path: PathBuf,

    /// Installed resources (bundle templates, headers, patch templates)
    pub resources_dir: PathBuf,

    /// Object files and dummy sources are written here
    pub scratch_dir: PathBuf,

    /// User name embedded in scratch file names
    pub user: String,

    /// Trigger deduplication window
    pub lockout_seconds: u64,

    /// Wait for a client after loading the on-demand bundle
    pub connect_timeout_seconds: u64,

    /// Keep-alive interval
    pub keepalive_seconds: u64,

    /// Pause after a failed accept
    pub accept_backoff_ms: u64,

    pub preferences: Preferences,

    /// Initial parameter values replayed to each client
    pub parameters: Vec<String>,

    /// Addresses written into patched main files for clients to connect back to
    pub server_addresses: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: defaults::port(),
            bind_address: defaults::BIND_ADDRESS.to_string(),
            xcode_path: PathBuf::from(defaults::XCODE_PATH),
            resources_dir: defaults::resources_dir(),
            scratch_dir: PathBuf::from(defaults::SCRATCH_DIR),
            user: defaults::user(),
            lockout_seconds: defaults::LOCKOUT_SECONDS,
            connect_timeout_seconds: defaults::CONNECT_TIMEOUT_SECONDS,
            keepalive_seconds: defaults::KEEPALIVE_SECONDS,
            accept_backoff_ms: defaults::ACCEPT_BACKOFF_MS,
            preferences: Preferences::default(),
            parameters: Vec::new(),
            server_addresses: Vec::new(),
        }
    }
}

/// Values given on the command line (layer 3).
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub xcode_path: Option<PathBuf>,
    pub resources_dir: Option<PathBuf>,
}

impl Config {
    /// Load from `path`, or from the default location if it exists.
    ///
    /// An explicit path that cannot be read is an error; a missing default
    /// file just means built-in defaults.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default_path = defaults::config_path();
                if default_path.exists() {
                    Self::from_file(&default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply CLI flags on top of file values.
    pub fn apply(&mut self, overrides: &ConfigOverrides) {
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(ref xcode_path) = overrides.xcode_path {
            self.xcode_path = xcode_path.clone();
        }
        if let Some(ref resources_dir) = overrides.resources_dir {
            self.resources_dir = resources_dir.clone();
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        for (name, value) in [
            ("lockout_seconds", self.lockout_seconds),
            ("connect_timeout_seconds", self.connect_timeout_seconds),
            ("keepalive_seconds", self.keepalive_seconds),
            ("accept_backoff_ms", self.accept_backoff_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Validation(format!("{} must be non-zero", name)));
            }
        }
        if self.parameters.len() > PARAMETER_COUNT {
            return Err(ConfigError::Validation(format!(
                "at most {} parameters allowed, got {}",
                PARAMETER_COUNT,
                self.parameters.len()
            )));
        }
        Ok(())
    }

    /// `host:port` the listener binds to.
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}
