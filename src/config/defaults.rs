//! Built-in defaults (layer 1)
//!
//! Hardcoded values used for any field the config file leaves out.

use std::path::PathBuf;

use injector_protocol::INJECTOR_PORT;

/// Address the listener binds to (all interfaces)
pub const BIND_ADDRESS: &str = "0.0.0.0";

/// Xcode installation used for toolchain and xcodebuild paths
pub const XCODE_PATH: &str = "/Applications/Xcode.app";

/// Object files, dummy sources and scratch data
pub const SCRATCH_DIR: &str = "/tmp";

/// Window in which editor and watcher triggers for a file are deduplicated
pub const LOCKOUT_SECONDS: u64 = 5;

/// How long to wait for a client after loading the on-demand bundle
pub const CONNECT_TIMEOUT_SECONDS: u64 = 5;

/// Interval between keep-alive frames
pub const KEEPALIVE_SECONDS: u64 = 2;

/// Pause after a failed accept
pub const ACCEPT_BACKOFF_MS: u64 = 1000;

pub fn port() -> u16 {
    INJECTOR_PORT
}

/// `$USER`, falling back to "injector" when unset.
pub fn user() -> String {
    std::env::var("USER").unwrap_or_else(|_| "injector".to_string())
}

/// `$HOME`, falling back to the scratch directory.
pub fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(SCRATCH_DIR))
}

/// Installed resources: bundle templates, headers, patch templates.
pub fn resources_dir() -> PathBuf {
    home_dir().join("Library/Application Support/Injector/Resources")
}

/// Location of the config file when `--config` is not given.
pub fn config_path() -> PathBuf {
    home_dir().join(".config/injector/injector.toml")
}
