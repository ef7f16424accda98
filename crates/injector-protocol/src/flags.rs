//! Status and notification bit flags.

use serde::{Deserialize, Serialize};

/// Parameter or flag values changed.
pub const FLAGCHANGE: i32 = 1 << 0;
/// Storyboard injection is enabled.
pub const STORYBOARD: i32 = 1 << 1;
/// Show a notification in the app when a bundle loads.
pub const NOTSILENT: i32 = 1 << 2;
/// Bring the app to the front after loading.
pub const ORDERFRONT: i32 = 1 << 3;
/// Injection was driven from an alternate IDE.
pub const USEAPPCODE: i32 = 1 << 4;
/// Server understands the iOS 8 device-root handshake.
pub const DEVICEIOS8: i32 = 1 << 5;

/// Status word sent in reply to a valid handshake.
pub fn handshake_status(inject_storyboards: bool) -> i32 {
    let base = if inject_storyboards { STORYBOARD } else { FLAGCHANGE };
    base | DEVICEIOS8
}

/// Flags compiled into the bundle bootstrap source (`autoLoadedNotify:`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyFlags {
    pub notify: bool,
    pub order_front: bool,
    pub storyboard: bool,
}

impl NotifyFlags {
    pub fn bits(&self) -> i32 {
        let mut bits = 0;
        if self.notify {
            bits |= NOTSILENT;
        }
        if self.order_front {
            bits |= ORDERFRONT;
        }
        if self.storyboard {
            bits |= STORYBOARD;
        }
        bits
    }
}
