//! Injector wire protocol
//!
//! Framing shared by the injection service and the client bundle that runs
//! inside the app being injected. Every message starts with a fixed
//! [`FrameHeader`]; the opening header of a connection must carry the
//! port-derived [`MAGIC`] value.

pub mod client;
pub mod error;
pub mod flags;
pub mod frame;

pub use client::ClientKind;
pub use error::{ProtocolError, ProtocolResult};
pub use flags::{handshake_status, NotifyFlags};
pub use frame::{
    read_frame, read_payload, read_string, read_word, write_frame, write_remote_header,
    write_word, Frame, FrameHeader, RemoteSize,
};

/// TCP port the service listens on and clients connect back to.
pub const INJECTOR_PORT: u16 = 31441;

/// Handshake magic for the default port.
pub const MAGIC: i32 = magic_for_port(INJECTOR_PORT);

/// `dataLength` sentinel telling the client a remote-write target is a directory.
pub const MKDIR: i32 = -1;

/// Number of tunable parameters replayed to a client after it connects.
pub const PARAMETER_COUNT: usize = 5;

/// Largest path accepted in a single frame.
pub const MAX_PATH_LENGTH: i32 = 10_000;

/// Magic value a client must present in its first header: `-(port²)`.
///
/// Wraps on overflow so every port maps to some value.
pub const fn magic_for_port(port: u16) -> i32 {
    let port = port as i32;
    port.wrapping_mul(port).wrapping_neg()
}
