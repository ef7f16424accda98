//! TCP service for client apps
//!
//! One listener, one accept thread, one reader thread per connection. A
//! connection that completes the handshake becomes the live session held
//! by [`ClientHandle`]; a later handshake supersedes it. Reader threads
//! report to the orchestrator through an [`EventSink`].

pub mod addresses;
mod client;
mod connection;

pub use addresses::{order_by_precedence, precedence};
pub use client::{BundleArtifact, ClientHandle, ClientInfo};

use std::io;
use std::net::{SocketAddr, TcpListener};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use injector_protocol::ProtocolError;
use tracing::{info, warn};

use crate::ui::Ui;
use connection::{serve_connection, ConnectionContext};

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Could not bind service socket on {address}: {source}")]
    Bind { address: String, source: io::Error },

    #[error("No client connected")]
    NotConnected,

    #[error("A file transfer is already in progress")]
    TransferInProgress,

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Error copying bundle to {path}")]
    BundleCopy { path: PathBuf, source: io::Error },

    #[error("Could not find codesign identity")]
    MissingIdentity,

    #[error("Codesigning failed")]
    Codesign { output: String },

    #[error("Bundle not available for {prefix}")]
    LoaderMissing { prefix: String, path: PathBuf },
}

impl TransportError {
    /// Diagnostic text for the presentation layer.
    pub fn detail(&self) -> Option<String> {
        match self {
            TransportError::BundleCopy { source, .. } => Some(source.to_string()),
            TransportError::Codesign { output } => Some(output.clone()),
            TransportError::LoaderMissing { path, .. } => Some(path.display().to_string()),
            _ => None,
        }
    }
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Something a connection reader observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// Handshake completed; `generation` identifies the session.
    ClientConnected { generation: u64, info: ClientInfo },
    /// Load-result word for the last bundle sent.
    BundleLoaded { generation: u64, success: bool },
    /// The session's socket closed.
    ClientDisconnected { generation: u64 },
}

/// Where connection readers deliver events.
pub type EventSink = Arc<dyn Fn(ServerEvent) + Send + Sync>;

/// Bound listener, ready to accept.
pub struct Server {
    listener: TcpListener,
    context: Arc<ConnectionContext>,
    backoff: Duration,
}

impl Server {
    /// Bind `address` (`host:port`). Failure here is fatal to the service.
    pub fn listen(
        address: &str,
        client: ClientHandle,
        ui: Ui,
        events: EventSink,
        backoff: Duration,
    ) -> TransportResult<Self> {
        // std sets SO_REUSEADDR on unix listeners
        let listener = TcpListener::bind(address).map_err(|source| TransportError::Bind {
            address: address.to_string(),
            source,
        })?;
        info!(address, "injection service listening");

        Ok(Self {
            listener,
            context: Arc::new(ConnectionContext { client, ui, events }),
            backoff,
        })
    }

    pub fn local_addr(&self) -> TransportResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the accept loop on its own thread.
    pub fn spawn(self) -> TransportResult<JoinHandle<()>> {
        let handle = thread::Builder::new()
            .name("injector-accept".to_string())
            .spawn(move || self.accept_loop())?;
        Ok(handle)
    }

    /// Accept forever. Errors are logged and followed by a pause.
    pub fn accept_loop(&self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        warn!(%peer, error = %e, "could not set TCP_NODELAY");
                    }
                    let context = Arc::clone(&self.context);
                    let spawned = thread::Builder::new()
                        .name(format!("injector-client-{}", peer))
                        .spawn(move || serve_connection(stream, &context));
                    if let Err(e) = spawned {
                        warn!(%peer, error = %e, "could not start connection thread");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    self.context
                        .ui
                        .error("Dud incoming connection accept", Some(&e.to_string()));
                    thread::sleep(self.backoff);
                }
            }
        }
    }
}
