//! The live client session and everything sent to it.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use injector_protocol::{write_frame, write_remote_header, ClientKind, RemoteSize};
use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::{TransportError, TransportResult};
use crate::fsutil;
use crate::shell::{self, quoted};

/// Identity a client presented in its handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientInfo {
    pub arch: String,
    pub kind: ClientKind,
    pub executable_path: String,
    /// Home directory on a device; the executable path for older clients
    pub device_root: String,
}

impl ClientInfo {
    /// `Resources` directory of a desktop app bundle.
    pub fn app_resources(&self) -> PathBuf {
        Path::new(&self.executable_path)
            .parent()
            .unwrap_or_else(|| Path::new("/"))
            .join("../Resources")
    }

    /// xcodebuild arguments matching this client.
    pub fn build_config(&self) -> String {
        let mut config = format!("-configuration Debug -arch {}", self.arch);
        if let Some(sdk) = self.kind.sdk() {
            config.push_str(" -sdk ");
            config.push_str(sdk);
        }
        config
    }
}

/// A bundle handed to the client under a fresh name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleArtifact {
    /// Local `InjectionBundleN.bundle` copy
    pub path: PathBuf,
    /// Path the client was told to load (differs on devices)
    pub loaded_path: PathBuf,
    pub architecture: String,
    pub sequence_number: u32,
}

#[derive(Debug, Default)]
struct ClientState {
    stream: Option<TcpStream>,
    generation: u64,
    info: Option<ClientInfo>,
    injection_number: u32,
    /// Local file receiving a download requested from the client
    download: Option<File>,
}

impl ClientState {
    fn stream(&mut self) -> TransportResult<&mut TcpStream> {
        self.stream.as_mut().ok_or(TransportError::NotConnected)
    }

    fn info(&self) -> TransportResult<ClientInfo> {
        self.info.clone().ok_or(TransportError::NotConnected)
    }

    fn next_number(&mut self) -> u32 {
        let number = self.injection_number;
        self.injection_number += 1;
        number
    }

    fn send(&mut self, magic: i32, path: &str, data: Option<&[u8]>) -> TransportResult<()> {
        let stream = self.stream()?;
        if let Err(e) = write_frame(stream, magic, path, data) {
            let _ = stream.shutdown(Shutdown::Both);
            return Err(e.into());
        }
        Ok(())
    }

    /// Write `from` and everything below it as remote-write frames.
    fn copy_to_device(&mut self, magic: i32, from: &Path, to: &str) -> TransportResult<usize> {
        info!(from = %from.display(), to, "sending to device");
        self.send(magic, "!Injector: Sending to device...", None)?;

        let stream = self.stream()?;
        match stream_tree(stream, from, to) {
            Ok(frames) => Ok(frames),
            Err(e) => {
                let _ = stream.shutdown(Shutdown::Both);
                Err(e)
            }
        }
    }

    /// Move the bundle to where the client can load it, then send its path.
    fn load_bundle(&mut self, magic: i32, bundle_path: &Path) -> TransportResult<PathBuf> {
        let info = self.info()?;
        let name = bundle_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let loaded_path = if info.kind.is_device() {
            let remote = format!("{}/tmp/{}{}", info.device_root, self.next_number(), name);
            self.copy_to_device(magic, bundle_path, &remote)?;
            PathBuf::from(remote)
        } else if info.kind.is_desktop() && !bundle_path.starts_with(info.app_resources()) {
            let relocated = info.app_resources().join(&name);
            replace_tree(bundle_path, &relocated)?;
            relocated
        } else {
            bundle_path.to_path_buf()
        };

        self.send(magic, &loaded_path.display().to_string(), None)?;
        Ok(loaded_path)
    }
}

/// Shared handle to the current client session.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    state: Arc<Mutex<ClientState>>,
    magic: i32,
}

impl ClientHandle {
    pub fn new(magic: i32) -> Self {
        Self {
            state: Arc::new(Mutex::new(ClientState::default())),
            magic,
        }
    }

    /// Handshake value clients must present.
    pub fn magic(&self) -> i32 {
        self.magic
    }

    fn lock(&self) -> MutexGuard<'_, ClientState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn is_connected(&self) -> bool {
        let state = self.lock();
        state.stream.is_some() && state.info.is_some()
    }

    pub fn info(&self) -> Option<ClientInfo> {
        self.lock().info.clone()
    }

    /// Incremented on every successful handshake.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Make `stream` the live session, closing any previous one.
    pub(crate) fn attach(&self, stream: TcpStream, info: ClientInfo) -> u64 {
        let mut state = self.lock();
        if let Some(old) = state.stream.take() {
            debug!(generation = state.generation, "superseding previous client");
            let _ = old.shutdown(Shutdown::Both);
        }
        state.generation += 1;
        state.stream = Some(stream);
        state.info = Some(info);
        state.injection_number = 0;
        state.download = None;
        state.generation
    }

    /// End session `generation`. False if a newer session replaced it.
    pub(crate) fn detach(&self, generation: u64) -> bool {
        let mut state = self.lock();
        if state.generation != generation {
            return false;
        }
        state.stream = None;
        state.info = None;
        state.download = None;
        true
    }

    pub(crate) fn take_download(&self, generation: u64) -> Option<File> {
        let mut state = self.lock();
        if state.generation != generation {
            return None;
        }
        state.download.take()
    }

    /// Send a frame. Without `data` the path is a command.
    pub fn send(&self, path: &str, data: Option<&[u8]>) -> TransportResult<()> {
        self.lock().send(self.magic, path, data)
    }

    /// Send an empty command so idle links stay awake. Skipped while a
    /// download is pending. Returns whether a frame was sent.
    pub fn keep_alive(&self) -> TransportResult<bool> {
        let mut state = self.lock();
        if state.stream.is_none() || state.info.is_none() || state.download.is_some() {
            return Ok(false);
        }
        state.send(self.magic, "", None)?;
        Ok(true)
    }

    /// Echo a message in the app's console. Dropped when nobody is connected.
    pub fn console(&self, message: &str) -> TransportResult<()> {
        let mut state = self.lock();
        if state.info.is_none() {
            return Ok(());
        }
        state.send(self.magic, &format!("!Injector: {}", message), None)
    }

    /// xcodebuild arguments for the connected client.
    pub fn build_config(&self) -> Option<String> {
        self.lock().info.as_ref().map(ClientInfo::build_config)
    }

    /// Copy a directory tree to the device. Emits one frame for `from`
    /// itself and one per entry below it, in name order.
    pub fn copy_to_device(&self, from: &Path, to: &str) -> TransportResult<usize> {
        self.lock().copy_to_device(self.magic, from, to)
    }

    /// Copy `bundle_path` to `InjectionBundleN.bundle`, add compiled nibs,
    /// sign for devices, and tell the client to load it.
    pub fn inject_bundle(
        &self,
        bundle_path: &Path,
        reset_app: bool,
        identity: Option<&str>,
        nib_directory: Option<&Path>,
    ) -> TransportResult<BundleArtifact> {
        let (info, generation, sequence_number) = {
            let mut state = self.lock();
            let info = state.info()?;
            (info, state.generation, state.next_number())
        };

        // the session stays usable while the bundle is copied and signed
        let path = stage_bundle(&info, bundle_path, sequence_number, identity, nib_directory)?;

        let mut state = self.lock();
        if state.generation != generation {
            return Err(TransportError::NotConnected);
        }
        if reset_app {
            state.send(self.magic, "~", None)?;
        }

        let loaded_path = state.load_bundle(self.magic, &path)?;
        Ok(BundleArtifact {
            path,
            loaded_path,
            architecture: info.arch,
            sequence_number,
        })
    }

    /// Send a bundle that is already built and named.
    pub fn load_bundle(&self, bundle_path: &Path) -> TransportResult<PathBuf> {
        self.lock().load_bundle(self.magic, bundle_path)
    }

    /// Load `<OSX|Sim|Device>Bundle.loader` from `resource_dir` on behalf
    /// of another plugin. False when no client is connected.
    pub fn load_bundle_for_plugin(&self, resource_dir: &Path) -> TransportResult<bool> {
        let mut state = self.lock();
        let Some(info) = state.info.clone() else {
            return Ok(false);
        };
        let prefix = info.kind.loader_prefix();
        let loader = resource_dir.join(format!("{}Bundle.loader", prefix));
        if !loader.exists() {
            return Err(TransportError::LoaderMissing {
                prefix: prefix.to_string(),
                path: loader,
            });
        }
        info!(loader = %loader.display(), "loading bundle for plugin");
        state.load_bundle(self.magic, &loader)?;
        Ok(true)
    }

    /// Ask the client for `remote_path`; its bytes are written to
    /// `local_path` when the next word arrives.
    pub fn request_download(&self, remote_path: &str, local_path: &Path) -> TransportResult<()> {
        let mut state = self.lock();
        state.info()?;
        if state.download.is_some() {
            return Err(TransportError::TransferInProgress);
        }
        state.download = Some(File::create(local_path)?);
        if let Err(e) = state.send(self.magic, &format!("<{}", remote_path), None) {
            state.download = None;
            return Err(e);
        }
        Ok(())
    }
}

/// Copy the built bundle to `InjectionBundleN.bundle`, add compiled nibs
/// and sign it for devices.
fn stage_bundle(
    info: &ClientInfo,
    bundle_path: &Path,
    sequence_number: u32,
    identity: Option<&str>,
    nib_directory: Option<&Path>,
) -> TransportResult<PathBuf> {
    let destination = if info.kind.is_desktop() {
        info.app_resources()
    } else {
        bundle_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    };
    let path = destination.join(format!("InjectionBundle{}.bundle", sequence_number));
    debug!(from = %bundle_path.display(), to = %path.display(), "copying bundle");
    replace_tree(bundle_path, &path)?;

    if let Some(nibs) = nib_directory {
        copy_compiled_nibs(nibs, &path)?;
    }

    if info.kind.is_device() {
        let identity = identity.ok_or(TransportError::MissingIdentity)?;
        codesign(identity, &path)?;
    }
    Ok(path)
}

fn stream_tree(stream: &mut TcpStream, from: &Path, to: &str) -> TransportResult<usize> {
    let mut frames = 0;
    send_entry(stream, from, to)?;
    frames += 1;

    for entry in WalkDir::new(from).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let remote = format!("{}/{}", to, relative.display());
        send_entry(stream, entry.path(), &remote)?;
        frames += 1;
    }

    stream.flush()?;
    Ok(frames)
}

fn send_entry(stream: &mut TcpStream, local: &Path, remote: &str) -> TransportResult<()> {
    let metadata = fs::metadata(local)?;
    if metadata.is_dir() {
        write_remote_header(stream, remote, RemoteSize::Directory)?;
        return Ok(());
    }

    let length = metadata.len();
    write_remote_header(stream, remote, RemoteSize::Bytes(length))?;
    let file = File::open(local)?;
    let copied = io::copy(&mut file.take(length), stream)?;
    if copied != length {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("{} shrank while sending", local.display()),
        )
        .into());
    }
    Ok(())
}

fn replace_tree(from: &Path, to: &Path) -> TransportResult<()> {
    fsutil::remove_tree(to)
        .and_then(|_| fsutil::copy_tree(from, to))
        .map_err(|source| TransportError::BundleCopy {
            path: to.to_path_buf(),
            source,
        })
}

/// Copy nib and image files from a storyboard compilation directory.
fn copy_compiled_nibs(from: &Path, bundle: &Path) -> TransportResult<()> {
    for entry in WalkDir::new(from).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let target = bundle.join(relative);

        if entry.file_type().is_dir() {
            if !target.exists() {
                fs::create_dir(&target)?;
            }
        } else if is_nib_resource(&target) {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

fn is_nib_resource(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("nib" | "png" | "jpg" | "jpeg")
    )
}

fn codesign(identity: &str, bundle: &Path) -> TransportResult<()> {
    let command = format!("codesign -s \"{}\" {}", identity, quoted(bundle));
    let working_dir = bundle.parent().unwrap_or_else(|| Path::new("/"));
    let output = shell::run_shell(&command, working_dir)?;
    if !output.success() {
        warn!(bundle = %bundle.display(), "codesign failed");
        return Err(TransportError::Codesign {
            output: output.text(),
        });
    }
    Ok(())
}
