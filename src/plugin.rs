//! IDE plugin collaborator.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{info, warn};

/// What the service needs from the IDE it is hosted by.
pub trait IdePlugin: Send + Sync {
    /// Ask the debugger to load `bundle_path` into the running app.
    /// Returns false when there is no debugged process.
    fn load_bundle_in_debugger(&self, bundle_path: &Path) -> bool;

    /// Start watching `root` for saved files, or stop with `None`.
    fn watch_project(&self, root: Option<&Path>);

    /// Hash the IDE appends to the DerivedData folder name for a project.
    fn hash_string_for_path(&self, path: &Path) -> Option<String>;

    /// Bonjour host name clients can connect back to.
    fn bonjour_name(&self) -> Option<String>;

    /// Prebuilt bundle that makes a running app connect to the service.
    fn on_demand_bundle_path(&self, is_desktop: bool) -> PathBuf;
}

/// Plugin stand-in for running without an IDE.
///
/// There is no debugger to attach with, so a client must already be
/// connected (via a patched `main.m`) for injection to proceed.
#[derive(Debug)]
pub struct HeadlessPlugin {
    loader_root: PathBuf,
    watched: Mutex<Option<PathBuf>>,
}

impl HeadlessPlugin {
    pub fn new(loader_root: impl Into<PathBuf>) -> Self {
        Self {
            loader_root: loader_root.into(),
            watched: Mutex::new(None),
        }
    }

    /// Project root currently being watched.
    pub fn watched(&self) -> Option<PathBuf> {
        match self.watched.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl IdePlugin for HeadlessPlugin {
    fn load_bundle_in_debugger(&self, bundle_path: &Path) -> bool {
        warn!(bundle = %bundle_path.display(), "no debugger available to load on-demand bundle");
        false
    }

    fn watch_project(&self, root: Option<&Path>) {
        match root {
            Some(root) => info!(root = %root.display(), "watching project"),
            None => info!("file watching stopped"),
        }
        let mut guard = match self.watched.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = root.map(Path::to_path_buf);
    }

    fn hash_string_for_path(&self, _path: &Path) -> Option<String> {
        None
    }

    fn bonjour_name(&self) -> Option<String> {
        None
    }

    fn on_demand_bundle_path(&self, is_desktop: bool) -> PathBuf {
        let suffix = if is_desktop { "" } else { "-iphonesimulator" };
        self.loader_root
            .join(format!("build/Debug{}/InjectionLoader.bundle", suffix))
    }
}
