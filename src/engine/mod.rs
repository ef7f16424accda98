//! Injection orchestrator
//!
//! One thread owns the [`Engine`] and works through [`Command`]s in order,
//! so each injection runs to a terminal state before the next begins:
//!
//! ```text
//! Idle → Deduplicating → WaitingForConnection → Compiling → Building
//!      → Transferring → Injected | CompileError | LoadingError
//! ```

mod command;
mod eval;
mod lockout;
mod session;

pub use command::{parse_line, Command, InjectionRequest, ParseError};
pub use eval::{
    apply_eval_patch, eval_addition, revert_eval_patch, strip_module_prefix, EvalRequest,
    ADDITIONS_TAG,
};
pub use lockout::{LockoutTable, TriggerSource};
pub use session::Session;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use injector_logminer::{is_interface_builder, DummyTarget, MinerError, Mined};
use injector_protocol::ClientKind;
use regex_lite::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::bundler::{BundleBuilder, BundleError, ChangedFile};
use crate::config::{defaults, Config};
use crate::fsutil;
use crate::plugin::IdePlugin;
use crate::project::{ProjectError, XcodeProject};
use crate::resources::{ResourceLocator, Template};
use crate::shell::{self, quoted};
use crate::transport::{
    order_by_precedence, BundleArtifact, ClientHandle, ClientInfo, ServerEvent, TransportError,
};
use crate::ui::{BundleState, Ui};

/// Where the current injection is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InjectionState {
    Idle,
    Deduplicating,
    WaitingForConnection,
    Compiling,
    Building,
    Transferring,
    Injected,
    CompileError,
    LoadingError,
}

impl InjectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InjectionState::Injected | InjectionState::CompileError | InjectionState::LoadingError
        )
    }
}

/// Errors that end an injection
#[derive(Debug, thiserror::Error)]
pub enum InjectionError {
    #[error("{0}")]
    Miner(#[from] MinerError),

    #[error("{0}")]
    Project(#[from] ProjectError),

    #[error("{0}")]
    Bundle(#[from] BundleError),

    #[error("{0}")]
    Transport(#[from] TransportError),

    #[error("No run project or selected project, have you installed the plugin?")]
    NoProject,

    #[error("Storyboard injection must be selected in the parameters panel")]
    StoryboardDisabled,

    #[error("Storyboard injection requires project patching")]
    StoryboardNeedsPatch,

    #[error("Program is not running")]
    NotRunning(PathBuf),

    #[error("Timeout waiting for connect")]
    ConnectTimeout,

    #[error("Bundle project location unknown until build logs are found")]
    NoInjectionRoot,

    #[error("Unable to find source for class {class_file}")]
    SourceMissing { class_file: String, path: PathBuf },

    #[error("No source returned for class")]
    NoSourceForClass(String),

    #[error("{reason} failed")]
    CompileFailed { reason: String, output: String },

    #[error("Malformed eval request")]
    MalformedEval(String),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex_lite::Error),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

impl InjectionError {
    /// State an injection ends in after this error.
    pub fn terminal_state(&self) -> InjectionState {
        match self {
            InjectionError::Transport(_)
            | InjectionError::NotRunning(_)
            | InjectionError::ConnectTimeout => InjectionState::LoadingError,
            _ => InjectionState::CompileError,
        }
    }

    pub fn detail(&self) -> Option<String> {
        match self {
            InjectionError::Miner(e) => e.detail(),
            InjectionError::Project(e) => e.detail(),
            InjectionError::Bundle(e) => e.detail(),
            InjectionError::Transport(e) => e.detail(),
            InjectionError::NotRunning(path) => Some(path.display().to_string()),
            InjectionError::SourceMissing { path, .. } => Some(path.display().to_string()),
            InjectionError::NoSourceForClass(file) | InjectionError::MalformedEval(file) => {
                Some(file.clone())
            }
            InjectionError::CompileFailed { output, .. } => Some(output.clone()),
            _ => None,
        }
    }
}

pub type InjectionResult<T> = Result<T, InjectionError>;

/// Replaces a previously applied project patch, or matches end of file.
const EXISTING_PATCH: &str = r"(?s)\n*(// Injector patch starts.*// Injector patch ends\n|// From here to end of file added by Injection Plugin //.*|$)";

const PCH_FILES: &str = r"(refix\.pch|Bridging-Header\.h)$";
const MAIN_FILES: &str = r"(^|/)main\.(m|mm)$";

/// Orchestrator settings taken from [`Config`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub xcode_path: PathBuf,
    pub scratch_dir: PathBuf,
    pub user: String,
    pub home: PathBuf,
    pub port: u16,
    pub lockout: Duration,
    pub connect_timeout: Duration,
    pub server_addresses: Vec<String>,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            xcode_path: config.xcode_path.clone(),
            scratch_dir: config.scratch_dir.clone(),
            user: config.user.clone(),
            home: defaults::home_dir(),
            port: config.port,
            lockout: Duration::from_secs(config.lockout_seconds),
            connect_timeout: Duration::from_secs(config.connect_timeout_seconds),
            server_addresses: config.server_addresses.clone(),
        }
    }
}

/// Drives injections from request to loaded bundle.
pub struct Engine {
    settings: EngineSettings,
    ui: Ui,
    client: ClientHandle,
    plugin: Arc<dyn IdePlugin>,
    resources: ResourceLocator,
    /// Project open in the IDE
    selected: Option<XcodeProject>,
    /// Project of the app that is running
    run_project: Option<XcodeProject>,
    session: Session,
    lockout: LockoutTable,
    state: InjectionState,
}

impl Engine {
    pub fn new(
        settings: EngineSettings,
        ui: Ui,
        client: ClientHandle,
        plugin: Arc<dyn IdePlugin>,
        resources: ResourceLocator,
    ) -> Self {
        let lockout = LockoutTable::new(settings.lockout);
        Self {
            settings,
            ui,
            client,
            plugin,
            resources,
            selected: None,
            run_project: None,
            session: Session::default(),
            lockout,
            state: InjectionState::Idle,
        }
    }

    pub fn state(&self) -> InjectionState {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn selected_project(&self) -> Option<&XcodeProject> {
        self.selected.as_ref()
    }

    /// Handle commands until `Shutdown` or every sender is gone.
    pub fn run(&mut self, commands: Receiver<Command>) {
        for command in commands {
            if !self.handle(command) {
                break;
            }
        }
        info!("orchestrator stopped");
    }

    /// Returns false once asked to shut down.
    pub fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Inject(request) => {
                self.inject(request);
            }
            Command::Eval(encoded) => self.eval_code(&encoded),
            Command::Workspace {
                path,
                log_directory,
                is_alt_ide,
            } => self.workspace_changed(&path, log_directory, is_alt_ide),
            Command::Reset => self.reset(),
            Command::Patch => self.patch(),
            Command::Unpatch => self.unpatch(),
            Command::LoadPluginBundle(dir) => self.load_bundle_for_plugin(&dir),
            Command::Download { remote, local } => {
                if let Err(e) = self.client.request_download(&remote, &local) {
                    self.ui.error(e.to_string(), e.detail().as_deref());
                }
            }
            Command::Server(event) => self.server_event(event),
            Command::Shutdown => return false,
        }
        true
    }

    fn transition(&mut self, next: InjectionState) {
        debug!(from = ?self.state, to = ?next, "injection state");
        self.state = next;
    }

    // =========================================================================
    // Injection
    // =========================================================================

    /// Run one injection to a terminal state. Returns the artifact sent to
    /// the client, or `None` when the request was a duplicate or failed.
    pub fn inject(&mut self, request: InjectionRequest) -> Option<BundleArtifact> {
        match self.try_inject(&request) {
            Ok(artifact) => artifact,
            Err(e) => {
                let state = e.terminal_state();
                warn!(error = %e, ?state, "injection failed");
                self.transition(state);
                self.ui.update_state(match state {
                    InjectionState::LoadingError => BundleState::LoadingError,
                    _ => BundleState::CompileError,
                });
                self.ui.error(e.to_string(), e.detail().as_deref());
                self.ui.error("Injection Failed, Consult Console", None);
                None
            }
        }
    }

    fn try_inject(&mut self, request: &InjectionRequest) -> InjectionResult<Option<BundleArtifact>> {
        self.transition(InjectionState::Deduplicating);
        let preferences = self.ui.preferences();

        if request.eval_code.is_none() && preferences.file_watch {
            for file in &request.files {
                if self.lockout.check(file, request.source) {
                    self.ui.debug(format!("Locked out {}", file));
                    self.transition(InjectionState::Idle);
                    return Ok(None);
                }
            }
        }

        let Some(first) = request.files.first() else {
            self.transition(InjectionState::Idle);
            return Ok(None);
        };
        if is_interface_builder(first) {
            if !preferences.inject_storyboards {
                return Err(InjectionError::StoryboardDisabled);
            }
            if !self.client.is_connected() {
                return Err(InjectionError::StoryboardNeedsPatch);
            }
        }

        self.transition(InjectionState::WaitingForConnection);
        self.ensure_connected()?;
        self.sync_session();
        self.ui.update_state(BundleState::Building);

        if self.run_project.is_none() {
            self.run_project = self.selected.clone();
        }

        self.transition(InjectionState::Compiling);
        let changed = self.recompile(&request.files, request.eval_code.as_deref())?;

        self.transition(InjectionState::Building);
        let mut builder = self.bundle_builder()?;
        let built = builder.prepare_and_build(&changed, &preferences)?;

        self.transition(InjectionState::Transferring);
        let nib_directory = if request.files.iter().any(|f| is_interface_builder(f)) {
            self.session.nib_compiled().map(Path::to_path_buf)
        } else {
            None
        };
        let artifact = self.client.inject_bundle(
            &built.path,
            request.reset_app,
            built.identity.as_deref(),
            nib_directory.as_deref(),
        )?;

        info!(bundle = %artifact.loaded_path.display(), sequence = artifact.sequence_number, "bundle sent");
        self.transition(InjectionState::Injected);
        Ok(Some(artifact))
    }

    /// Load the on-demand bundle through the debugger if nobody is
    /// connected, then wait for the client.
    fn ensure_connected(&mut self) -> InjectionResult<()> {
        if self.client.is_connected() {
            return Ok(());
        }

        let is_desktop = self
            .selected
            .as_ref()
            .map(XcodeProject::looks_like_desktop_project)
            .unwrap_or(false);
        let bundle = self.plugin.on_demand_bundle_path(is_desktop);
        if !self.plugin.load_bundle_in_debugger(&bundle) {
            return Err(InjectionError::NotRunning(bundle));
        }

        let start = Instant::now();
        while !self.client.is_connected() {
            if start.elapsed() > self.settings.connect_timeout {
                return Err(InjectionError::ConnectTimeout);
            }
            thread::sleep(Duration::from_millis(100));
        }
        Ok(())
    }

    /// Catch up with a connection the event queue has not reported yet.
    fn sync_session(&mut self) {
        let generation = self.client.generation();
        if generation != self.session.generation() {
            if let Some(info) = self.client.info() {
                self.client_connected(generation, info);
            }
        }
    }

    fn dummy_target(&self, kind: ClientKind, arch: &str) -> DummyTarget {
        let read = |name: &str, ext: &str| {
            self.resources
                .path_for_resource(name, Some(ext))
                .and_then(|path| fs::read_to_string(path).ok())
        };
        DummyTarget {
            xcode_path: self.settings.xcode_path.clone(),
            arch: arch.to_string(),
            kind,
            user: self.settings.user.clone(),
            scratch_dir: self.settings.scratch_dir.clone(),
            source_template: read("unknown", "m_"),
            command_template: read("unknown", "sh"),
        }
    }

    /// Compile each changed file with the command mined for it. Files with
    /// no command are passed on without an object file.
    fn recompile(&mut self, files: &[String], eval_code: Option<&str>) -> InjectionResult<Vec<ChangedFile>> {
        let project = self.selected.clone().ok_or(InjectionError::NoProject)?;
        let info = self
            .session
            .info()
            .cloned()
            .ok_or(InjectionError::Transport(TransportError::NotConnected))?;
        let miner = project
            .miner()
            .with_dummy_target(self.dummy_target(info.kind, &info.arch));

        let mut changed = Vec::with_capacity(files.len());
        let mut object_number = 0;

        for file in files {
            if self.session.compile_command(file).is_none() {
                match miner.find_compile_command(file, &info.arch) {
                    Ok(mined) => self.learn(file, mined),
                    Err(e) if eval_code.is_none() => {
                        self.ui.error(e.to_string(), e.detail().as_deref());
                        changed.push(ChangedFile {
                            source: file.clone(),
                            object: None,
                        });
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            let Some(command) = self.session.compile_command(file).cloned() else {
                continue;
            };

            // ibtool writes into the nib directory, not an object file
            if is_interface_builder(file) {
                let reason = format!("Compiling {}", file_name(file));
                self.execute(&reason, &command.shell_line(), &project.project_root)?;
                changed.push(ChangedFile {
                    source: file.clone(),
                    object: None,
                });
                continue;
            }

            let object = self
                .settings
                .scratch_dir
                .join(format!("injecting_class{}_{}.o", object_number, self.settings.user));
            object_number += 1;
            let object = object.display().to_string();
            let command = command.with_output(&object)?;

            let patched_source = match eval_code {
                Some(code) => Some(self.apply_eval(file, code)?),
                None => None,
            };

            let reason = format!("Compiling {}", file_name(file));
            let compiled = self.execute(&reason, &command.shell_line(), &project.project_root);

            if let Some(ref source) = patched_source {
                self.lockout.record(&source.display().to_string(), TriggerSource::Editor);
                let text = fs::read_to_string(source)?;
                fs::write(source, revert_eval_patch(&text)?)?;
            }
            compiled?;

            changed.push(ChangedFile {
                source: file.clone(),
                object: Some(object),
            });
        }
        Ok(changed)
    }

    fn learn(&mut self, file: &str, mined: Mined) {
        if let Some(source) = mined.resolved_source() {
            self.ui.debug(format!("sourcesForClasses: {}", source.display()));
            self.session.remember_source(file, source);
        }
        if let Mined::Nib {
            ref compilation_directory,
            ..
        } = mined
        {
            self.session.set_nib_compiled(compilation_directory.clone());
        }
        self.session.remember_command(file, mined.command().clone());
    }

    /// Append the eval addition for `class_file` to its source. Returns
    /// the source path so the caller can revert it.
    fn apply_eval(&mut self, class_file: &str, code: &str) -> InjectionResult<PathBuf> {
        let source = self
            .session
            .source_for_file(class_file)
            .map(Path::to_path_buf)
            .ok_or_else(|| InjectionError::NoSourceForClass(class_file.to_string()))?;
        if !source.exists() {
            return Err(InjectionError::SourceMissing {
                class_file: class_file.to_string(),
                path: source,
            });
        }

        let template = if class_file.ends_with(".swift") {
            Template::SwiftEval
        } else {
            Template::ObjcEval
        };
        let addition = eval_addition(
            &self.resources.template(template),
            &self.resources.resource_path("BundleInterface.h"),
            class_file,
            code,
        );

        self.lockout.record(&source.display().to_string(), TriggerSource::Editor);
        let text = fs::read_to_string(&source)?;
        fs::write(&source, apply_eval_patch(&text, &addition)?)?;
        Ok(source)
    }

    fn execute(&self, reason: &str, command: &str, working_dir: &Path) -> InjectionResult<()> {
        self.ui.progress(reason, Some(command));
        let output = shell::run_shell(command, working_dir)?;
        if !output.success() {
            return Err(InjectionError::CompileFailed {
                reason: reason.to_string(),
                output: output.text(),
            });
        }
        Ok(())
    }

    fn bundle_builder(&self) -> InjectionResult<BundleBuilder> {
        let project = self.run_project.as_ref().ok_or(InjectionError::NoProject)?;
        let info = self
            .session
            .info()
            .ok_or(InjectionError::Transport(TransportError::NotConnected))?;
        let injection_root = project
            .injection_root(info.kind.os_name())
            .ok_or(InjectionError::NoInjectionRoot)?;

        Ok(BundleBuilder::new(
            injection_root,
            info.kind.os_name(),
            &info.arch,
            self.settings.xcode_path.clone(),
            info.build_config(),
            project.project_root.clone(),
            project.log_root.clone(),
            self.resources.clone(),
            self.ui.clone(),
        ))
    }

    /// Evaluate code against a class in the running app.
    pub fn eval_code(&mut self, encoded: &str) {
        self.ui.update_state(BundleState::Building);
        let request = match EvalRequest::parse(encoded) {
            Ok(request) => request,
            Err(e) => {
                self.ui.update_state(BundleState::CompileError);
                self.ui.error(e.to_string(), e.detail().as_deref());
                return;
            }
        };
        debug!(class = %request.class_name, path_id = %request.path_id, "eval");
        self.inject(InjectionRequest {
            files: vec![request.source_file()],
            reset_app: false,
            source: TriggerSource::Editor,
            eval_code: Some(request.code),
        });
    }

    /// Path of the source last found for `class_name`.
    pub fn source_for_class(&self, class_name: &str) -> Option<PathBuf> {
        self.session.source_for_class(class_name).map(Path::to_path_buf)
    }

    // =========================================================================
    // Workspace
    // =========================================================================

    /// The IDE switched to `path`. Without a log directory the usual
    /// DerivedData location is tried.
    pub fn workspace_changed(&mut self, path: &str, log_directory: Option<PathBuf>, is_alt_ide: bool) {
        let project = match XcodeProject::open(path, is_alt_ide) {
            Ok(project) => project,
            Err(e) => {
                self.ui.error(e.to_string(), e.detail().as_deref());
                return;
            }
        };

        let log_root = log_directory.or_else(|| self.guess_log_root(&project));
        let project = project.with_log_root(log_root);

        let changed = self
            .selected
            .as_ref()
            .map(|selected| selected.project_path != project.project_path)
            .unwrap_or(true);
        if changed {
            info!(project = %project.project_name, "active project");
            self.ui.active_project(project.project_name.clone());
            if self.run_project.is_none() || is_alt_ide {
                self.run_project = Some(project.clone());
            }
            self.selected = Some(project);
        }
    }

    fn guess_log_root(&self, project: &XcodeProject) -> Option<PathBuf> {
        let Some(hash) = self.plugin.hash_string_for_path(&project.project_path) else {
            self.ui.error(
                "Could not guess logs directory",
                Some(&project.project_path.display().to_string()),
            );
            return None;
        };
        let guess = project.derived_data_logs(&self.settings.home, &hash);
        if guess.exists() {
            Some(guess)
        } else {
            self.ui
                .error("Could not guess logs directory", Some(&guess.display().to_string()));
            None
        }
    }

    /// Throw away the bundle project and learned compile commands.
    pub fn reset(&mut self) {
        if let Some(ref project) = self.run_project {
            let os_names: Vec<&str> = match self.session.info() {
                Some(info) => vec![info.kind.os_name()],
                None => vec!["iOS", "OSX"],
            };
            for os in os_names {
                if let Some(root) = project.injection_root(os) {
                    info!(root = %root.display(), "removing bundle project");
                    if let Err(e) = fsutil::remove_tree(&root) {
                        self.ui.error("Could not remove bundle project", Some(&e.to_string()));
                    }
                }
            }
        }
        self.session.clear_compile_commands();
        self.ui.progress("Bundle project reset", None);
    }

    // =========================================================================
    // Project patching
    // =========================================================================

    /// Add the include block to prefix headers and the connect-back block
    /// to `main.m`.
    pub fn patch(&mut self) {
        if let Err(e) = self.try_patch() {
            self.ui.error(e.to_string(), e.detail().as_deref());
        }
    }

    fn try_patch(&self) -> InjectionResult<Vec<PathBuf>> {
        let project = self.selected.as_ref().ok_or(InjectionError::NoProject)?;
        let existing = Regex::new(EXISTING_PATCH)?;

        let interface = self.resources.resource_path("BundleInterface.h");
        let pch = self
            .resources
            .template(Template::PchPatch)
            .replace("__INCLUDE__", &interface.display().to_string());
        let mut patched = project.patch_files_matching(PCH_FILES, &existing, &pch)?;

        let mut addresses = order_by_precedence(&self.settings.server_addresses);
        if let Some(name) = self.plugin.bonjour_name() {
            addresses.insert(0, name);
        }
        let quoted_addresses: Vec<String> = addresses.iter().map(|a| format!("\"{}\"", a)).collect();
        let injection = self.resources.resource_path("BundleInjection.h");
        let main = self
            .resources
            .template(Template::MainPatch)
            .replace("__ADDRESSES__", &quoted_addresses.join(", "))
            .replace("__IPADDRS__", &addresses.join(" "))
            .replace("__INCLUDE__", &injection.display().to_string())
            .replace("__PORT__", &self.settings.port.to_string());
        patched.extend(project.patch_files_matching(MAIN_FILES, &existing, &main)?);

        self.ui.progress(format!("Patched {} files", patched.len()), None);
        Ok(patched)
    }

    /// Remove blocks added by [`Engine::patch`].
    pub fn unpatch(&mut self) {
        let result = self
            .selected
            .as_ref()
            .ok_or(InjectionError::NoProject)
            .and_then(|project| {
                let existing = Regex::new(EXISTING_PATCH)?;
                let mut reverted = project.patch_files_matching(MAIN_FILES, &existing, "\n")?;
                reverted.extend(project.patch_files_matching(PCH_FILES, &existing, "\n")?);
                Ok(reverted)
            });
        match result {
            Ok(reverted) => self
                .ui
                .progress(format!("Unpatched {} files", reverted.len()), None),
            Err(e) => self.ui.error(e.to_string(), e.detail().as_deref()),
        }
    }

    fn load_bundle_for_plugin(&mut self, resource_dir: &Path) {
        self.ui.progress("Loading bundle for plugin", None);
        match self.client.load_bundle_for_plugin(resource_dir) {
            Ok(true) => {}
            Ok(false) => self.ui.error("No client connected", None),
            Err(e) => self.ui.error(e.to_string(), e.detail().as_deref()),
        }
    }

    // =========================================================================
    // Client events
    // =========================================================================

    pub fn server_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::ClientConnected { generation, info } => {
                self.client_connected(generation, info)
            }
            ServerEvent::BundleLoaded { success, .. } => self.bundle_loaded(success),
            ServerEvent::ClientDisconnected { generation } => self.client_disconnected(generation),
        }
    }

    /// A client completed its handshake. Caches belong to the previous
    /// client and are dropped. Reports for sessions already seen are
    /// ignored.
    pub fn client_connected(&mut self, generation: u64, info: ClientInfo) {
        if generation <= self.session.generation() {
            return;
        }
        info!(generation, arch = %info.arch, kind = %info.kind, "new client session");
        self.session.begin(generation, info);
        self.run_project = self.selected.clone().or_else(|| self.run_project.take());
        self.ui.update_state(BundleState::Connected);
        self.watch_project();
    }

    pub fn bundle_loaded(&mut self, success: bool) {
        if success {
            self.ui.progress("Bundle loaded", None);
            self.ui.update_state(BundleState::Injected);
            let simulator = self.session.info().map(|i| i.kind.is_simulator()).unwrap_or(false);
            if simulator && self.ui.preferences().order_front {
                let simulator_app = self
                    .settings
                    .xcode_path
                    .join("Contents/Developer/Applications/Simulator.app");
                self.open(&simulator_app);
            }
        } else {
            self.transition(InjectionState::LoadingError);
            self.ui.update_state(BundleState::LoadingError);
            self.ui.error("Bundle load failed", None);
        }
    }

    pub fn client_disconnected(&mut self, generation: u64) {
        if generation != self.session.generation() {
            debug!(generation, "stale disconnect");
            return;
        }
        self.ui.progress("Disconnected", None);
        self.ui.update_state(BundleState::Ok);
        self.plugin.watch_project(None);
    }

    fn watch_project(&self) {
        let root = if self.ui.preferences().file_watch {
            self.run_project.as_ref().map(|p| p.project_root.as_path())
        } else {
            None
        };
        self.plugin.watch_project(root);
    }

    fn open(&self, path: &Path) {
        let command = format!("open {}", quoted(path));
        match shell::run_shell(&command, &self.settings.scratch_dir) {
            Ok(output) => {
                for line in output.lines {
                    self.ui.error(line, Some(&path.display().to_string()));
                }
            }
            Err(e) => warn!(error = %e, "could not run open"),
        }
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
