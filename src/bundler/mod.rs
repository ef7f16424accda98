//! Bundle project assembly
//!
//! Each project gets a per-OS bundle project copied from the installed
//! template, beside its DerivedData logs. Before every build the project's
//! linker flags are pointed at the freshly compiled object files and the
//! bootstrap source is patched with notification flags and `#import`s.
//! The first build runs xcodebuild and records the commands it ran;
//! later builds replay that script until the project file changes.

mod build;
pub mod patch;

pub use build::{scan_build_output, Attempt, BuildScan, RECORDED_TRAILER};

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use injector_logminer::is_interface_builder;
use injector_protocol::NotifyFlags;
use tracing::{debug, info, warn};

use crate::config::Preferences;
use crate::fsutil;
use crate::resources::ResourceLocator;
use crate::shell::{self, quoted};
use crate::ui::Ui;

/// Errors for bundle assembly
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("Could not create {path}")]
    CreateDirectory { path: PathBuf, source: io::Error },

    #[error("Bundle template {0} is not installed")]
    TemplateMissing(String),

    #[error("Template copy error")]
    TemplateCopy {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    #[error("Swift files must have been built in Xcode first")]
    SwiftNotBuilt(String),

    #[error("Bundle build failed")]
    BuildFailed { output: String },

    #[error("Could not determine bundle path")]
    NoBundlePath { output: String },

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex_lite::Error),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

impl BundleError {
    pub fn detail(&self) -> Option<String> {
        match self {
            BundleError::CreateDirectory { path, source } => {
                Some(format!("{}: {}", path.display(), source))
            }
            BundleError::TemplateCopy { from, to, .. } => {
                Some(format!("{} -> {}", from.display(), to.display()))
            }
            BundleError::SwiftNotBuilt(file) => Some(file.clone()),
            BundleError::BuildFailed { output } | BundleError::NoBundlePath { output } => {
                Some(output.clone())
            }
            _ => None,
        }
    }
}

pub type BundleResult<T> = Result<T, BundleError>;

/// A changed file and the object file compiled from it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedFile {
    pub source: String,
    pub object: Option<String>,
}

impl ChangedFile {
    fn is_interface_builder(&self) -> bool {
        is_interface_builder(&self.source)
    }

    fn is_swift(&self) -> bool {
        self.source.ends_with(".swift")
    }
}

/// Result of a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltBundle {
    pub path: PathBuf,
    /// `CODE_SIGN_IDENTITY` from the app's build settings
    pub identity: Option<String>,
}

/// Builds injection bundles in one bundle project.
#[derive(Debug)]
pub struct BundleBuilder {
    /// Bundle project directory (`<OS>InjectorProject`)
    injection_root: PathBuf,
    os_name: String,
    arch: String,
    xcode_path: PathBuf,
    /// `-configuration ... -arch ... [-sdk ...]`
    build_config: String,
    /// The app's project directory
    project_root: PathBuf,
    log_root: Option<PathBuf>,
    resources: ResourceLocator,
    ui: Ui,
    build_settings: Option<BTreeMap<String, String>>,
}

impl BundleBuilder {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        injection_root: PathBuf,
        os_name: &str,
        arch: &str,
        xcode_path: PathBuf,
        build_config: String,
        project_root: PathBuf,
        log_root: Option<PathBuf>,
        resources: ResourceLocator,
        ui: Ui,
    ) -> Self {
        Self {
            injection_root,
            os_name: os_name.to_string(),
            arch: arch.to_string(),
            xcode_path,
            build_config,
            project_root,
            log_root,
            resources,
            ui,
            build_settings: None,
        }
    }

    pub fn injection_root(&self) -> &Path {
        &self.injection_root
    }

    fn pbxproj_file(&self) -> PathBuf {
        self.injection_root
            .join("InjectionBundle.xcodeproj/project.pbxproj")
    }

    fn bundle_contents(&self) -> PathBuf {
        self.injection_root.join("BundleContents.m")
    }

    fn arch_file(&self, name: &str) -> PathBuf {
        self.injection_root.join(&self.arch).join(name)
    }

    /// Recorded build script.
    pub fn commands_file(&self) -> PathBuf {
        self.arch_file("compile_commands.sh")
    }

    /// Marker file, relative to the bundle project.
    fn built_flag(&self) -> String {
        format!("{}/built_flag.txt", self.arch)
    }

    fn toolchain(&self) -> PathBuf {
        self.xcode_path
            .join("Contents/Developer/Toolchains/XcodeDefault.xctoolchain")
    }

    fn xcodebuild(&self) -> String {
        format!(
            "{}/Contents/Developer/usr/bin/xcodebuild {}",
            self.xcode_path.display(),
            self.build_config
        )
    }

    /// Copy `<OS>BundleTemplate` into place unless the bundle project
    /// already exists, then make sure the per-arch directory exists.
    /// Returns whether the template was copied.
    pub fn copy_template_if_required(&self) -> BundleResult<bool> {
        let mut copied = false;

        if !self.injection_root.exists() {
            if let Some(home) = self.injection_root.parent() {
                if !home.exists() {
                    fs::create_dir_all(home).map_err(|source| BundleError::CreateDirectory {
                        path: home.to_path_buf(),
                        source,
                    })?;
                }
            }

            let name = format!("{}BundleTemplate", self.os_name);
            let template = self
                .resources
                .path_for_resource(&name, None)
                .ok_or_else(|| BundleError::TemplateMissing(name.clone()))?;

            info!(from = %template.display(), to = %self.injection_root.display(), "copying bundle template");
            fsutil::copy_tree(&template, &self.injection_root).map_err(|source| {
                BundleError::TemplateCopy {
                    from: template.clone(),
                    to: self.injection_root.clone(),
                    source,
                }
            })?;

            if let Some(header) = self.resources.path_for_resource("BundleInjection", Some("h")) {
                let contents = fs::read_to_string(self.bundle_contents())?;
                fs::write(
                    self.bundle_contents(),
                    patch::insert_include(&contents, &header),
                )?;
            }
            copied = true;
        }

        let arch_dir = self.injection_root.join(&self.arch);
        if !arch_dir.exists() {
            fs::create_dir_all(&arch_dir).map_err(|source| BundleError::CreateDirectory {
                path: arch_dir.clone(),
                source,
            })?;
        }

        Ok(copied)
    }

    /// `xcodebuild -showBuildSettings` for the app, cached per arch.
    fn build_settings(&mut self) -> BundleResult<&BTreeMap<String, String>> {
        if self.build_settings.is_none() {
            let params_file = self.arch_file("build_params.txt");
            if !params_file.exists() {
                let command = format!(
                    "{} -showBuildSettings >{}",
                    self.xcodebuild(),
                    quoted(&params_file)
                );
                self.ui
                    .progress("Fetching project build parameters", Some(&command));
                let output = shell::run_shell(&command, &self.project_root)?;
                if !output.success() {
                    warn!(output = %output.text(), "could not fetch build settings");
                }
            }
            let text = fs::read_to_string(&params_file).unwrap_or_default();
            self.build_settings = Some(patch::parse_build_settings(&text)?);
        }
        Ok(self.build_settings.get_or_insert_with(BTreeMap::new))
    }

    /// Frameworks directory inside the app the project last built.
    fn app_frameworks(&mut self) -> BundleResult<Option<PathBuf>> {
        let log_root = self.log_root.clone();
        let Some(mut app) = self.build_settings()?.get("CODESIGNING_FOLDER_PATH").cloned() else {
            return Ok(None);
        };

        if !Path::new(&app).exists() {
            if let Some(ref log_root) = log_root {
                for relative in ["../..", "../../.."] {
                    let parent = format!("{}/{}", log_root.display(), relative);
                    let alternate = patch::relocate_build_path(&app, &parent)?;
                    if Path::new(&alternate).exists() {
                        self.ui.debug(format!("localAppBundle: {} --> {}", app, alternate));
                        app = alternate;
                    }
                }
            }
        }

        let frameworks = PathBuf::from(app).join("Frameworks");
        Ok(frameworks.exists().then_some(frameworks))
    }

    /// Point the bundle project at `changed` object files and update the
    /// bootstrap source. Any edit to the bootstrap source removes the
    /// built marker so it is recompiled.
    pub fn prepare_to_link(
        &mut self,
        changed: &[ChangedFile],
        preferences: &Preferences,
    ) -> BundleResult<()> {
        let mut flags = NotifyFlags {
            notify: preferences.notify,
            order_front: preferences.order_front,
            storyboard: false,
        };
        let mut objects = Vec::new();
        let mut imports = Vec::new();

        for file in changed {
            if file.is_interface_builder() {
                flags.storyboard = true;
            } else if let Some(ref object) = file.object {
                objects.push(object.as_str());
            } else if file.is_swift() {
                return Err(BundleError::SwiftNotBuilt(file.source.clone()));
            } else {
                imports.push(file.source.as_str());
            }
        }

        let frameworks = self.app_frameworks()?;
        let options = patch::linker_options(
            &objects,
            &self.toolchain(),
            self.log_root.as_deref(),
            frameworks.as_deref(),
        );

        let pbxproj = fs::read_to_string(self.pbxproj_file())?;
        let patched = patch::patch_linker_flags(&pbxproj, &options)?;
        if patched != pbxproj {
            fs::write(self.pbxproj_file(), patched)?;
        }

        let contents = fs::read_to_string(self.bundle_contents())?;
        let updated = patch::patch_imports(
            &patch::patch_notify_flags(&contents, flags.bits())?,
            &imports,
        )?;
        if updated != contents || !imports.is_empty() {
            if updated != contents {
                fs::write(self.bundle_contents(), &updated)?;
            }
            fsutil::remove_tree(&self.injection_root.join(self.built_flag()))?;
        }

        debug!(objects = objects.len(), imports = imports.len(), flags = flags.bits(), "bundle project linked");
        Ok(())
    }

    /// Run the build, cleaning and retrying once if the precompiled header
    /// went stale. Returns the path of the built bundle.
    pub fn build(&self) -> BundleResult<PathBuf> {
        let mut attempt = Attempt::First;
        loop {
            match self.build_once()? {
                Ok(path) => return Ok(path),
                Err((output, stale_pch)) => {
                    fsutil::remove_tree(&self.commands_file())?;
                    match attempt.after_failure(stale_pch) {
                        Some(next) => {
                            self.clean()?;
                            attempt = next;
                        }
                        None => return Err(BundleError::BuildFailed { output }),
                    }
                }
            }
        }
    }

    /// One build. The inner error carries the output and whether it
    /// showed a stale precompiled header.
    fn build_once(&self) -> BundleResult<Result<PathBuf, (String, bool)>> {
        let commands_file = self.commands_file();
        let recording = fsutil::mtime(&self.pbxproj_file()) > fsutil::mtime(&commands_file);

        let command = if recording {
            let touch = format!("touch {}", quoted(&self.bundle_contents()));
            shell::run_shell(&touch, &self.injection_root)?;
            self.xcodebuild()
        } else {
            format!("/bin/bash {}", quoted(&commands_file))
        };

        let message = if recording {
            "Preparing Bundle (first injection is a little slow)"
        } else {
            "Preparing Bundle"
        };
        self.ui.progress(message, Some(&command));
        info!(recording, "building bundle");

        let output = shell::run_shell(&command, &self.injection_root)?;
        let scan = scan_build_output(&output.lines, &self.built_flag())?;

        if !output.success() {
            warn!(stale_pch = scan.stale_pch, "bundle build failed");
            return Ok(Err((output.text(), scan.stale_pch)));
        }

        if recording {
            let mut script = scan.commands;
            script.push_str(RECORDED_TRAILER);
            fs::write(&commands_file, script)?;
        }

        match scan.bundle_path {
            Some(path) => Ok(Ok(PathBuf::from(path))),
            None => Err(BundleError::NoBundlePath {
                output: output.text(),
            }),
        }
    }

    fn clean(&self) -> BundleResult<()> {
        let command = format!("{} clean", self.xcodebuild());
        self.ui.progress("Cleaning project", Some(&command));
        let output = shell::run_shell(&command, &self.injection_root)?;
        if !output.success() {
            warn!(output = %output.text(), "clean failed");
        }
        Ok(())
    }

    /// Template, link, build. The identity is what a device bundle must be
    /// signed with.
    pub fn prepare_and_build(
        &mut self,
        changed: &[ChangedFile],
        preferences: &Preferences,
    ) -> BundleResult<BuiltBundle> {
        self.copy_template_if_required()?;
        self.prepare_to_link(changed, preferences)?;
        let path = self.build()?;
        let identity = self.build_settings()?.get("CODE_SIGN_IDENTITY").cloned();
        Ok(BuiltBundle { path, identity })
    }
}
