//! State that lives as long as one client connection.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use injector_logminer::CompileCommand;

use super::eval::strip_module_prefix;
use crate::transport::ClientInfo;

/// Caches tied to the connected client. Its architecture or OS may differ
/// from the last one, so everything is discarded on reconnect.
#[derive(Debug, Default)]
pub struct Session {
    generation: u64,
    info: Option<ClientInfo>,
    compile_commands: HashMap<String, CompileCommand>,
    /// Class file name (`Foo.m`) to the source found for it
    sources_for_classes: HashMap<String, PathBuf>,
    /// ibtool output directory of the last storyboard compiled
    nib_compiled: Option<PathBuf>,
}

impl Session {
    /// Connection generation these caches belong to.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn info(&self) -> Option<&ClientInfo> {
        self.info.as_ref()
    }

    /// Start over for a new connection.
    pub fn begin(&mut self, generation: u64, info: ClientInfo) {
        *self = Self {
            generation,
            info: Some(info),
            ..Self::default()
        };
    }

    pub fn clear_compile_commands(&mut self) {
        self.compile_commands.clear();
    }

    pub fn compile_command(&self, file: &str) -> Option<&CompileCommand> {
        self.compile_commands.get(file)
    }

    pub fn remember_command(&mut self, file: &str, command: CompileCommand) {
        self.compile_commands.insert(file.to_string(), command);
    }

    pub fn remember_source(&mut self, class_file: &str, source: &Path) {
        self.sources_for_classes
            .insert(class_file.to_string(), source.to_path_buf());
    }

    pub fn source_for_file(&self, class_file: &str) -> Option<&Path> {
        self.sources_for_classes.get(class_file).map(PathBuf::as_path)
    }

    /// Source of `class_name`, Swift first. Module prefixes are ignored.
    pub fn source_for_class(&self, class_name: &str) -> Option<&Path> {
        let name = strip_module_prefix(class_name);
        self.source_for_file(&format!("{}.swift", name))
            .or_else(|| self.source_for_file(&format!("{}.m", name)))
    }

    pub fn nib_compiled(&self) -> Option<&Path> {
        self.nib_compiled.as_deref()
    }

    pub fn set_nib_compiled(&mut self, directory: Option<PathBuf>) {
        self.nib_compiled = directory;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use injector_protocol::ClientKind;

    fn info() -> ClientInfo {
        ClientInfo {
            arch: "x86_64".to_string(),
            kind: ClientKind::Simulated,
            executable_path: "/CoreSimulator/App.app/App".to_string(),
            device_root: "/CoreSimulator/home".to_string(),
        }
    }

    #[test]
    fn test_begin_discards_caches() {
        let mut session = Session::default();
        session.remember_command("/p/Foo.m", CompileCommand::new("clang", "/p"));
        session.remember_source("Foo.m", Path::new("/p/Foo.m"));
        session.set_nib_compiled(Some(PathBuf::from("/b")));

        session.begin(2, info());
        assert_eq!(session.generation(), 2);
        assert!(session.compile_command("/p/Foo.m").is_none());
        assert!(session.source_for_file("Foo.m").is_none());
        assert!(session.nib_compiled().is_none());
        assert_eq!(session.info().map(|i| i.arch.as_str()), Some("x86_64"));
    }

    #[test]
    fn test_source_for_class_prefers_swift() {
        let mut session = Session::default();
        session.remember_source("View.m", Path::new("/p/View.m"));
        assert_eq!(session.source_for_class("App.View"), Some(Path::new("/p/View.m")));

        session.remember_source("View.swift", Path::new("/p/View.swift"));
        assert_eq!(session.source_for_class("View"), Some(Path::new("/p/View.swift")));
    }
}
