//! The log scanner proper.

use std::path::{Path, PathBuf};

use regex_lite::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::archive::{archived_logs, read_log_lines};
use crate::dummy::DummyTarget;
use crate::error::{MinerError, MinerResult};
use crate::escape::{backslash_escape, unescape};
use crate::filter::{FileFilter, SourceLanguage};
use crate::{CD_PREFIX, IBTOOL_MARKER, TOOLCHAIN_MARKER};

/// A shell command and the directory it must run in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileCommand {
    pub command: String,
    pub working_directory: PathBuf,
}

impl CompileCommand {
    pub fn new(command: impl Into<String>, working_directory: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            working_directory: working_directory.into(),
        }
    }

    /// `cd "<dir>" && <command>`, ready for `bash -c`.
    pub fn shell_line(&self) -> String {
        format!(
            "cd \"{}\" && {}",
            self.working_directory.display(),
            self.command
        )
    }

    /// Same command writing its object file to `object_path`. Everything
    /// after the first ` -o ` is replaced; commands without one (ibtool)
    /// are left alone.
    pub fn with_output(&self, object_path: &str) -> MinerResult<Self> {
        let re = Regex::new(r" -o .*$")?;
        let output = format!(" -o {}", backslash_escape(object_path));
        let command = re.replace(&self.command, NoExpand(&output)).into_owned();
        Ok(Self {
            command,
            working_directory: self.working_directory.clone(),
        })
    }
}

/// Outcome of a successful search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mined {
    /// Compiler invocation found in a log. `resolved_source` is set when the
    /// search was by bare file name.
    Compile {
        command: CompileCommand,
        resolved_source: Option<PathBuf>,
    },
    /// ibtool invocation for a storyboard or xib.
    Nib {
        command: CompileCommand,
        compilation_directory: Option<PathBuf>,
    },
    /// No log entry; a dummy source was written and a command made for it.
    Synthesized {
        command: CompileCommand,
        source: PathBuf,
    },
}

impl Mined {
    pub fn command(&self) -> &CompileCommand {
        match self {
            Mined::Compile { command, .. }
            | Mined::Nib { command, .. }
            | Mined::Synthesized { command, .. } => command,
        }
    }

    /// Source path discovered for a bare-name search.
    pub fn resolved_source(&self) -> Option<&Path> {
        match self {
            Mined::Compile {
                resolved_source, ..
            } => resolved_source.as_deref(),
            Mined::Synthesized { source, .. } => Some(source),
            Mined::Nib { .. } => None,
        }
    }
}

/// Scans the archived logs of one project.
#[derive(Debug, Clone)]
pub struct LogMiner {
    log_root: Option<PathBuf>,
    project_root: PathBuf,
    dummy: Option<DummyTarget>,
}

impl LogMiner {
    pub fn new(log_root: Option<PathBuf>, project_root: impl Into<PathBuf>) -> Self {
        Self {
            log_root,
            project_root: project_root.into(),
            dummy: None,
        }
    }

    /// Enable dummy synthesis for bare class names with no log entry.
    pub fn with_dummy_target(mut self, target: DummyTarget) -> Self {
        self.dummy = Some(target);
        self
    }

    /// Find the command that last compiled `source_file` for `arch`.
    ///
    /// `source_file` is either an absolute path or a bare file name such as
    /// `Foo.m`. The newest log is scanned first and the first match wins.
    pub fn find_compile_command(&self, source_file: &str, arch: &str) -> MinerResult<Mined> {
        let log_root = self.log_root.as_deref().ok_or(MinerError::NoLogDirectory)?;
        let logs = archived_logs(log_root)?;
        let filter = FileFilter::new(source_file);

        if filter.has_full_path() {
            info!(file = %filter.filename(), logs = logs.len(), "learning compile command");
        }

        let found = if filter.language() == SourceLanguage::InterfaceBuilder {
            self.scan_for_nib(&logs, &filter)?
        } else {
            self.scan_for_compile(&logs, &filter, arch)?
        };

        if let Some(mined) = found {
            return Ok(mined);
        }

        if !filter.has_full_path() {
            if let Some(ref target) = self.dummy {
                debug!(class = source_file, "no log entry, synthesizing dummy source");
                let (command, source) = target.synthesize(source_file)?;
                return Ok(Mined::Synthesized { command, source });
            }
        }

        Err(MinerError::NotFound {
            source_file: source_file.to_string(),
            filter: filter.compile_pattern(),
        })
    }

    fn scan_for_nib(&self, logs: &[PathBuf], filter: &FileFilter) -> MinerResult<Option<Mined>> {
        let file_re = filter.file_regex()?;
        let dir_re = Regex::new(r"-compilation-directory (.*?)/\w+\.lproj")?;

        for log in logs {
            debug!(log = %log.display(), "scanning build log for ibtool");
            for line in read_log_lines(log)? {
                if !filter.may_mention(&line) {
                    continue;
                }
                if line.contains(IBTOOL_MARKER) && file_re.is_match(&line) {
                    let compilation_directory = dir_re
                        .captures(&line)
                        .and_then(|c| c.get(1))
                        .map(|m| PathBuf::from(unescape(m.as_str())));
                    return Ok(Some(Mined::Nib {
                        command: CompileCommand::new(line.trim(), self.project_root.clone()),
                        compilation_directory,
                    }));
                }
            }
        }

        Ok(None)
    }

    fn scan_for_compile(
        &self,
        logs: &[PathBuf],
        filter: &FileFilter,
        arch: &str,
    ) -> MinerResult<Option<Mined>> {
        let compile_re = filter.compile_regex()?;
        let arch_token = format!(" {}", arch);
        debug!(pattern = %filter.compile_pattern(), "compile filter");

        // the working directory carries over from one line to the next
        let mut chdir = self.project_root.display().to_string();

        for log in logs {
            debug!(log = %log.display(), "scanning build log");
            for line in read_log_lines(log)? {
                if let Some(dir) = line.strip_prefix(CD_PREFIX) {
                    chdir = dir.to_string();
                    continue;
                }
                if !filter.may_mention(&line) {
                    continue;
                }
                if !line.contains(TOOLCHAIN_MARKER) || !line.contains(&arch_token) {
                    continue;
                }
                let Some(caps) = compile_re.captures(&line) else {
                    continue;
                };

                let resolved_source = if filter.has_full_path() {
                    None
                } else {
                    caps.get(1)
                        .map(|m| PathBuf::from(m.as_str()))
                        .or_else(|| caps.get(2).map(|m| PathBuf::from(unescape(m.as_str()))))
                };

                let working_directory = chdir.trim().trim_matches('"').to_string();
                debug!(log = %log.display(), directory = %working_directory, "compile command found");
                return Ok(Some(Mined::Compile {
                    command: CompileCommand::new(line.trim(), working_directory),
                    resolved_source,
                }));
            }
        }

        Ok(None)
    }
}
