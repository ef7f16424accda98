//! Compile-command recovery from Xcode build-activity logs.
//!
//! Xcode keeps a gzip-compressed transcript of every shell command it ran
//! for recent builds (`*.xcactivitylog`). Given a source file and an
//! architecture, [`LogMiner`] scans those transcripts newest first and
//! returns the exact compiler invocation and working directory used for
//! that file. For eval requests against classes with no local source a
//! dummy translation unit and command are synthesized instead.

mod archive;
mod dummy;
mod error;
mod escape;
mod filter;
mod miner;

pub use archive::{archived_logs, read_log_lines, LOG_EXTENSION};
pub use dummy::{fill_template, DummyTarget, DUMMY_COMMAND_TEMPLATE, DUMMY_SOURCE_TEMPLATE};
pub use error::{MinerError, MinerResult};
pub use escape::{backslash_escape, double_escape, unescape};
pub use filter::{is_interface_builder, FileFilter, SourceLanguage};
pub use miner::{CompileCommand, LogMiner, Mined};

/// Path fragment present in every compiler invocation of interest.
pub const TOOLCHAIN_MARKER: &str = "XcodeDefault.xctoolchain/";

/// Interface Builder compiler path fragment.
pub const IBTOOL_MARKER: &str = "/usr/bin/ibtool ";

/// Prefix of a working-directory change in the transcript.
pub const CD_PREFIX: &str = "    cd ";
