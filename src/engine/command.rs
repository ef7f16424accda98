//! Requests for the orchestrator and the line syntax used to type them.

use std::path::PathBuf;

use super::lockout::TriggerSource;
use crate::transport::ServerEvent;

/// One injection to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionRequest {
    pub files: Vec<String>,
    /// Reload the app's root view controller after loading
    pub reset_app: bool,
    pub source: TriggerSource,
    /// Decoded code for an eval request
    pub eval_code: Option<String>,
}

impl InjectionRequest {
    pub fn new(files: Vec<String>, source: TriggerSource) -> Self {
        Self {
            files,
            reset_app: false,
            source,
            eval_code: None,
        }
    }
}

/// Work for the orchestrator thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Inject(InjectionRequest),
    /// `pathID^className^isSwift^percentEncodedCode`
    Eval(String),
    Workspace {
        path: String,
        log_directory: Option<PathBuf>,
        is_alt_ide: bool,
    },
    Reset,
    Patch,
    Unpatch,
    /// Load a plugin's prebuilt loader bundle from this directory
    LoadPluginBundle(PathBuf),
    /// Fetch a file from the client
    Download { remote: String, local: PathBuf },
    Server(ServerEvent),
    Shutdown,
}

/// Errors for command lines
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("{0} needs an argument")]
    MissingArgument(&'static str),
}

/// Parse one line typed on the console. Blank lines give `None`.
pub fn parse_line(line: &str) -> Result<Option<Command>, ParseError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<String> = words.map(str::to_string).collect();

    let files = |name: &'static str| {
        if args.is_empty() {
            Err(ParseError::MissingArgument(name))
        } else {
            Ok(args.clone())
        }
    };

    let command = match verb {
        "inject" => Command::Inject(InjectionRequest::new(files("inject")?, TriggerSource::Editor)),
        "reset-app" => Command::Inject(InjectionRequest {
            reset_app: true,
            ..InjectionRequest::new(files("reset-app")?, TriggerSource::Editor)
        }),
        "watch" => Command::Inject(InjectionRequest::new(files("watch")?, TriggerSource::Watcher)),
        "eval" => {
            let encoded = args.first().ok_or(ParseError::MissingArgument("eval"))?;
            Command::Eval(encoded.clone())
        }
        "workspace" => {
            let path = args.first().ok_or(ParseError::MissingArgument("workspace"))?;
            Command::Workspace {
                path: path.clone(),
                log_directory: args.get(1).map(PathBuf::from),
                is_alt_ide: path.ends_with("idea/misc.xml"),
            }
        }
        "load-plugin" => {
            let dir = args.first().ok_or(ParseError::MissingArgument("load-plugin"))?;
            Command::LoadPluginBundle(PathBuf::from(dir))
        }
        "download" => match (args.first(), args.get(1)) {
            (Some(remote), Some(local)) => Command::Download {
                remote: remote.clone(),
                local: PathBuf::from(local),
            },
            _ => return Err(ParseError::MissingArgument("download")),
        },
        "reset" => Command::Reset,
        "patch" => Command::Patch,
        "unpatch" => Command::Unpatch,
        "quit" | "exit" => Command::Shutdown,
        other => return Err(ParseError::UnknownCommand(other.to_string())),
    };
    Ok(Some(command))
}
