//! Running shell commands with merged output.

use std::io;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};

use tracing::debug;

/// Captured result of a `/bin/bash -c` run.
#[derive(Debug)]
pub struct ShellOutput {
    pub status: ExitStatus,
    /// stdout and stderr interleaved, split into lines
    pub lines: Vec<String>,
}

impl ShellOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// All output, one line per `\n`.
    pub fn text(&self) -> String {
        let mut text = String::new();
        for line in &self.lines {
            text.push_str(line);
            text.push('\n');
        }
        text
    }
}

/// Run `script` with bash in `working_dir`. stderr is folded into stdout so
/// diagnostics keep their position relative to the commands that caused
/// them.
pub fn run_shell(script: &str, working_dir: &Path) -> io::Result<ShellOutput> {
    debug!(dir = %working_dir.display(), script, "running shell command");
    let output = Command::new("/bin/bash")
        .arg("-c")
        .arg(format!("exec 2>&1\n{}", script))
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .output()?;

    let text = String::from_utf8_lossy(&output.stdout);
    Ok(ShellOutput {
        status: output.status,
        lines: text.lines().map(str::to_string).collect(),
    })
}

/// Quote a path for use inside a double-quoted shell word.
pub fn quoted(path: &Path) -> String {
    format!("\"{}\"", path.display())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stderr_is_merged_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let output = run_shell("echo one; echo two >&2; echo three", dir.path()).unwrap();
        assert!(output.success());
        assert_eq!(output.lines, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_failure_status_and_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker"), "x").unwrap();
        let output = run_shell("ls marker && exit 3", dir.path()).unwrap();
        assert!(!output.success());
        assert_eq!(output.status.code(), Some(3));
        assert_eq!(output.text(), "marker\n");
    }
}
