//! Enumeration and decompression of archived build logs.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use flate2::read::MultiGzDecoder;

use crate::error::{MinerError, MinerResult};

/// File extension of Xcode build-activity logs.
pub const LOG_EXTENSION: &str = "xcactivitylog";

/// List archived logs in `log_root`, most recently modified first.
pub fn archived_logs(log_root: &Path) -> MinerResult<Vec<PathBuf>> {
    if !log_root.is_dir() {
        return Err(MinerError::LogsUnavailable(log_root.to_path_buf()));
    }

    let mut logs: Vec<(SystemTime, PathBuf)> = Vec::new();
    for entry in fs::read_dir(log_root)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(LOG_EXTENSION) {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        logs.push((modified, path));
    }

    // newest first, name breaks ties so the order is stable
    logs.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
    Ok(logs.into_iter().map(|(_, path)| path).collect())
}

/// Decompress a log and split it into lines. Xcode separates commands with
/// carriage returns; newlines are treated the same way.
pub fn read_log_lines(path: &Path) -> MinerResult<Vec<String>> {
    let file = File::open(path)?;
    let mut decoder = MultiGzDecoder::new(file);
    let mut bytes = Vec::new();
    match decoder.read_to_end(&mut bytes) {
        Ok(_) => {}
        // a log still being written can end mid-stream; use what was read
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {}
        Err(e) => return Err(e.into()),
    }

    let text = String::from_utf8_lossy(&bytes);
    Ok(text
        .split(['\r', '\n'])
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}
