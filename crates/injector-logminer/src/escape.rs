//! Path escaping as it appears in Xcode transcripts and shell scripts.

/// Escape `'` and space with a backslash, the way Xcode writes paths in
/// compile commands.
pub fn backslash_escape(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 8);
    for ch in path.chars() {
        if ch == '\'' || ch == ' ' {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Escape twice: once for the project file, once for the shell that runs
/// the linker.
pub fn double_escape(path: &str) -> String {
    backslash_escape(&backslash_escape(path))
}

/// Remove one level of backslash escaping (`\x` → `x`).
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(ch);
        }
    }
    out
}
