//! Reading bundle build output and deciding whether to retry.

use regex_lite::Regex;

use super::BundleResult;
use injector_logminer::unescape;

/// Where a bundle build stands in the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    First,
    /// Running again after `xcodebuild clean`
    CleanedRetry,
}

impl Attempt {
    /// The attempt to make after a failure, if any. Only a stale
    /// precompiled header on the first attempt earns a retry.
    pub fn after_failure(self, stale_pch: bool) -> Option<Attempt> {
        match (self, stale_pch) {
            (Attempt::First, true) => Some(Attempt::CleanedRetry),
            _ => None,
        }
    }
}

/// What a pass over build output found.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildScan {
    /// Unescaped path of the bundle the build touched
    pub bundle_path: Option<String>,
    /// Replayable script of the compile, link and touch commands
    pub commands: String,
    /// Output suggests the precompiled header must be rebuilt
    pub stale_pch: bool,
}

/// Scan merged build output. `built_flag` is the marker file, relative to
/// the bundle project, that lets a replay skip recompiling
/// `BundleContents.m`.
pub fn scan_build_output(lines: &[String], built_flag: &str) -> BundleResult<BuildScan> {
    let bundle_re = Regex::new(
        r#"/usr/bin/touch -c (?:"([^"]+)"|((?:[^\s\\]|\\.)+))|dsymutil (.+/InjectionBundle.bundle)/InjectionBundle"#,
    )?;
    let compiler_re = Regex::new(r"/usr/bin/(clang|\S*gcc)")?;
    let stale_re = Regex::new(
        r"has been modified since the precompiled header|malformed or corrupted AST file",
    )?;

    let mut scan = BuildScan::default();
    for line in lines {
        let bundle_caps = bundle_re.captures(line);
        if let Some(ref caps) = bundle_caps {
            let path = caps.get(2).or_else(|| caps.get(1)).or_else(|| caps.get(3));
            scan.bundle_path = path.map(|m| unescape(m.as_str()));
        }

        if bundle_caps.is_some() || compiler_re.is_match(line) {
            if line.contains("-header -arch") {
                continue;
            }
            let command = if line.contains("BundleContents.m") {
                format!(
                    "if [[ ! -f {flag} ]]; then {line} && touch {flag}; fi",
                    flag = built_flag,
                    line = line
                )
            } else {
                line.clone()
            };
            scan.commands
                .push_str(&format!("echo \"{}\" && time {} &&\n", command, command));
        } else if stale_re.is_match(line) {
            scan.stale_pch = true;
        }
    }
    Ok(scan)
}

/// Last line of a recorded script.
pub const RECORDED_TRAILER: &str = "echo && echo '** RECORDED BUILD SUCCEEDED **' && echo;\n";

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &[&str]) -> Vec<String> {
        text.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_retry_policy() {
        assert_eq!(Attempt::First.after_failure(true), Some(Attempt::CleanedRetry));
        assert_eq!(Attempt::First.after_failure(false), None);
        assert_eq!(Attempt::CleanedRetry.after_failure(true), None);
    }

    #[test]
    fn test_touch_line_gives_bundle_path() {
        let scan = scan_build_output(
            &lines(&["    /usr/bin/touch -c /dd/My\\ App/Build/InjectionBundle.bundle"]),
            "arm64/built_flag.txt",
        )
        .unwrap();
        assert_eq!(
            scan.bundle_path.as_deref(),
            Some("/dd/My App/Build/InjectionBundle.bundle")
        );
        assert!(scan.commands.starts_with("echo \"    /usr/bin/touch -c"));
    }

    #[test]
    fn test_quoted_touch_and_dsymutil() {
        let quoted = scan_build_output(
            &lines(&["/usr/bin/touch -c \"/dd/App/InjectionBundle.bundle\""]),
            "f",
        )
        .unwrap();
        assert_eq!(quoted.bundle_path.as_deref(), Some("/dd/App/InjectionBundle.bundle"));

        let dsym = scan_build_output(
            &lines(&["dsymutil /dd/App/InjectionBundle.bundle/InjectionBundle -o x.dSYM"]),
            "f",
        )
        .unwrap();
        assert_eq!(dsym.bundle_path.as_deref(), Some("/dd/App/InjectionBundle.bundle"));
    }

    #[test]
    fn test_bundle_contents_guarded_by_flag() {
        let scan = scan_build_output(
            &lines(&[
                "/tc/usr/bin/clang -x objective-c -c /r/BundleContents.m -o /r/BundleContents.o",
                "/tc/usr/bin/clang -x objective-c-header -arch x86_64 /r/Prefix.pch",
                "/tc/usr/bin/clang -bundle -o /r/InjectionBundle",
            ]),
            "x86_64/built_flag.txt",
        )
        .unwrap();

        let script: Vec<&str> = scan.commands.lines().collect();
        assert_eq!(script.len(), 2);
        assert!(script[0].contains("if [[ ! -f x86_64/built_flag.txt ]]; then /tc/usr/bin/clang"));
        assert!(script[0].ends_with("touch x86_64/built_flag.txt; fi &&"));
        assert!(script[1].contains("time /tc/usr/bin/clang -bundle"));
        assert!(!scan.stale_pch);
    }

    #[test]
    fn test_stale_precompiled_header() {
        let scan = scan_build_output(
            &lines(&["fatal error: file '/x/UIKit.h' has been modified since the precompiled header was built"]),
            "f",
        )
        .unwrap();
        assert!(scan.stale_pch);
        assert!(scan.commands.is_empty());
    }
}
