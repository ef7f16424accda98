//! Text edits applied to the bundle project. Pure functions over file
//! contents; reading and writing is left to the caller.

use std::collections::BTreeMap;
use std::path::Path;

use injector_logminer::double_escape;
use regex_lite::{Captures, NoExpand, Regex};

use super::BundleResult;

/// Placeholder in the template's `BundleContents.m` for the injection header.
pub const INCLUDE_PLACEHOLDER: &str = "__INJECTION_INCLUDE__";

/// Point the bootstrap source at the installed `BundleInjection.h`.
pub fn insert_include(contents: &str, header: &Path) -> String {
    contents.replace(INCLUDE_PLACEHOLDER, &header.display().to_string())
}

/// Build the "other linker flags" list, each entry ready to sit inside a
/// quoted string in `project.pbxproj`. Object paths are escaped twice.
pub fn linker_options(
    object_files: &[&str],
    toolchain: &Path,
    log_root: Option<&Path>,
    app_frameworks: Option<&Path>,
) -> Vec<String> {
    let mut options: Vec<String> = object_files.iter().map(|o| double_escape(o)).collect();

    options.push(format!(
        "-L'{}'/usr/lib/swift/\\$(PLATFORM_NAME)",
        toolchain.display()
    ));
    if let Some(log_root) = log_root {
        options.push(format!(
            "-F{}/../../Build/Products/\\$(CONFIGURATION)-\\$(PLATFORM_NAME)",
            log_root.display()
        ));
    }
    if let Some(frameworks) = app_frameworks {
        options.push(format!("-F{}", frameworks.display()));
    }
    options
}

/// Replace everything between `OTHER_LDFLAGS = (` and `"-undefined` with
/// `options`, in every build configuration.
pub fn patch_linker_flags(pbxproj: &str, options: &[String]) -> BundleResult<String> {
    let re = Regex::new(r#"(?s)(OTHER_LDFLAGS = \().*?("-undefined)"#)?;
    let joined = options.join("\", \"");
    let patched = re.replace_all(pbxproj, |caps: &Captures<'_>| {
        format!("{}\"{}\", {}", &caps[1], joined, &caps[2])
    });
    Ok(patched.into_owned())
}

/// Entries of the first `OTHER_LDFLAGS` list ahead of `"-undefined`, with
/// their quotes removed and escapes left as written.
pub fn read_other_ldflags(pbxproj: &str) -> BundleResult<Vec<String>> {
    let section_re = Regex::new(r#"(?s)OTHER_LDFLAGS = \((.*?)"-undefined"#)?;
    let entry_re = Regex::new(r#""((?:[^"\\]|\\.)*)""#)?;

    let Some(section) = section_re.captures(pbxproj).and_then(|c| c.get(1)) else {
        return Ok(Vec::new());
    };
    Ok(entry_re
        .captures_iter(section.as_str())
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect())
}

/// Set the flags argument of `autoLoadedNotify:`.
pub fn patch_notify_flags(contents: &str, flags: i32) -> BundleResult<String> {
    let re = Regex::new(r"(autoLoadedNotify:)\d+")?;
    let patched = re.replace_all(contents, |caps: &Captures<'_>| format!("{}{}", &caps[1], flags));
    Ok(patched.into_owned())
}

/// Replace the trailing `// INJECTING` section with `#import`s of `files`.
pub fn patch_imports(contents: &str, files: &[&str]) -> BundleResult<String> {
    let re = Regex::new(r"(?s)\n(// INJECTING.*|)$")?;
    let mut section = String::from("\n// INJECTING\n\n");
    for file in files {
        section.push_str(&format!("#import \"{}\"\n", file));
    }
    Ok(re.replace(contents, NoExpand(&section)).into_owned())
}

/// Parse `xcodebuild -showBuildSettings` output.
pub fn parse_build_settings(text: &str) -> BundleResult<BTreeMap<String, String>> {
    let re = Regex::new(r"    (\w+) = ([^\n]*)")?;
    Ok(re
        .captures_iter(text)
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .collect())
}

/// Move a `CODESIGNING_FOLDER_PATH` under another `Build/` directory.
pub fn relocate_build_path(path: &str, build_parent: &str) -> BundleResult<String> {
    let re = Regex::new(r"^.*/Build/")?;
    let replacement = format!("{}/Build/", build_parent);
    Ok(re.replace(path, NoExpand(&replacement)).into_owned())
}
