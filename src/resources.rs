//! Installed resources and text templates.
//!
//! Resources live in one directory: per-OS bundle project templates
//! (`OSXBundleTemplate`, `iOSBundleTemplate`), the headers compiled into
//! bundles and patched projects, plugin loader bundles, and optional
//! overrides for the text templates below.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

/// Text templates with built-in fallbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    /// Connect-back block appended to `main.m`
    MainPatch,
    /// Include block appended to prefix headers and bridging headers
    PchPatch,
    /// Category appended to an Objective-C source for eval
    ObjcEval,
    /// Extension appended to a Swift source for eval
    SwiftEval,
}

impl Template {
    /// File name of the override in the resources directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            Template::MainPatch => "main.patch",
            Template::PchPatch => "pch.patch",
            Template::ObjcEval => "objc.eval",
            Template::SwiftEval => "swift.eval",
        }
    }

    pub fn builtin(&self) -> &'static str {
        match self {
            Template::MainPatch => MAIN_PATCH,
            Template::PchPatch => PCH_PATCH,
            Template::ObjcEval => OBJC_EVAL,
            Template::SwiftEval => SWIFT_EVAL,
        }
    }
}

const MAIN_PATCH: &str = "

// Injector patch starts
#ifdef DEBUG
// connect back to: __IPADDRS__
static const char *_inIPAddresses[] = {__ADDRESSES__, 0};
static const int _inPort = __PORT__;

#define INJECTION_ENABLED
#import \"__INCLUDE__\"
#endif
// Injector patch ends
";

const PCH_PATCH: &str = "

// Injector patch starts
#ifdef DEBUG
#import \"__INCLUDE__\"
#endif
// Injector patch ends
";

const OBJC_EVAL: &str = "

__ADDITIONS_TAG__
#import \"__INTERFACE_HEADER__\"

@implementation __CLASS_NAME__(XprobeEval)

- (void)onXprobeEval {
    __CODE__;
}

@end
";

const SWIFT_EVAL: &str = "

__ADDITIONS_TAG__
extension __CLASS_NAME__ {

    @objc func onXprobeEval() {
        __CODE__
    }

}
";

/// Resolves resource names against the resources directory.
#[derive(Debug, Clone)]
pub struct ResourceLocator {
    root: PathBuf,
}

impl ResourceLocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where `file_name` would be, whether or not it exists.
    pub fn resource_path(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    /// `name.ext` (or just `name`) if it exists.
    pub fn path_for_resource(&self, name: &str, ext: Option<&str>) -> Option<PathBuf> {
        let file_name = match ext {
            Some(ext) => format!("{}.{}", name, ext),
            None => name.to_string(),
        };
        let path = self.root.join(file_name);
        if path.exists() {
            Some(path)
        } else {
            warn!(path = %path.display(), "could not locate resource");
            None
        }
    }

    /// Override from the resources directory, else the built-in text.
    pub fn template(&self, template: Template) -> String {
        let path = self.root.join(template.file_name());
        match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(_) => template.builtin().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_templates_carry_placeholders() {
        assert!(Template::MainPatch.builtin().contains("__ADDRESSES__"));
        assert!(Template::MainPatch.builtin().contains("__PORT__"));
        assert!(Template::PchPatch.builtin().contains("__INCLUDE__"));
        assert!(Template::ObjcEval.builtin().contains("__CODE__"));
        assert!(Template::SwiftEval.builtin().contains("__CLASS_NAME__"));
    }

    #[test]
    fn test_override_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("pch.patch"), "custom __INCLUDE__").unwrap();

        let locator = ResourceLocator::new(dir.path());
        assert_eq!(locator.template(Template::PchPatch), "custom __INCLUDE__");
        assert_eq!(locator.template(Template::MainPatch), MAIN_PATCH);
    }

    #[test]
    fn test_path_for_resource() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("BundleInjection.h"), "").unwrap();

        let locator = ResourceLocator::new(dir.path());
        assert!(locator.path_for_resource("BundleInjection", Some("h")).is_some());
        assert!(locator.path_for_resource("Missing", None).is_none());
    }
}
