//! Dummy translation units for evaluating code against classes that have
//! no local source.

use std::fs;
use std::path::{Path, PathBuf};

use injector_protocol::ClientKind;

use crate::error::MinerResult;
use crate::miner::CompileCommand;

/// Source template. `__HEADER__` and `__CLASS_NAME__` are substituted.
pub const DUMMY_SOURCE_TEMPLATE: &str = "\
//
// Generated for evaluating code against __CLASS_NAME__
//

#import <__HEADER__>

@interface __CLASS_NAME__ : NSObject
@end
";

/// Compile command template for the dummy source.
pub const DUMMY_COMMAND_TEMPLATE: &str = "\
__XCODE__/Contents/Developer/Toolchains/XcodeDefault.xctoolchain/usr/bin/clang \
-x objective-c -arch __ARCH__ -fmodules -fobjc-arc \
-isysroot __XCODE__/Contents/Developer/Platforms/__PLATFORM__.platform/Developer/SDKs/__PLATFORM2__.sdk \
-m__SDK__-version-min=__MINVERS__ -c __SOURCE__ -o __SOURCE__.o";

/// Desktop SDK assumed when the installation lists none.
const DESKTOP_SDK_FALLBACK: &str = "MacOSX10.10";

/// What the dummy command must be built for.
#[derive(Debug, Clone)]
pub struct DummyTarget {
    pub xcode_path: PathBuf,
    pub arch: String,
    pub kind: ClientKind,
    pub user: String,
    pub scratch_dir: PathBuf,
    /// Overrides [`DUMMY_SOURCE_TEMPLATE`].
    pub source_template: Option<String>,
    /// Overrides [`DUMMY_COMMAND_TEMPLATE`].
    pub command_template: Option<String>,
}

impl DummyTarget {
    fn platform(&self) -> &'static str {
        match self.kind {
            ClientKind::Desktop => "MacOSX",
            ClientKind::Simulated => "iPhoneSimulator",
            ClientKind::Device => "iPhoneOS",
        }
    }

    /// Name of the SDK directory (without `.sdk`) inside the platform.
    /// Prefers the unversioned link, then the newest versioned SDK found
    /// in the Xcode installation.
    fn sdk_name(&self) -> String {
        let platform = self.platform();
        let sdks = self
            .xcode_path
            .join("Contents/Developer/Platforms")
            .join(format!("{}.platform", platform))
            .join("Developer/SDKs");
        if sdks.join(format!("{}.sdk", platform)).exists() {
            return platform.to_string();
        }
        match newest_versioned_sdk(&sdks, platform) {
            Some(name) => name,
            None if self.kind.is_desktop() => DESKTOP_SDK_FALLBACK.to_string(),
            None => platform.to_string(),
        }
    }

    fn sdk(&self) -> &'static str {
        match self.kind {
            ClientKind::Desktop => "macosx",
            ClientKind::Simulated => "ios-simulator",
            ClientKind::Device => "iphoneos",
        }
    }

    fn min_version(&self) -> &'static str {
        if self.kind.is_desktop() {
            "10.6"
        } else {
            "6.0"
        }
    }

    fn header(&self) -> &'static str {
        if self.kind.is_desktop() {
            "Cocoa/Cocoa.h"
        } else {
            "UIKit/UIKit.h"
        }
    }

    /// Write the dummy source for `class_file` (e.g. `Foo.m`) and return
    /// the command that compiles it together with the source path.
    pub fn synthesize(&self, class_file: &str) -> MinerResult<(CompileCommand, PathBuf)> {
        let class_name = class_file
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(class_file);
        let source = self
            .scratch_dir
            .join(format!("injection_{}_{}.m", self.user, class_name));

        let source_template = self
            .source_template
            .as_deref()
            .unwrap_or(DUMMY_SOURCE_TEMPLATE);
        let contents = fill_template(
            source_template,
            &[("__HEADER__", self.header()), ("__CLASS_NAME__", class_name)],
        );
        fs::write(&source, contents)?;

        let command_template = self
            .command_template
            .as_deref()
            .unwrap_or(DUMMY_COMMAND_TEMPLATE);
        let xcode = self.xcode_path.display().to_string();
        let sdk_name = self.sdk_name();
        let source_str = source.display().to_string();
        let command = fill_template(
            command_template,
            &[
                ("__XCODE__", xcode.as_str()),
                ("__ARCH__", self.arch.as_str()),
                ("__MINVERS__", self.min_version()),
                ("__PLATFORM2__", sdk_name.as_str()),
                ("__PLATFORM__", self.platform()),
                ("__SOURCE__", source_str.as_str()),
                ("__SDK__", self.sdk()),
            ],
        );

        Ok((
            CompileCommand::new(command, self.scratch_dir.clone()),
            source,
        ))
    }
}

/// `MacOSX10.10` style entries of `sdks`, highest version first.
fn newest_versioned_sdk(sdks: &Path, platform: &str) -> Option<String> {
    let entries = fs::read_dir(sdks).ok()?;
    entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let name = file_name.strip_suffix(".sdk")?.to_string();
            let version: Vec<u32> = name
                .strip_prefix(platform)?
                .split('.')
                .map(|part| part.parse().ok())
                .collect::<Option<_>>()?;
            Some((version, name))
        })
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, name)| name)
}

/// Replace each `(placeholder, value)` pair in order.
pub fn fill_template(template: &str, substitutions: &[(&str, &str)]) -> String {
    substitutions
        .iter()
        .fold(template.to_string(), |text, (key, value)| {
            text.replace(key, value)
        })
}
