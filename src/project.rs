//! The workspace currently open in the IDE.
//!
//! Tracks where the project lives, which build-activity logs belong to it,
//! and where its bundle project goes. Also applies and removes the source
//! patches that make an app connect back to the service.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use injector_logminer::LogMiner;
use regex_lite::{NoExpand, Regex};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Errors for workspace handling
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("Could not parse workspace document")]
    Unparsable(String),

    #[error("Could not divine projectFile")]
    ProjectFileMissing(PathBuf),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex_lite::Error),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Walk error: {0}")]
    WalkError(#[from] walkdir::Error),
}

impl ProjectError {
    pub fn detail(&self) -> Option<String> {
        match self {
            ProjectError::Unparsable(path) => Some(path.clone()),
            ProjectError::ProjectFileMissing(root) => Some(root.display().to_string()),
            _ => None,
        }
    }
}

pub type ProjectResult<T> = Result<T, ProjectError>;

/// Pattern splitting a workspace document path into root, file and name.
const WORKSPACE_PATTERN: &str =
    r"^(.+?/([^/]+))/(([^/]*)\.(xcodeproj|xcworkspace|(idea/misc.xml)))";

/// Bundle projects live inside these; they are never patched.
const BUNDLE_PROJECT_PATTERN: &str = r"(Injector|Injection)Project";

/// An Xcode project or workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XcodeProject {
    /// Directory holding the project file
    pub project_root: PathBuf,
    /// Full path of the project or workspace document
    pub project_path: PathBuf,
    /// `Name.xcodeproj` or `Name.xcworkspace`
    pub project_file: String,
    pub project_name: String,
    /// Directory of archived build-activity logs
    pub log_root: Option<PathBuf>,
}

impl XcodeProject {
    /// Parse a workspace document path. For the alternate IDE the path is
    /// its `.idea/misc.xml`; the sibling workspace, else project, is used.
    pub fn open(workspace_path: &str, is_alt_ide: bool) -> ProjectResult<Self> {
        let re = Regex::new(WORKSPACE_PATTERN)?;
        let caps = re
            .captures(workspace_path)
            .ok_or_else(|| ProjectError::Unparsable(workspace_path.to_string()))?;
        let group = |i: usize| caps.get(i).map(|m| m.as_str()).unwrap_or("");

        let project_root = PathBuf::from(group(1));
        let mut project_name = group(4).to_string();
        if project_name.is_empty() {
            project_name = group(2).to_string();
        }

        let (project_file, project_path) = if is_alt_ide || caps.get(6).is_some() {
            let file = ["xcworkspace", "xcodeproj"]
                .iter()
                .map(|ext| format!("{}.{}", project_name, ext))
                .find(|file| project_root.join(file).exists())
                .ok_or_else(|| ProjectError::ProjectFileMissing(project_root.clone()))?;
            let path = project_root.join(&file);
            (file, path)
        } else {
            (group(3).to_string(), PathBuf::from(group(0)))
        };

        debug!(root = %project_root.display(), file = %project_file, "workspace parsed");
        Ok(Self {
            project_root,
            project_path,
            project_file,
            project_name,
            log_root: None,
        })
    }

    pub fn with_log_root(mut self, log_root: Option<PathBuf>) -> Self {
        self.log_root = log_root;
        self
    }

    /// Where Xcode keeps this project's logs, given its DerivedData hash.
    pub fn derived_data_logs(&self, home: &Path, hash: &str) -> PathBuf {
        home.join("Library/Developer/Xcode/DerivedData")
            .join(format!("{}-{}", self.project_name, hash))
            .join("Logs/Build")
    }

    /// `DerivedData/<project>/<OS>InjectorProject`, beside the logs.
    pub fn injection_root(&self, os_name: &str) -> Option<PathBuf> {
        let derived = self.log_root.as_deref()?.parent()?.parent()?;
        Some(derived.join(format!("{}InjectorProject", os_name)))
    }

    /// True for macOS-only projects. Decides which on-demand bundle to load.
    pub fn looks_like_desktop_project(&self) -> bool {
        let pbxproj = self
            .project_root
            .join(format!("{}.xcodeproj", self.project_name))
            .join("project.pbxproj");
        match fs::read_to_string(&pbxproj) {
            Ok(text) => {
                text.contains("MACOSX_DEPLOYMENT_TARGET =")
                    && !text.contains("IPHONEOS_DEPLOYMENT_TARGET =")
            }
            Err(_) => false,
        }
    }

    /// Log miner over this project's logs.
    pub fn miner(&self) -> LogMiner {
        LogMiner::new(self.log_root.clone(), self.project_root.clone())
    }

    /// In every file under the project whose name matches `file_pattern`,
    /// replace the first match of `block` with `with`. Returns the files
    /// that changed.
    pub fn patch_files_matching(
        &self,
        file_pattern: &str,
        block: &Regex,
        with: &str,
    ) -> ProjectResult<Vec<PathBuf>> {
        let file_re = Regex::new(file_pattern)?;
        let skip_re = Regex::new(BUNDLE_PROJECT_PATTERN)?;
        let mut patched = Vec::new();

        let walker = WalkDir::new(&self.project_root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.')
            });

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let path_text = path.to_string_lossy();
            if skip_re.is_match(&path_text) || !file_re.is_match(&path_text) {
                continue;
            }

            let original = fs::read_to_string(path)?;
            let updated = block.replace(&original, NoExpand(with));
            if updated != original {
                info!(file = %path.display(), "patching");
                fs::write(path, updated.as_bytes())?;
                patched.push(path.to_path_buf());
            }
        }

        Ok(patched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_xcodeproj() {
        let project = XcodeProject::open("/Users/dev/Apps/Demo/Demo.xcodeproj", false).unwrap();
        assert_eq!(project.project_root, PathBuf::from("/Users/dev/Apps/Demo"));
        assert_eq!(project.project_file, "Demo.xcodeproj");
        assert_eq!(project.project_name, "Demo");
        assert_eq!(
            project.project_path,
            PathBuf::from("/Users/dev/Apps/Demo/Demo.xcodeproj")
        );
    }

    #[test]
    fn test_open_workspace_with_trailing_contents() {
        let project = XcodeProject::open(
            "/Users/dev/Demo/Demo.xcworkspace/contents.xcworkspacedata",
            false,
        )
        .unwrap();
        assert_eq!(project.project_file, "Demo.xcworkspace");
        assert_eq!(project.project_name, "Demo");
    }

    #[test]
    fn test_unparsable_path() {
        let err = XcodeProject::open("/Users/dev/notes.txt", false).unwrap_err();
        assert!(matches!(err, ProjectError::Unparsable(_)));
        assert_eq!(err.to_string(), "Could not parse workspace document");
    }

    #[test]
    fn test_alt_ide_prefers_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("Demo");
        fs::create_dir_all(root.join(".idea")).unwrap();
        fs::create_dir_all(root.join("Demo.xcodeproj")).unwrap();

        let misc = format!("{}/.idea/misc.xml", root.display());
        let project = XcodeProject::open(&misc, true).unwrap();
        assert_eq!(project.project_name, "Demo");
        assert_eq!(project.project_file, "Demo.xcodeproj");

        fs::create_dir_all(root.join("Demo.xcworkspace")).unwrap();
        let project = XcodeProject::open(&misc, true).unwrap();
        assert_eq!(project.project_file, "Demo.xcworkspace");
    }

    #[test]
    fn test_alt_ide_without_project_file() {
        let dir = tempfile::tempdir().unwrap();
        let misc = format!("{}/Lonely/.idea/misc.xml", dir.path().display());
        let err = XcodeProject::open(&misc, true).unwrap_err();
        assert!(matches!(err, ProjectError::ProjectFileMissing(_)));
    }

    #[test]
    fn test_injection_root_beside_logs() {
        let project = XcodeProject::open("/p/Demo/Demo.xcodeproj", false)
            .unwrap()
            .with_log_root(Some(PathBuf::from("/dd/Demo-abc/Logs/Build")));
        assert_eq!(
            project.injection_root("iOS"),
            Some(PathBuf::from("/dd/Demo-abc/iOSInjectorProject"))
        );
        assert_eq!(
            project.derived_data_logs(Path::new("/Users/dev"), "abc"),
            PathBuf::from("/Users/dev/Library/Developer/Xcode/DerivedData/Demo-abc/Logs/Build")
        );
    }

    #[test]
    fn test_desktop_detection() {
        let dir = tempfile::tempdir().unwrap();
        let proj = dir.path().join("Demo/Demo.xcodeproj");
        fs::create_dir_all(&proj).unwrap();
        fs::write(proj.join("project.pbxproj"), "MACOSX_DEPLOYMENT_TARGET = 10.9;").unwrap();

        let path = format!("{}", proj.display());
        let project = XcodeProject::open(&path, false).unwrap();
        assert!(project.looks_like_desktop_project());

        fs::write(
            proj.join("project.pbxproj"),
            "MACOSX_DEPLOYMENT_TARGET = 10.9;\nIPHONEOS_DEPLOYMENT_TARGET = 8.0;",
        )
        .unwrap();
        assert!(!project.looks_like_desktop_project());
    }

    #[test]
    fn test_patch_skips_bundle_projects() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("Demo");
        fs::create_dir_all(root.join("Sources")).unwrap();
        fs::create_dir_all(root.join("iOSInjectorProject")).unwrap();
        fs::write(root.join("Sources/main.m"), "int main() {}\n").unwrap();
        fs::write(root.join("iOSInjectorProject/main.m"), "int main() {}\n").unwrap();

        let project = XcodeProject::open(&format!("{}/Demo.xcodeproj", root.display()), false).unwrap();
        let block = Regex::new(r"\n*$").unwrap();
        let patched = project
            .patch_files_matching(r"main\.(m|mm)$", &block, "\n// added\n")
            .unwrap();

        assert_eq!(patched, vec![root.join("Sources/main.m")]);
        assert_eq!(
            fs::read_to_string(root.join("iOSInjectorProject/main.m")).unwrap(),
            "int main() {}\n"
        );
    }
}
