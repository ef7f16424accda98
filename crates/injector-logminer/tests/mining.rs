//! Log mining against gzip-compressed activity logs on disk.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use flate2::write::GzEncoder;
use flate2::Compression;
use injector_logminer::{DummyTarget, LogMiner, MinerError, Mined};
use injector_protocol::ClientKind;

const CLANG: &str =
    "/Applications/Xcode.app/Contents/Developer/Toolchains/XcodeDefault.xctoolchain/usr/bin/clang";
const SWIFTC: &str =
    "/Applications/Xcode.app/Contents/Developer/Toolchains/XcodeDefault.xctoolchain/usr/bin/swift";

fn write_log(dir: &Path, name: &str, lines: &[String], age: Duration) -> PathBuf {
    let path = dir.join(name);
    let file = File::create(&path).unwrap();
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder.write_all(lines.join("\r").as_bytes()).unwrap();
    let file = encoder.finish().unwrap();
    file.set_modified(SystemTime::now() - age).unwrap();
    path
}

// =============================================================================
// Newest-first search
// =============================================================================

#[test]
fn test_older_log_supplies_arch_match() {
    let dir = tempfile::tempdir().unwrap();

    write_log(
        dir.path(),
        "Old.xcactivitylog",
        &[
            "    cd /Users/dev/Proj".to_string(),
            format!("    {CLANG} -x objective-c -arch arm64 -c /Users/dev/Proj/Foo.m -o /build/arm64/Foo.o"),
        ],
        Duration::from_secs(3600),
    );
    write_log(
        dir.path(),
        "New.xcactivitylog",
        &[
            "    cd /Users/dev/Other".to_string(),
            format!("    {CLANG} -x objective-c -arch x86_64 -c /Users/dev/Proj/Foo.m -o /build/x86_64/Foo.o"),
            format!("    {CLANG} -x objective-c -arch arm64 -c /Users/dev/Proj/Bar.m -o /build/arm64/Bar.o"),
        ],
        Duration::from_secs(10),
    );

    let miner = LogMiner::new(Some(dir.path().to_path_buf()), "/Users/dev/Proj");
    let mined = miner
        .find_compile_command("/Users/dev/Proj/Foo.m", "arm64")
        .unwrap();

    let command = mined.command();
    assert!(command.command.starts_with(CLANG));
    assert!(command.command.contains("/build/arm64/Foo.o"));
    assert_eq!(command.working_directory, PathBuf::from("/Users/dev/Proj"));
    assert_eq!(mined.resolved_source(), None);
}

#[test]
fn test_newest_log_wins_when_both_match() {
    let dir = tempfile::tempdir().unwrap();
    let line = |out: &str| {
        format!("{CLANG} -arch arm64 -c /p/Foo.m -o {out}")
    };
    write_log(dir.path(), "A.xcactivitylog", &[line("/old/Foo.o")], Duration::from_secs(600));
    write_log(dir.path(), "B.xcactivitylog", &[line("/new/Foo.o")], Duration::from_secs(5));

    let miner = LogMiner::new(Some(dir.path().to_path_buf()), "/p");
    let mined = miner.find_compile_command("/p/Foo.m", "arm64").unwrap();
    assert!(mined.command().command.ends_with("/new/Foo.o"));
}

#[test]
fn test_line_without_toolchain_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    write_log(
        dir.path(),
        "A.xcactivitylog",
        &["/usr/local/bin/clang -arch arm64 -c /p/Foo.m -o /x/Foo.o".to_string()],
        Duration::from_secs(1),
    );

    let miner = LogMiner::new(Some(dir.path().to_path_buf()), "/p");
    match miner.find_compile_command("/p/Foo.m", "arm64") {
        Err(MinerError::NotFound { source_file, filter }) => {
            assert_eq!(source_file, "/p/Foo.m");
            assert!(filter.contains(" -c "));
        }
        other => panic!("expected NotFound, got {:?}", other),
    }
}

// =============================================================================
// Quoting and escaping in log lines
// =============================================================================

#[test]
fn test_swift_quoted_primary_file() {
    let dir = tempfile::tempdir().unwrap();
    write_log(
        dir.path(),
        "A.xcactivitylog",
        &[
            "    cd \"/Users/dev/My App\"".to_string(),
            format!(
                "{SWIFTC} -frontend -c \"/Users/dev/My App/A.swift\" -primary-file \"/Users/dev/My App/View.swift\" -target arm64-apple-ios9.0 -o /b/View.o"
            ),
        ],
        Duration::from_secs(1),
    );

    let miner = LogMiner::new(Some(dir.path().to_path_buf()), "/Users/dev/My App");
    let mined = miner
        .find_compile_command("/Users/dev/My App/View.swift", "arm64-apple-ios9.0")
        .unwrap();
    assert_eq!(
        mined.command().working_directory,
        PathBuf::from("/Users/dev/My App")
    );
}

#[test]
fn test_bare_name_resolves_escaped_source() {
    let dir = tempfile::tempdir().unwrap();
    write_log(
        dir.path(),
        "A.xcactivitylog",
        &[format!(
            r"{CLANG} -arch x86_64 -c /Users/dev/My\ App/Sources/Widget.m -o /b/Widget.o"
        )],
        Duration::from_secs(1),
    );

    let miner = LogMiner::new(Some(dir.path().to_path_buf()), "/Users/dev");
    let mined = miner.find_compile_command("Widget.m", "x86_64").unwrap();
    assert_eq!(
        mined.resolved_source(),
        Some(Path::new("/Users/dev/My App/Sources/Widget.m"))
    );
}

// =============================================================================
// Interface Builder files
// =============================================================================

#[test]
fn test_storyboard_uses_ibtool_line() {
    let dir = tempfile::tempdir().unwrap();
    write_log(
        dir.path(),
        "A.xcactivitylog",
        &[
            format!("{CLANG} -arch arm64 -c /p/Main.m -o /b/Main.o"),
            "    /usr/bin/ibtool --errors --compilation-directory /b/App.build/Base.lproj /p/Base.lproj/Main.storyboard".to_string(),
        ],
        Duration::from_secs(1),
    );

    let miner = LogMiner::new(Some(dir.path().to_path_buf()), "/p");
    match miner
        .find_compile_command("/p/Base.lproj/Main.storyboard", "arm64")
        .unwrap()
    {
        Mined::Nib {
            command,
            compilation_directory,
        } => {
            assert!(command.command.starts_with("/usr/bin/ibtool "));
            assert_eq!(compilation_directory, Some(PathBuf::from("/b/App.build")));
        }
        other => panic!("expected ibtool command, got {:?}", other),
    }
}

// =============================================================================
// Fallbacks
// =============================================================================

#[test]
fn test_bare_name_miss_synthesizes_dummy() {
    let logs = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    write_log(logs.path(), "A.xcactivitylog", &["nothing here".to_string()], Duration::from_secs(1));

    let miner = LogMiner::new(Some(logs.path().to_path_buf()), "/p").with_dummy_target(DummyTarget {
        xcode_path: PathBuf::from("/Applications/Xcode.app"),
        arch: "arm64".to_string(),
        kind: ClientKind::Device,
        user: "dev".to_string(),
        scratch_dir: scratch.path().to_path_buf(),
        source_template: None,
        command_template: None,
    });

    match miner.find_compile_command("UIView.m", "arm64").unwrap() {
        Mined::Synthesized { command, source } => {
            assert!(source.exists());
            assert!(command.command.contains("iPhoneOS.platform"));
        }
        other => panic!("expected synthesized command, got {:?}", other),
    }
}

#[test]
fn test_missing_logs_reported_before_dummy() {
    let scratch = tempfile::tempdir().unwrap();
    let miner = LogMiner::new(Some(PathBuf::from("/nonexistent/Logs/Build")), "/p")
        .with_dummy_target(DummyTarget {
            xcode_path: PathBuf::from("/Applications/Xcode.app"),
            arch: "arm64".to_string(),
            kind: ClientKind::Simulated,
            user: "dev".to_string(),
            scratch_dir: scratch.path().to_path_buf(),
            source_template: None,
            command_template: None,
        });

    assert!(matches!(
        miner.find_compile_command("UIView.m", "arm64"),
        Err(MinerError::LogsUnavailable(_))
    ));
}
