//! Shared helpers for integration tests
//!
//! - A loopback client that performs the handshake the way an app does
//! - A service started on an ephemeral port with channel-backed sinks
//! - A fake Xcode installation (xcodebuild, clang) made of bash scripts
//! - Gzip build-activity logs

#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::net::{SocketAddr, TcpStream};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;
use injector::transport::EventSink;
use injector::{ClientHandle, Preferences, Server, ServerEvent, Ui, UiEvent};
use injector_protocol::{read_frame, read_payload, read_word, write_frame, FrameHeader, MAGIC};

/// How long a test waits on a socket or channel before failing.
pub const TIMEOUT: Duration = Duration::from_secs(10);

pub const SIMULATOR_EXECUTABLE: &str =
    "/Users/dev/Library/Developer/CoreSimulator/Devices/D1/data/Containers/Bundle/Application/A1/App.app/App";
pub const SIMULATOR_ROOT: &str =
    "/Users/dev/Library/Developer/CoreSimulator/Devices/D1/data/Containers/Data/Application/A1";
pub const DEVICE_EXECUTABLE: &str = "/var/mobile/Containers/Bundle/Application/B2/App.app/App";
pub const DEVICE_ROOT: &str = "/var/mobile/Containers/Data/Application/B2";

// =============================================================================
// Service
// =============================================================================

/// A listening service with its event receivers.
pub struct Service {
    pub address: SocketAddr,
    pub client: ClientHandle,
    pub ui: Ui,
    pub ui_events: Receiver<UiEvent>,
    pub events: Receiver<ServerEvent>,
}

impl Service {
    pub fn start(preferences: Preferences, parameters: Vec<String>) -> Self {
        let (ui, ui_events) = Ui::channel(preferences, parameters);
        let client = ClientHandle::new(MAGIC);
        let (tx, events) = mpsc::channel();
        let sink: EventSink = Arc::new(move |event| {
            let _ = tx.send(event);
        });

        let server = Server::listen(
            "127.0.0.1:0",
            client.clone(),
            ui.clone(),
            sink,
            Duration::from_millis(50),
        )
        .unwrap();
        let address = server.local_addr().unwrap();
        server.spawn().unwrap();

        Self {
            address,
            client,
            ui,
            ui_events,
            events,
        }
    }

    pub fn next_event(&self) -> ServerEvent {
        self.events.recv_timeout(TIMEOUT).expect("server event")
    }

    /// Error messages sent to the presentation layer so far.
    pub fn errors(&self) -> Vec<String> {
        self.ui_events
            .try_iter()
            .filter_map(|event| match event {
                UiEvent::Error { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }
}

// =============================================================================
// Loopback client
// =============================================================================

/// One message from the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: FrameHeader,
    pub path: String,
    pub data: Option<Vec<u8>>,
}

/// Architecture string as sent on the wire, NUL-terminated.
pub fn arch_payload(arch: &str) -> Vec<u8> {
    let mut bytes = arch.as_bytes().to_vec();
    bytes.push(0);
    bytes
}

/// The app end of a connection.
pub struct TestClient {
    pub stream: TcpStream,
    /// Status word returned by the handshake
    pub status: i32,
}

impl TestClient {
    /// Handshake as an app at `executable` with the given device root.
    pub fn connect(address: SocketAddr, executable: &str, device_root: &str, arch: &str) -> Self {
        let arch = arch_payload(arch);
        Self::connect_with_preamble(
            address,
            &[(executable, &[][..]), (device_root, arch.as_slice())],
        )
    }

    /// Handshake, then send each `(path, payload)` frame of the preamble
    /// as given.
    pub fn connect_with_preamble(address: SocketAddr, frames: &[(&str, &[u8])]) -> Self {
        let mut stream = TcpStream::connect(address).unwrap();
        stream.set_read_timeout(Some(TIMEOUT)).unwrap();

        FrameHeader::new(0, MAGIC).write_to(&mut stream).unwrap();
        stream.flush().unwrap();
        let status = read_word(&mut stream).unwrap();

        for (path, payload) in frames {
            write_frame(&mut stream, MAGIC, path, Some(*payload)).unwrap();
        }

        Self { stream, status }
    }

    pub fn simulator(address: SocketAddr) -> Self {
        Self::connect(address, SIMULATOR_EXECUTABLE, SIMULATOR_ROOT, "x86_64")
    }

    /// Read the next frame, with its payload when it carries one.
    pub fn read_message(&mut self) -> Message {
        let frame = read_frame(&mut self.stream).unwrap();
        let length = frame.header.data_length;
        let data = if length >= 0 && length != MAGIC {
            Some(read_payload(&mut self.stream, length as usize).unwrap())
        } else {
            None
        };
        Message {
            header: frame.header,
            path: frame.path,
            data,
        }
    }

    /// Read the next path-only command.
    pub fn read_command(&mut self) -> String {
        let message = self.read_message();
        assert_eq!(message.header.data_length, MAGIC, "expected a command, got {:?}", message);
        message.path
    }

    pub fn send_word(&mut self, word: i32) {
        self.stream.write_all(&word.to_ne_bytes()).unwrap();
        self.stream.flush().unwrap();
    }

    pub fn send_bytes(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).unwrap();
        self.stream.flush().unwrap();
    }
}

// =============================================================================
// Fake Xcode
// =============================================================================

fn write_script(path: &Path, body: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, format!("#!/bin/bash\n{}", body)).unwrap();
    let mut permissions = fs::metadata(path).unwrap().permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(path, permissions).unwrap();
}

/// xcodebuild stand-in. Every invocation is appended to `xcodebuild.log`
/// beside it. A build creates `build/InjectionBundle.bundle` in the working
/// directory and prints the touch line the real tool would. If a file named
/// `stale_pch` sits beside the script, builds fail with a stale
/// precompiled header instead.
const XCODEBUILD: &str = r#"here="$(dirname "$0")"
echo "$*" >> "$here/xcodebuild.log"
case "$*" in
  *-showBuildSettings*)
    echo "Build settings for action build and target App:"
    echo "    PRODUCT_NAME = App"
    exit 0;;
  *clean*)
    echo "** CLEAN SUCCEEDED **"
    exit 0;;
esac
if [ -f "$here/stale_pch" ]; then
  echo "fatal error: file '/p/App.h' has been modified since the precompiled header '/b/App.pch' was built"
  exit 65
fi
mkdir -p build/InjectionBundle.bundle
echo "bundle binary" > build/InjectionBundle.bundle/InjectionBundle
echo "/usr/bin/touch -c \"$PWD/build/InjectionBundle.bundle\""
echo "** BUILD SUCCEEDED **"
"#;

/// clang stand-in: copies the file after `-c` to the file after `-o`.
const CLANG: &str = r#"src=""
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    -c) src="$2"; shift;;
    -o) out="$2"; shift;;
  esac
  shift
done
cat "$src" > "$out"
"#;

/// A fake Xcode installation.
pub struct FakeXcode {
    pub path: PathBuf,
}

impl FakeXcode {
    pub fn install(dir: &Path) -> Self {
        let path = dir.join("Xcode.app");
        let xcode = Self { path };
        write_script(&xcode.xcodebuild(), XCODEBUILD);
        write_script(&xcode.clang(), CLANG);
        xcode
    }

    pub fn xcodebuild(&self) -> PathBuf {
        self.path.join("Contents/Developer/usr/bin/xcodebuild")
    }

    pub fn clang(&self) -> PathBuf {
        self.path
            .join("Contents/Developer/Toolchains/XcodeDefault.xctoolchain/usr/bin/clang")
    }

    /// Argument lines xcodebuild was invoked with, in order.
    pub fn invocations(&self) -> Vec<String> {
        let log = self.xcodebuild().with_file_name("xcodebuild.log");
        fs::read_to_string(log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn fail_with_stale_pch(&self) {
        fs::write(self.xcodebuild().with_file_name("stale_pch"), "").unwrap();
    }
}

/// Install an iOS bundle project template and the headers it includes.
pub fn install_resources(resources: &Path) {
    let template = resources.join("iOSBundleTemplate");
    fs::create_dir_all(template.join("InjectionBundle.xcodeproj")).unwrap();
    fs::write(
        template.join("BundleContents.m"),
        "#import \"__INJECTION_INCLUDE__\"\n[BundleInjection autoLoadedNotify:0 hook:0];\n",
    )
    .unwrap();
    fs::write(
        template.join("InjectionBundle.xcodeproj/project.pbxproj"),
        "OTHER_LDFLAGS = (\n\"-undefined\",\ndynamic_lookup,\n);\n",
    )
    .unwrap();
    fs::write(resources.join("BundleInjection.h"), "").unwrap();
    fs::write(resources.join("BundleInterface.h"), "").unwrap();
}

// =============================================================================
// Build logs
// =============================================================================

/// Write a gzip build-activity log with carriage-return separated lines.
pub fn write_build_log(path: &Path, lines: &[String]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut encoder = GzEncoder::new(fs::File::create(path).unwrap(), Compression::default());
    encoder.write_all(lines.join("\r").as_bytes()).unwrap();
    encoder.finish().unwrap();
}

/// A project with one Objective-C source and a log that compiled it.
pub struct FakeProject {
    pub root: PathBuf,
    pub log_root: PathBuf,
    pub source: PathBuf,
}

impl FakeProject {
    pub fn create(dir: &Path, xcode: &FakeXcode) -> Self {
        let root = dir.join("App");
        fs::create_dir_all(root.join("App.xcodeproj")).unwrap();
        let source = root.join("Foo.m");
        fs::write(&source, "@implementation Foo\n@end\n").unwrap();

        let log_root = dir.join("dd/App-abc/Logs/Build");
        write_build_log(
            &log_root.join("1.xcactivitylog"),
            &[
                "CompileC /dd/App-abc/Build/Foo.o Foo.m normal x86_64 objective-c".to_string(),
                format!("    cd {}", root.display()),
                format!(
                    "    {} -x objective-c -arch x86_64 -c {} -o {}/build/Foo.o",
                    xcode.clang().display(),
                    source.display(),
                    root.display()
                ),
            ],
        );

        Self {
            root,
            log_root,
            source,
        }
    }

    pub fn workspace(&self) -> String {
        format!("{}/App.xcodeproj", self.root.display())
    }

    /// Bundle project the engine builds for an iOS client.
    pub fn injection_root(&self) -> PathBuf {
        self.log_root.parent().unwrap().parent().unwrap().join("iOSInjectorProject")
    }
}
