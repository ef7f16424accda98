//! Device injection with a codesign stand-in
//!
//! Kept in its own binary: the test puts a fake `codesign` first on PATH.

mod fixtures;

use std::env;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use fixtures::{Service, TestClient, DEVICE_EXECUTABLE, DEVICE_ROOT, TIMEOUT};
use injector::Preferences;
use injector_protocol::MKDIR;

/// codesign stand-in that blocks until a `release` file appears beside it.
const CODESIGN: &str = r#"#!/bin/bash
here="$(dirname "$0")"
while [ ! -f "$here/release" ]; do sleep 0.05; done
echo "$*" >> "$here/codesign.log"
"#;

fn install_codesign(bin: &Path) {
    fs::create_dir_all(bin).unwrap();
    let script = bin.join("codesign");
    fs::write(&script, CODESIGN).unwrap();
    let mut permissions = fs::metadata(&script).unwrap().permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(&script, permissions).unwrap();

    let path = env::var("PATH").unwrap_or_default();
    env::set_var("PATH", format!("{}:{}", bin.display(), path));
}

#[test]
fn test_session_usable_while_bundle_is_signed() {
    let dir = tempfile::tempdir().unwrap();
    let bin = dir.path().join("bin");
    install_codesign(&bin);

    let bundle = dir.path().join("build/InjectionBundle.bundle");
    fs::create_dir_all(&bundle).unwrap();
    fs::write(bundle.join("InjectionBundle"), "binary").unwrap();

    let service = Service::start(Preferences::default(), Vec::new());
    let mut client = TestClient::connect(service.address, DEVICE_EXECUTABLE, DEVICE_ROOT, "arm64");
    service.next_event();

    let handle = service.client.clone();
    let source = bundle.clone();
    let injecting = thread::spawn(move || {
        handle.inject_bundle(&source, false, Some("Apple Development"), None)
    });

    // signing is blocked; other traffic still goes through
    let (tx, rx) = mpsc::channel();
    let handle = service.client.clone();
    thread::spawn(move || {
        let _ = tx.send(handle.keep_alive().map_err(|e| e.to_string()));
    });
    assert_eq!(rx.recv_timeout(TIMEOUT), Ok(Ok(true)));
    assert_eq!(client.read_command(), "");
    assert!(!bin.join("codesign.log").exists());

    fs::write(bin.join("release"), "").unwrap();
    let artifact = injecting.join().unwrap().unwrap();
    assert_eq!(artifact.sequence_number, 0);
    assert_eq!(artifact.path, dir.path().join("build/InjectionBundle0.bundle"));

    let signed = fs::read_to_string(bin.join("codesign.log")).unwrap();
    assert!(signed.contains("-s Apple Development"), "{}", signed);

    assert_eq!(client.read_command(), "!Injector: Sending to device...");
    let root = client.read_message();
    assert_eq!(root.path, format!(">{}", artifact.loaded_path.display()));
    assert_eq!(root.header.data_length, MKDIR);
    let binary = client.read_message();
    assert_eq!(binary.data.as_deref(), Some(&b"binary"[..]));
    assert_eq!(client.read_command(), artifact.loaded_path.display().to_string());

    thread::sleep(Duration::from_millis(50));
    assert!(service.client.is_connected());
}
