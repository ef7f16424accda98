//! Bundle project builds against the fake xcodebuild

mod fixtures;

use std::fs;

use fixtures::FakeXcode;
use injector::bundler::{BundleBuilder, BundleError, ChangedFile};
use injector::{Preferences, ResourceLocator, Ui};

fn builder(dir: &std::path::Path, xcode: &FakeXcode) -> BundleBuilder {
    let resources = dir.join("Resources");
    fixtures::install_resources(&resources);
    let app = dir.join("App");
    fs::create_dir_all(&app).unwrap();

    let (ui, _rx) = Ui::channel(Preferences::default(), Vec::new());
    BundleBuilder::new(
        dir.join("dd/App-abc/iOSInjectorProject"),
        "iOS",
        "arm64",
        xcode.path.clone(),
        "-configuration Debug -arch arm64 -sdk iphonesimulator".to_string(),
        app,
        Some(dir.join("dd/App-abc/Logs/Build")),
        ResourceLocator::new(resources),
        ui,
    )
}

#[test]
fn test_stale_header_cleans_once_then_fails() {
    let dir = tempfile::tempdir().unwrap();
    let xcode = FakeXcode::install(dir.path());
    xcode.fail_with_stale_pch();
    let builder = builder(dir.path(), &xcode);
    builder.copy_template_if_required().unwrap();

    let result = builder.build();
    match result {
        Err(BundleError::BuildFailed { output }) => {
            assert!(output.contains("has been modified since the precompiled header"))
        }
        other => panic!("expected build failure, got {:?}", other),
    }

    let invocations = xcode.invocations();
    assert_eq!(invocations.len(), 3, "{:?}", invocations);
    assert!(invocations[1].ends_with(" clean"));
    assert!(!builder.commands_file().exists());
}

#[test]
fn test_first_build_records_script() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    let xcode = FakeXcode::install(&root);
    let mut builder = builder(&root, &xcode);

    let changed = [ChangedFile {
        source: "/p/Foo.m".to_string(),
        object: Some("/tmp/injecting_class0_dev.o".to_string()),
    }];
    let built = builder
        .prepare_and_build(&changed, &Preferences::default())
        .unwrap();

    assert_eq!(
        built.path,
        builder.injection_root().join("build/InjectionBundle.bundle")
    );
    assert_eq!(built.identity, None);
    let script = fs::read_to_string(builder.commands_file()).unwrap();
    assert!(script.contains("/usr/bin/touch -c"));
    assert!(script.ends_with(injector::bundler::RECORDED_TRAILER));

    // template is only copied once
    assert!(!builder.copy_template_if_required().unwrap());
}
