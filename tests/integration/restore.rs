//! Restore runs: reports, partial failure and orphan collection.

use anyhow::Result;
use nupm_cli::installer::InstallState;
use nupm_cli::package::PackageIdentifier;
use nupm_cli::test_utils::{NupkgBuilder, TestEnvironment};
use std::fs;

const EMPTY_MANIFEST: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<packages>\n</packages>\n";

#[test]
fn test_restore_installs_manifest_entries() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.publish(NupkgBuilder::new("Foo", "1.0.0").dependency("", "Bar", "2.0"))?;
    env.publish(NupkgBuilder::new("Bar", "2.0.0"))?;
    env.write_manifest(
        r#"<?xml version="1.0" encoding="utf-8"?>
<packages>
	<package id="Bar" version="2.0.0" />
	<package id="Foo" version="1.0.0" manual="true" />
</packages>
"#,
    )?;

    let mut engine = env.engine()?;
    let report = engine.restore()?;

    assert!(report.is_success());
    assert_eq!(report.installed.len(), 2);
    assert!(report.removed_orphans.is_empty());
    assert!(env.install_dir().join("Foo.1.0.0").is_dir());
    assert!(env.install_dir().join("Bar.2.0.0").is_dir());
    Ok(())
}

#[test]
fn test_restore_continues_after_failure() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.publish(NupkgBuilder::new("Good", "1.0.0"))?;
    env.write_manifest(
        r#"<packages>
	<package id="Good" version="1.0.0" />
	<package id="Missing" version="9.9.9" />
</packages>"#,
    )?;

    let mut engine = env.engine()?;
    let report = engine.restore()?;

    assert!(!report.is_success());
    assert_eq!(report.installed, vec![PackageIdentifier::new("Good", "1.0.0")]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].identity.id, "Missing");
    assert_eq!(engine.state("Missing"), InstallState::Failed);
    assert!(env.install_dir().join("Good.1.0.0").is_dir());
    Ok(())
}

#[test]
fn test_restore_is_idempotent() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.publish(NupkgBuilder::new("Foo", "1.0.0").file("lib/netstandard2.0/Foo.dll", b"v1"))?;
    env.write_manifest(r#"<packages><package id="Foo" version="1.0.0" /></packages>"#)?;

    env.engine()?.restore()?;
    let manifest_before = fs::read_to_string(env.manifest_path())?;

    let mut engine = env.engine()?;
    assert!(engine.installed().contains("Foo"));
    let report = engine.restore()?;

    assert!(report.is_success());
    assert!(report.removed_orphans.is_empty());
    assert_eq!(fs::read_to_string(env.manifest_path())?, manifest_before);
    assert_eq!(fs::read(env.install_dir().join("Foo.1.0.0/lib/netstandard2.0/Foo.dll"))?, b"v1");
    Ok(())
}

#[test]
fn test_restore_collects_orphans() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.publish(NupkgBuilder::new("Old", "1.0.0"))?;

    let mut engine = env.engine()?;
    engine.install(&PackageIdentifier::new("Old", "1.0.0"), true)?;
    engine.close();

    let stray = env.install_dir().join("Stray.0.1.0");
    let linked = env.install_dir().join("~unlinked.MyLib");
    fs::create_dir_all(&stray)?;
    fs::create_dir_all(&linked)?;
    fs::write(linked.join("MyLib.dll"), b"linked")?;
    env.write_manifest(EMPTY_MANIFEST)?;

    let mut engine = env.engine()?;
    let report = engine.restore()?;

    assert!(report.is_success());
    assert_eq!(report.removed_orphans.len(), 2);
    assert!(!env.install_dir().join("Old.1.0.0").exists());
    assert!(!stray.exists());
    assert!(linked.join("MyLib.dll").exists());
    assert!(engine.installed().is_empty());
    Ok(())
}

#[test]
fn test_restore_downgrades_to_pinned_range() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.publish(NupkgBuilder::new("Pinned", "1.5.0"))?;
    env.publish(NupkgBuilder::new("Pinned", "2.0.0"))?;

    let mut engine = env.engine()?;
    engine.install(&PackageIdentifier::new("Pinned", "2.0.0"), true)?;
    engine.close();

    env.write_manifest(r#"<packages><package id="Pinned" version="[1.0,2.0)" manual="true" /></packages>"#)?;
    let mut engine = env.engine()?;
    let report = engine.restore()?;

    assert!(report.is_success());
    assert_eq!(engine.installed().get("Pinned").unwrap().version(), "1.5.0");
    assert!(env.install_dir().join("Pinned.1.5.0").is_dir());
    assert!(!env.install_dir().join("Pinned.2.0.0").exists());
    Ok(())
}

#[test]
fn test_restore_from_cache_when_source_is_gone() -> Result<()> {
    let env = TestEnvironment::new()?;
    let archive = env.publish(NupkgBuilder::new("Offline", "1.0.0"))?;
    env.write_manifest(r#"<packages><package id="Offline" version="1.0.0" /></packages>"#)?;
    env.engine()?.restore()?;

    fs::remove_file(archive)?;
    fs::remove_dir_all(env.install_dir())?;

    let mut engine = env.engine()?;
    let report = engine.restore()?;
    assert!(report.is_success(), "failed: {:?}", report.failed);
    assert!(env.install_dir().join("Offline.1.0.0").is_dir());
    Ok(())
}
