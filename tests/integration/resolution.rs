//! Dependency resolution through the install engine.

use anyhow::Result;
use nupm_cli::core::NupmError;
use nupm_cli::installer::InstallState;
use nupm_cli::package::PackageIdentifier;
use nupm_cli::test_utils::{NupkgBuilder, TestEnvironment};

#[test]
fn test_diamond_resolves_to_highest_in_range() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.publish(
        NupkgBuilder::new("P", "1.0.0").dependency("", "Q", "1.0").dependency("", "R", "1.0"),
    )?;
    env.publish(NupkgBuilder::new("Q", "1.0.0").dependency("", "R", "2.0"))?;
    env.publish(NupkgBuilder::new("R", "1.5.0"))?;
    env.publish(NupkgBuilder::new("R", "2.1.0"))?;

    let mut engine = env.engine()?;
    engine.install(&PackageIdentifier::new("P", "1.0.0"), true)?;

    assert_eq!(engine.installed().get("R").unwrap().version(), "2.1.0");
    assert!(env.install_dir().join("R.2.1.0").is_dir());
    assert!(!env.install_dir().join("R.1.5.0").exists());

    let manifest = engine.manifest();
    assert_eq!(manifest.len(), 3);
    assert!(manifest.get("P").unwrap().manually_installed);
    assert!(!manifest.get("Q").unwrap().manually_installed);
    assert!(!manifest.get("R").unwrap().manually_installed);
    Ok(())
}

#[test]
fn test_dependencies_are_installed_before_parent() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.publish(NupkgBuilder::new("App", "1.0.0").dependency("", "Lib", "1.0"))?;
    env.publish(NupkgBuilder::new("Lib", "1.2.0"))?;

    let mut engine = env.engine()?;
    engine.install(&PackageIdentifier::new("App", ""), true)?;

    assert_eq!(engine.state("Lib"), InstallState::Installed);
    assert_eq!(engine.state("App"), InstallState::Installed);
    assert!(env.install_dir().join("Lib.1.2.0").is_dir());
    assert!(env.install_dir().join("App.1.0.0").is_dir());
    Ok(())
}

#[test]
fn test_missing_dependency_aborts_parent() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.publish(NupkgBuilder::new("App", "1.0.0").dependency("", "Ghost", "3.0"))?;

    let mut engine = env.engine()?;
    let err = engine.install(&PackageIdentifier::new("App", "1.0.0"), true).unwrap_err();

    match err.downcast_ref::<NupmError>() {
        Some(NupmError::DependencyFailed { dependency, .. }) => assert!(dependency.contains("Ghost")),
        other => panic!("unexpected error {other:?}: {err:#}"),
    }
    assert_eq!(engine.state("App"), InstallState::Failed);
    assert!(!env.install_dir().join("App.1.0.0").exists());
    assert!(!engine.manifest().contains("App"));
    Ok(())
}

#[test]
fn test_cyclic_dependencies_terminate() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.publish(NupkgBuilder::new("Ping", "1.0.0").dependency("", "Pong", "1.0"))?;
    env.publish(NupkgBuilder::new("Pong", "1.0.0").dependency("", "Ping", "1.0"))?;

    let mut engine = env.engine()?;
    engine.install(&PackageIdentifier::new("Ping", "1.0.0"), true)?;

    assert!(env.install_dir().join("Ping.1.0.0").is_dir());
    assert!(env.install_dir().join("Pong.1.0.0").is_dir());
    Ok(())
}

#[test]
fn test_exclusive_range_skips_upper_bound() -> Result<()> {
    let env = TestEnvironment::new()?;
    for version in ["1.0.0", "1.9.0", "2.0.0"] {
        env.publish(NupkgBuilder::new("Ranged", version))?;
    }

    let mut engine = env.engine()?;
    let package = engine.install(&PackageIdentifier::new("Ranged", "[1.0,2.0)"), true)?;
    assert_eq!(package.version(), "1.9.0");
    Ok(())
}

#[test]
fn test_prerelease_ignored_by_default() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.publish(NupkgBuilder::new("Beta", "1.0.0"))?;
    env.publish(NupkgBuilder::new("Beta", "1.1.0-beta.1"))?;

    let mut engine = env.engine()?;
    let package = engine.install(&PackageIdentifier::new("Beta", ""), true)?;
    assert_eq!(package.version(), "1.0.0");
    Ok(())
}

#[test]
fn test_shared_dependency_survives_uninstall() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.publish(NupkgBuilder::new("A", "1.0.0").dependency("", "Shared", "1.0"))?;
    env.publish(NupkgBuilder::new("B", "1.0.0").dependency("", "Shared", "1.0"))?;
    env.publish(NupkgBuilder::new("Shared", "1.0.0"))?;

    let mut engine = env.engine()?;
    engine.install(&PackageIdentifier::new("A", "1.0.0"), true)?;
    engine.install(&PackageIdentifier::new("B", "1.0.0"), true)?;

    assert!(engine.uninstall("A", true)?);
    assert!(engine.installed().contains("Shared"));
    assert!(env.install_dir().join("Shared.1.0.0").is_dir());
    assert!(!env.install_dir().join("A.1.0.0").exists());

    assert!(engine.uninstall("B", true)?);
    assert!(!engine.installed().contains("Shared"));
    assert!(!engine.manifest().contains("Shared"));
    assert!(!env.install_dir().join("Shared.1.0.0").exists());
    Ok(())
}

#[test]
fn test_uninstall_keeps_manual_dependency() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.publish(NupkgBuilder::new("A", "1.0.0").dependency("", "Core", "1.0"))?;
    env.publish(NupkgBuilder::new("Core", "1.0.0"))?;

    let mut engine = env.engine()?;
    engine.install(&PackageIdentifier::new("Core", "1.0.0"), true)?;
    engine.install(&PackageIdentifier::new("A", "1.0.0"), true)?;

    engine.uninstall("A", true)?;
    assert!(engine.installed().contains("Core"));
    assert!(engine.manifest().get("Core").unwrap().manually_installed);
    Ok(())
}

#[test]
fn test_update_replaces_installed_version() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.publish(NupkgBuilder::new("Foo", "1.0.0"))?;

    let mut engine = env.engine()?;
    engine.install(&PackageIdentifier::new("Foo", "1.0.0"), true)?;

    env.publish(NupkgBuilder::new("Foo", "2.0.0"))?;
    let package = engine.install(&PackageIdentifier::new("Foo", "2.0.0"), false)?;

    assert_eq!(package.version(), "2.0.0");
    assert!(!env.install_dir().join("Foo.1.0.0").exists());
    assert!(env.install_dir().join("Foo.2.0.0").is_dir());
    assert!(engine.manifest().get("Foo").unwrap().manually_installed);
    Ok(())
}

#[test]
fn test_outdated_reports_newer_versions() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.publish(NupkgBuilder::new("Foo", "1.0.0"))?;
    env.publish(NupkgBuilder::new("Bar", "1.0.0"))?;

    let mut engine = env.engine()?;
    engine.install(&PackageIdentifier::new("Foo", "1.0.0"), true)?;
    engine.install(&PackageIdentifier::new("Bar", "1.0.0"), true)?;
    env.publish(NupkgBuilder::new("Foo", "1.1.0"))?;

    let outdated = engine.outdated()?;
    assert_eq!(outdated.len(), 1);
    assert_eq!(outdated[0].0.version(), "1.0.0");
    assert_eq!(outdated[0].1.version(), "1.1.0");
    Ok(())
}

#[test]
fn test_install_without_version_takes_latest_stable() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.publish(NupkgBuilder::new("Lib", "1.2.0"))?;
    env.publish(NupkgBuilder::new("Lib", "1.5.0"))?;
    env.publish(NupkgBuilder::new("Lib", "2.0.0-beta"))?;

    let mut engine = env.engine()?;
    let installed = engine.install(&PackageIdentifier::new("Lib", ""), true)?;

    assert_eq!(installed.version(), "1.5.0");
    assert_eq!(engine.manifest().get("Lib").unwrap().identity.version, "1.5.0");
    assert!(env.install_dir().join("Lib.1.5.0").is_dir());
    Ok(())
}

#[test]
fn test_exclusive_lower_bound_updates_installed_version() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.publish(NupkgBuilder::new("Foo", "1.0.0"))?;
    env.publish(NupkgBuilder::new("Foo", "1.1.0"))?;

    let mut engine = env.engine()?;
    engine.install(&PackageIdentifier::new("Foo", "[1.0.0]"), true)?;
    let updated = engine.install(&PackageIdentifier::new("Foo", "(1.0.0,)"), true)?;

    assert_eq!(updated.version(), "1.1.0");
    assert_eq!(engine.installed().get("Foo").unwrap().version(), "1.1.0");
    assert!(env.install_dir().join("Foo.1.1.0").is_dir());
    assert!(!env.install_dir().join("Foo.1.0.0").exists());
    Ok(())
}

#[test]
fn test_unavailable_update_keeps_installed_version() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.publish(NupkgBuilder::new("Foo", "1.0.0"))?;

    let mut engine = env.engine()?;
    engine.install(&PackageIdentifier::new("Foo", "1.0.0"), true)?;

    let err = engine.install(&PackageIdentifier::new("Foo", "2.0.0"), true).unwrap_err();
    assert!(matches!(err.downcast_ref::<NupmError>(), Some(NupmError::PackageNotFound { .. })));

    assert_eq!(engine.installed().get("Foo").unwrap().version(), "1.0.0");
    assert_eq!(engine.state("Foo"), InstallState::Installed);
    let entry = engine.manifest().get("Foo").unwrap();
    assert_eq!(entry.identity.version, "1.0.0");
    assert!(entry.manually_installed);
    assert!(env.install_dir().join("Foo.1.0.0").is_dir());
    engine.close();

    let mut reopened = env.engine()?;
    assert!(reopened.manifest().contains("Foo"));
    assert!(reopened.restore()?.is_success());
    assert!(env.install_dir().join("Foo.1.0.0").is_dir());
    Ok(())
}

#[test]
fn test_unavailable_downgrade_keeps_installed_version() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.publish(NupkgBuilder::new("Pinned", "2.0.0"))?;

    let mut engine = env.engine()?;
    engine.install(&PackageIdentifier::new("Pinned", "2.0.0"), true)?;
    engine.close();

    let pinned = r#"<packages><package id="Pinned" version="[1.0,2.0)" manual="true" /></packages>"#;
    env.write_manifest(pinned)?;
    let mut engine = env.engine()?;
    let report = engine.restore()?;

    assert_eq!(report.failed.len(), 1);
    assert!(report.removed_orphans.is_empty());
    assert_eq!(engine.installed().get("Pinned").unwrap().version(), "2.0.0");
    assert!(env.install_dir().join("Pinned.2.0.0").is_dir());
    assert_eq!(std::fs::read_to_string(env.manifest_path())?, pinned);
    Ok(())
}
