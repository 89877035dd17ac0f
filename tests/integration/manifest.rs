//! The manifest file as the engine leaves it.

use anyhow::Result;
use nupm_cli::manifest::Manifest;
use nupm_cli::package::PackageIdentifier;
use nupm_cli::test_utils::{NupkgBuilder, TestEnvironment};
use std::fs;

#[test]
fn test_manifest_written_sorted_with_manual_flags() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.publish(NupkgBuilder::new("Zeta", "1.0.0").dependency("", "Alpha", "0.5"))?;
    env.publish(NupkgBuilder::new("Alpha", "0.5.0"))?;
    env.publish(NupkgBuilder::new("Mid", "3.0.0-rc.1"))?;

    let mut engine = env.engine()?;
    engine.install(&PackageIdentifier::new("Zeta", "1.0.0"), true)?;
    engine.install(&PackageIdentifier::new("Mid", "3.0.0-rc.1"), true)?;
    engine.close();

    let expected = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<packages>\n\
                    \t<package id=\"Alpha\" version=\"0.5.0\" />\n\
                    \t<package id=\"Mid\" version=\"3.0.0-rc.1\" manual=\"true\" />\n\
                    \t<package id=\"Zeta\" version=\"1.0.0\" manual=\"true\" />\n\
                    </packages>\n";
    assert_eq!(fs::read_to_string(env.manifest_path())?, expected);

    let reloaded = Manifest::load(&env.manifest_path())?;
    assert_eq!(reloaded.to_xml(), expected);
    Ok(())
}

#[test]
fn test_range_entry_survives_restore_unchanged() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.publish(NupkgBuilder::new("Lib", "1.4.0"))?;
    let original = r#"<?xml version="1.0" encoding="utf-8"?>
<packages>
  <!-- pinned below 2.0 on purpose -->
  <package id="Lib" version="[1.0,2.0)" manual="true" />
</packages>
"#;
    env.write_manifest(original)?;

    let mut engine = env.engine()?;
    assert!(engine.restore()?.is_success());
    engine.close();

    assert_eq!(fs::read_to_string(env.manifest_path())?, original);
    assert!(env.install_dir().join("Lib.1.4.0").is_dir());
    Ok(())
}

#[test]
fn test_uninstall_rewrites_manifest() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.publish(NupkgBuilder::new("Keep", "1.0.0"))?;
    env.publish(NupkgBuilder::new("Drop", "1.0.0"))?;

    let mut engine = env.engine()?;
    engine.install(&PackageIdentifier::new("Keep", "1.0.0"), true)?;
    engine.install(&PackageIdentifier::new("Drop", "1.0.0"), true)?;
    assert!(engine.uninstall("drop", true)?);
    assert!(!engine.uninstall("drop", true)?);
    engine.close();

    let manifest = Manifest::load(&env.manifest_path())?;
    assert_eq!(manifest.len(), 1);
    assert!(manifest.contains("Keep"));
    assert!(!env.install_dir().join("Drop.1.0.0").exists());
    Ok(())
}

#[test]
fn test_invalid_manifest_is_an_error() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.write_manifest("<project><package id=\"Foo\" version=\"1.0\" /></project>")?;
    assert!(env.engine().is_err());
    Ok(())
}
