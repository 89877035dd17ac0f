//! What ends up on disk after a package is extracted and cleaned.

use anyhow::Result;
use nupm_cli::package::PackageIdentifier;
use nupm_cli::test_utils::{NupkgBuilder, TestEnvironment};
use std::fs;

fn install(env: &TestEnvironment, id: &str, version: &str) -> Result<()> {
    let mut engine = env.engine()?;
    engine.install(&PackageIdentifier::new(id, version), true)?;
    engine.close();
    Ok(())
}

#[test]
fn test_net_framework_profile_keeps_net45() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.write_config("[framework]\ncompatibility = \"netframework\"\n")?;
    env.publish(
        NupkgBuilder::new("Multi", "1.0.0")
            .file("lib/net45/Multi.dll", b"net45")
            .file("lib/netstandard2.0/Multi.dll", b"ns20")
            .file("lib/net35-unity full v3.5/Multi.dll", b"unity"),
    )?;

    install(&env, "Multi", "1.0.0")?;

    let lib = env.install_dir().join("Multi.1.0.0/lib");
    assert_eq!(fs::read(lib.join("net45/Multi.dll"))?, b"net45");
    assert!(!lib.join("netstandard2.0").exists());
    assert!(!lib.join("net35-unity full v3.5").exists());
    Ok(())
}

#[test]
fn test_default_profile_keeps_netstandard() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.publish(
        NupkgBuilder::new("Multi", "1.0.0")
            .file("lib/net45/Multi.dll", b"net45")
            .file("lib/netstandard1.3/Multi.dll", b"ns13")
            .file("lib/netstandard2.0/Multi.dll", b"ns20"),
    )?;

    install(&env, "Multi", "1.0.0")?;

    let lib = env.install_dir().join("Multi.1.0.0/lib");
    let mut kept: Vec<String> = fs::read_dir(&lib)?
        .map(|e| e.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<std::io::Result<_>>()?;
    kept.sort();
    assert_eq!(kept, vec!["netstandard2.0"]);
    Ok(())
}

#[test]
fn test_unity_siblings_are_kept_together() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.write_config("[framework]\ncompatibility = \"netframework\"\n")?;
    env.publish(
        NupkgBuilder::new("Legacy", "1.0.0")
            .file("lib/net35-unity full v3.5/Legacy.dll", b"full")
            .file("lib/net35-unity subset v3.5/Legacy.dll", b"subset")
            .file("lib/net20/Legacy.dll", b"net20"),
    )?;

    install(&env, "Legacy", "1.0.0")?;

    let lib = env.install_dir().join("Legacy.1.0.0/lib");
    assert!(lib.join("net35-unity full v3.5/Legacy.dll").exists());
    assert!(lib.join("net35-unity subset v3.5/Legacy.dll").exists());
    assert!(!lib.join("net20").exists());
    Ok(())
}

#[test]
fn test_framework_specific_dependency_group() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.publish(
        NupkgBuilder::new("App", "1.0.0")
            .dependency("net45", "OnlyNet45", "1.0")
            .dependency(".NETStandard2.0", "OnlyStandard", "1.0"),
    )?;
    env.publish(NupkgBuilder::new("OnlyStandard", "1.0.0"))?;

    let mut engine = env.engine()?;
    engine.install(&PackageIdentifier::new("App", "1.0.0"), true)?;

    assert!(engine.installed().contains("OnlyStandard"));
    assert!(!engine.installed().contains("OnlyNet45"));
    Ok(())
}

#[test]
fn test_metadata_symbols_and_build_are_stripped() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.publish(
        NupkgBuilder::new("Stripped", "1.0.0")
            .file("lib/netstandard2.0/Stripped.dll", b"dll")
            .file("lib/netstandard2.0/Stripped.pdb", b"pdb")
            .file("build/Stripped.targets", b"<Project />")
            .file("docs/readme.md", b"docs"),
    )?;

    install(&env, "Stripped", "1.0.0")?;

    let dir = env.install_dir().join("Stripped.1.0.0");
    assert!(dir.join("lib/netstandard2.0/Stripped.dll").exists());
    assert!(dir.join("Stripped.1.0.0.nupkg").exists());
    assert!(!dir.join("lib/netstandard2.0/Stripped.pdb").exists());
    assert!(!dir.join("build").exists());
    assert!(!dir.join("docs").exists());
    assert!(!dir.join("_rels").exists());
    assert!(!dir.join("[Content_Types].xml").exists());
    assert!(!dir.join("Stripped.nuspec").exists());
    Ok(())
}

#[test]
fn test_runtimes_keep_primary_architecture() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.publish(
        NupkgBuilder::new("Native", "1.0.0")
            .file("runtimes/win-x64/native/native.dll", b"x64")
            .file("runtimes/win-x86/native/native.dll", b"x86")
            .file("runtimes/linux-x64/native/libnative.so", b"so"),
    )?;

    install(&env, "Native", "1.0.0")?;

    let runtimes = env.install_dir().join("Native.1.0.0/runtimes");
    assert_eq!(fs::read(runtimes.join("win/native/native.dll"))?, b"x64");
    assert!(runtimes.join("linux/native/libnative.so").exists());
    assert!(!runtimes.join("win-x86").exists());
    assert!(!runtimes.join("win-x64").exists());
    Ok(())
}

#[test]
fn test_tools_and_assets_are_relocated() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.publish(
        NupkgBuilder::new("Assets", "1.0.0")
            .file("tools/install.ps1", b"script")
            .file("StreamingAssets/data.bin", b"data")
            .file("Plugins/plugin.so", b"plugin"),
    )?;

    install(&env, "Assets", "1.0.0")?;

    let context = env.context_dir();
    let package_dir = env.install_dir().join("Assets.1.0.0");
    assert!(context.join(".nupm/tools/Assets.1.0.0/install.ps1").exists());
    assert_eq!(fs::read(context.join("StreamingAssets/data.bin"))?, b"data");
    assert_eq!(fs::read(context.join("Plugins/x64/plugin.so"))?, b"plugin");
    assert!(!package_dir.join("tools").exists());
    assert!(!package_dir.join("StreamingAssets").exists());
    assert!(!package_dir.join("Plugins").exists());

    let mut engine = env.engine()?;
    engine.uninstall("Assets", false)?;
    assert!(!context.join(".nupm/tools/Assets.1.0.0").exists());
    Ok(())
}

#[test]
fn test_escaping_entries_are_skipped() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.publish(
        NupkgBuilder::new("Sneaky", "1.0.0")
            .file("lib/netstandard2.0/Sneaky.dll", b"dll")
            .file("../../outside.txt", b"gotcha")
            .file("lib/../../escape.txt", b"gotcha"),
    )?;

    install(&env, "Sneaky", "1.0.0")?;

    assert!(env.install_dir().join("Sneaky.1.0.0/lib/netstandard2.0/Sneaky.dll").exists());
    assert!(!env.install_dir().join("escape.txt").exists());
    assert!(!env.context_dir().join("outside.txt").exists());
    assert!(!env.temp_dir.path().join("outside.txt").exists());
    Ok(())
}

#[test]
fn test_engine_libraries_are_not_installed() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.write_config("engine_libraries = [\"Newtonsoft.Json.dll\"]\n")?;
    env.publish(NupkgBuilder::new("Plugin", "1.0.0").dependency("", "Newtonsoft.Json", "12.0"))?;

    let mut engine = env.engine()?;
    engine.install(&PackageIdentifier::new("Plugin", "1.0.0"), true)?;

    assert!(engine.installed().contains("Plugin"));
    assert!(!engine.installed().contains("Newtonsoft.Json"));
    assert!(!engine.manifest().contains("Newtonsoft.Json"));
    Ok(())
}
