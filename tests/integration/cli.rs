//! The `nupm` binary end to end.

use anyhow::Result;
use assert_cmd::Command;
use nupm_cli::test_utils::{NupkgBuilder, TestEnvironment};
use predicates::prelude::*;

fn nupm(env: &TestEnvironment) -> Command {
    let mut cmd = Command::cargo_bin("nupm").unwrap();
    cmd.current_dir(env.context_dir())
        .env("NUPM_CACHE_DIR", env.cache_dir())
        .env("NUPM_NO_PROGRESS", "1")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_restore_succeeds() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.publish(NupkgBuilder::new("Foo", "1.0.0").file("lib/netstandard2.0/Foo.dll", b"dll"))?;
    env.write_manifest(r#"<packages><package id="Foo" version="1.0.0" /></packages>"#)?;

    nupm(&env)
        .arg("restore")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 package(s) restored"));

    assert!(env.install_dir().join("Foo.1.0.0/lib/netstandard2.0/Foo.dll").exists());
    Ok(())
}

#[test]
fn test_restore_accepts_context_path() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.publish(NupkgBuilder::new("Foo", "1.0.0"))?;
    env.write_manifest(r#"<packages><package id="Foo" version="1.0.0" /></packages>"#)?;

    Command::cargo_bin("nupm")?
        .current_dir(env.temp_dir.path())
        .env("NUPM_CACHE_DIR", env.cache_dir())
        .env("NUPM_NO_PROGRESS", "1")
        .arg("--quiet")
        .arg("restore")
        .arg(env.context_dir())
        .assert()
        .success();

    assert!(env.install_dir().join("Foo.1.0.0").is_dir());
    Ok(())
}

#[test]
fn test_restore_fails_when_a_package_fails() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.publish(NupkgBuilder::new("Good", "1.0.0"))?;
    env.write_manifest(
        r#"<packages>
  <package id="Good" version="1.0.0" />
  <package id="Missing" version="1.0.0" />
</packages>"#,
    )?;

    nupm(&env)
        .arg("restore")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Missing"))
        .stderr(predicate::str::contains("failed to restore"));

    assert!(env.install_dir().join("Good.1.0.0").is_dir());
    Ok(())
}

#[test]
fn test_install_list_uninstall() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.publish(NupkgBuilder::new("Foo", "1.0.0").dependency("", "Bar", "1.0"))?;
    env.publish(NupkgBuilder::new("Bar", "1.0.0"))?;

    nupm(&env).args(["install", "Foo", "--version", "1.0.0"]).assert().success();
    assert!(env.manifest_path().exists());

    nupm(&env)
        .args(["list", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"id\": \"Bar\""))
        .stdout(predicate::str::contains("\"id\": \"Foo\""));

    nupm(&env).args(["uninstall", "Foo"]).assert().success();
    assert!(!env.install_dir().join("Foo.1.0.0").exists());
    assert!(!env.install_dir().join("Bar.1.0.0").exists());

    nupm(&env)
        .args(["uninstall", "Foo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not installed"));
    Ok(())
}

#[test]
fn test_search_local_feed() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.publish(NupkgBuilder::new("Json.Fast", "2.0.0").metadata("description", "Fast JSON parser"))?;
    env.publish(NupkgBuilder::new("Xml.Slow", "1.0.0"))?;

    nupm(&env)
        .args(["search", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Json.Fast"))
        .stdout(predicate::str::contains("Xml.Slow").not());
    Ok(())
}

#[test]
fn test_outdated_check_exit_code() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.publish(NupkgBuilder::new("Foo", "1.0.0"))?;
    nupm(&env).args(["install", "Foo"]).assert().success();

    nupm(&env)
        .args(["outdated", "--check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("up to date"));

    env.publish(NupkgBuilder::new("Foo", "1.1.0"))?;
    nupm(&env)
        .args(["outdated", "--check"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("1.1.0"));
    Ok(())
}

#[test]
fn test_invalid_config_reports_error() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.write_config("metadata_timeout_secs = 0\n")?;

    nupm(&env).arg("restore").assert().failure().stderr(predicate::str::contains("error"));
    Ok(())
}
