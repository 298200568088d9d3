#![allow(clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::{predicate::str::contains, PredicateBooleanExt};
use tempfile::TempDir;

mod record_operations;

fn isolated(temp_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("occtax").unwrap();
    cmd.env("XDG_CONFIG_HOME", temp_dir.path().join("config"))
        .env("XDG_DATA_HOME", temp_dir.path().join("data"));
    cmd
}

#[test]
fn test_profile_arg() {
    // --profile-path wins over OCCTAX_PROFILE
    let temp_dir = TempDir::new().unwrap();

    let assert = isolated(&temp_dir)
        .env("OCCTAX_PROFILE", "wrong_profile")
        .args(["--profile-path", "test_profile_arg"])
        .arg("config")
        .assert();

    assert.success().stdout(
        contains(r#""profile_name": "test_profile_arg""#)
            .and(contains(r#""profile_exists": false"#))
            .and(contains("test_profile_arg/inputs")),
    );
}

#[test]
fn test_profile_env() {
    let temp_dir = TempDir::new().unwrap();

    let assert = isolated(&temp_dir)
        .env("OCCTAX_PROFILE", "test_profile_env")
        .arg("config")
        .assert();

    assert
        .success()
        .stdout(contains(r#""profile_name": "test_profile_env""#).and(contains(r#""inputs_dir""#)));
}

#[test]
fn test_default_profile() {
    let temp_dir = TempDir::new().unwrap();

    let assert = isolated(&temp_dir)
        .env_remove("OCCTAX_PROFILE")
        .arg("config")
        .assert();

    assert
        .success()
        .stdout(contains(r#""profile_name": "default""#));
}
