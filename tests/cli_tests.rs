//! CLI integration tests

use std::path::Path;
use std::process::Command;

use assert_cmd::Command as AssertCommand;
use predicates::prelude::*;
use tempfile::TempDir;

fn capture_deck_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_capture-deck"))
}

/// Binary with config and home pointed at an empty directory
fn isolated(home: &Path) -> AssertCommand {
    let mut cmd = AssertCommand::cargo_bin("capture-deck").expect("binary is built");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env_remove("CAPTURE_DECK_OUTPUT_DIR")
        .env_remove("CAPTURE_DECK_LOG");
    cmd
}

#[test]
fn help_output() {
    let output = capture_deck_bin()
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("record"));
    assert!(stdout.contains("screenshot"));
    assert!(stdout.contains("formats"));
    assert!(stdout.contains("config"));
    assert!(stdout.contains("--verbose"));
}

#[test]
fn version_output() {
    let output = capture_deck_bin()
        .arg("--version")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("capture-deck"));
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn record_help_lists_options() {
    let output = capture_deck_bin()
        .args(["record", "--help"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for flag in ["--mode", "--mic", "--system-audio", "--container", "--max-duration", "--synthetic"] {
        assert!(stdout.contains(flag), "missing {flag} in: {stdout}");
    }
}

#[test]
fn config_path_command() {
    let home = TempDir::new().unwrap();
    isolated(home.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("capture-deck").and(predicate::str::contains("config.toml")));
}

#[test]
fn config_roundtrip_through_file() {
    let home = TempDir::new().unwrap();

    isolated(home.path()).args(["config", "init"]).assert().success();
    #[cfg(target_os = "linux")]
    assert!(home.path().join("config/capture-deck/config.toml").exists());

    isolated(home.path())
        .args(["config", "set", "container", "mp4"])
        .assert()
        .success();
    isolated(home.path())
        .args(["config", "get", "container"])
        .assert()
        .success()
        .stdout("mp4\n");

    isolated(home.path())
        .args(["config", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("frame_rate").and(predicate::str::contains("30")));
}

#[test]
fn config_get_unset_key() {
    let home = TempDir::new().unwrap();
    isolated(home.path())
        .args(["config", "get", "camera_device"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(not set)"));
}

#[test]
fn formats_json_lists_candidates() {
    let home = TempDir::new().unwrap();
    isolated(home.path())
        .env("CAPTURE_DECK_FFMPEG", home.path().join("no-ffmpeg"))
        .args(["formats", "--container", "mp4", "--json"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\"candidates\"")
                .and(predicate::str::contains("video/mp4;codecs=avc1.42E01E,mp4a.40.2"))
                .and(predicate::str::contains("\"ffmpeg\": false"))
                .and(predicate::str::contains("\"selected\": null")),
        );
}

#[test]
fn formats_for_audio_mode() {
    let home = TempDir::new().unwrap();
    isolated(home.path())
        .env("CAPTURE_DECK_FFMPEG", home.path().join("no-ffmpeg"))
        .args(["formats", "--mode", "audio", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("audio/webm;codecs=opus").and(predicate::str::contains("\"mode\": \"audio\"")));
}

#[test]
fn synthetic_screenshot_is_saved() {
    let home = TempDir::new().unwrap();
    let out = home.path().join("shots");

    isolated(home.path())
        .args(["screenshot", "--synthetic", "--json", "-o"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"kind\"").and(predicate::str::contains("image/png")));

    let saved: Vec<_> = std::fs::read_dir(&out).unwrap().collect();
    assert_eq!(saved.len(), 1);
}

#[test]
fn record_in_screenshot_mode_takes_a_screenshot() {
    let home = TempDir::new().unwrap();
    let out = home.path().join("caps");

    isolated(home.path())
        .args(["record", "--mode", "screenshot", "--synthetic", "-o"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains(".png"));

    assert_eq!(std::fs::read_dir(&out).unwrap().count(), 1);
}
