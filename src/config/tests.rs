use super::AppConfig;
use crate::phone::PhoneConfig;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn config_in(dir: &Path, extra: &[&str]) -> AppConfig {
    let output = dir.join("out");
    let mut args = vec!["test-app", "--output", output.to_str().unwrap()];
    args.extend_from_slice(extra);
    AppConfig::parse_from(args)
}

#[test]
fn defaults_match_the_alsa_setup() {
    let cfg = AppConfig::parse_from(["test-app"]);
    assert_eq!(cfg.output_dir, Path::new("out"));
    assert_eq!(cfg.greeting, Path::new("greeting.wav"));
    assert_eq!(cfg.stop_timeout_ms, 5_000);
    assert_eq!(cfg.term_grace_ms, 500);
    assert_eq!(cfg.kill_wait_ms, 1_000);
    assert_eq!(cfg.poll_interval_ms, 20);
    assert!(!cfg.debug);
    assert!(cfg.events.is_none());
}

#[test]
fn default_commands_match_phone_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_in(dir.path(), &[]);
    assert_eq!(cfg.phone_config().unwrap(), PhoneConfig::default());
}

#[test]
fn short_output_flag_is_accepted() {
    let cfg = AppConfig::parse_from(["test-app", "-o", "/tmp/messages"]);
    assert_eq!(cfg.output_dir, Path::new("/tmp/messages"));
}

#[test]
fn validate_creates_missing_output_dir() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config_in(dir.path(), &[]);
    cfg.validate().unwrap();
    assert!(dir.path().join("out").is_dir());
}

#[test]
fn rejects_output_path_that_is_a_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("out"), b"not a dir").unwrap();
    let mut cfg = config_in(dir.path(), &[]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_stop_timeout_out_of_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config_in(dir.path(), &["--stop-timeout-ms", "99"]);
    assert!(cfg.validate().is_err());

    let mut cfg = config_in(dir.path(), &["--stop-timeout-ms", "60001"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_zero_poll_interval() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config_in(dir.path(), &["--poll-interval-ms", "0"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_escalation_longer_than_stop_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config_in(
        dir.path(),
        &[
            "--stop-timeout-ms",
            "1000",
            "--term-grace-ms",
            "500",
            "--kill-wait-ms",
            "300",
        ],
    );
    let err = cfg.validate().unwrap_err();
    assert!(err.to_string().contains("--stop-timeout-ms"));

    let mut cfg = config_in(
        dir.path(),
        &[
            "--stop-timeout-ms",
            "1100",
            "--term-grace-ms",
            "500",
            "--kill-wait-ms",
            "300",
        ],
    );
    assert!(cfg.validate().is_ok());
}

#[test]
fn rejects_unparsable_commands() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config_in(dir.path(), &["--player-cmd", "aplay 'unterminated"]);
    assert!(cfg.validate().is_err());

    let mut cfg = config_in(dir.path(), &["--recorder-cmd", "   "]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_missing_events_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("events.txt");
    let mut cfg = config_in(dir.path(), &["--events", missing.to_str().unwrap()]);
    assert!(cfg.validate().is_err());
}

#[test]
fn phone_config_carries_custom_commands_and_timing() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config_in(
        dir.path(),
        &[
            "--player-cmd",
            "mpv --no-video",
            "--recorder-cmd",
            "sox -d",
            "--stop-timeout-ms",
            "3000",
            "--term-grace-ms",
            "250",
            "--kill-wait-ms",
            "400",
            "--poll-interval-ms",
            "5",
        ],
    );
    cfg.validate().unwrap();
    let phone = cfg.phone_config().unwrap();

    assert_eq!(phone.player_command.program(), "mpv");
    assert_eq!(phone.player_command.args(), ["--no-video"]);
    assert_eq!(phone.recorder_command.to_string(), "sox -d");
    assert_eq!(phone.stop_timeout, Duration::from_millis(3000));
    assert_eq!(phone.timing.term_grace, Duration::from_millis(250));
    assert_eq!(phone.timing.kill_wait, Duration::from_millis(400));
    assert_eq!(phone.timing.poll_interval, Duration::from_millis(5));
}

#[test]
fn no_logs_overrides_log_file() {
    let cfg = AppConfig::parse_from(["test-app", "--log-file", "/tmp/phony.log"]);
    assert_eq!(cfg.log_file_path(), Some(&PathBuf::from("/tmp/phony.log")));

    let cfg = AppConfig::parse_from(["test-app", "--log-file", "/tmp/phony.log", "--no-logs"]);
    assert!(cfg.log_file_path().is_none());
}
