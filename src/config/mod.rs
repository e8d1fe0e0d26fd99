//! Command-line parsing and validation helpers.

#[cfg(test)]
mod tests;
mod validation;

use clap::Parser;
use std::path::PathBuf;

use crate::phone::{DEFAULT_PLAYER_CMD, DEFAULT_RECORDER_CMD};

pub const DEFAULT_OUTPUT_DIR: &str = "out";
pub const DEFAULT_GREETING: &str = "greeting.wav";
pub const DEFAULT_STOP_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_TERM_GRACE_MS: u64 = 500;
pub const DEFAULT_KILL_WAIT_MS: u64 = 1_000;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 20;

/// CLI options for the phony message recorder.
#[derive(Debug, Parser, Clone)]
#[command(
    name = "phony",
    about = "Telephone message recorder: plays a greeting when the handset is lifted and records the caller",
    version
)]
pub struct AppConfig {
    /// Directory recordings are written to (created if missing)
    #[arg(short = 'o', long = "output", default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Greeting played when the handset is lifted
    #[arg(long, default_value = DEFAULT_GREETING)]
    pub greeting: PathBuf,

    /// Player command; the greeting path is appended as the last argument
    #[arg(long = "player-cmd", env = "PHONY_PLAYER_CMD", default_value = DEFAULT_PLAYER_CMD)]
    pub player_cmd: String,

    /// Recorder command; the recording path is appended as the last argument
    #[arg(long = "recorder-cmd", env = "PHONY_RECORDER_CMD", default_value = DEFAULT_RECORDER_CMD)]
    pub recorder_cmd: String,

    /// Longest wait for each job when stopping (milliseconds)
    #[arg(long = "stop-timeout-ms", default_value_t = DEFAULT_STOP_TIMEOUT_MS)]
    pub stop_timeout_ms: u64,

    /// Grace period between SIGTERM and SIGKILL (milliseconds)
    #[arg(long = "term-grace-ms", default_value_t = DEFAULT_TERM_GRACE_MS)]
    pub term_grace_ms: u64,

    /// Wait after each SIGKILL before giving up (milliseconds)
    #[arg(long = "kill-wait-ms", default_value_t = DEFAULT_KILL_WAIT_MS)]
    pub kill_wait_ms: u64,

    /// Output polling interval; bounds how fast a stop is noticed (milliseconds)
    #[arg(long = "poll-interval-ms", default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    pub poll_interval_ms: u64,

    /// Read handset events from this file instead of stdin
    #[arg(long, value_name = "PATH")]
    pub events: Option<PathBuf>,

    /// Log at debug level
    #[arg(long, default_value_t = false)]
    pub debug: bool,

    /// Also write JSON logs to this file
    #[arg(long = "log-file", env = "PHONY_LOG_FILE", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Disable file logging (overrides --log-file and PHONY_LOG_FILE)
    #[arg(long = "no-logs", env = "PHONY_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,
}

impl AppConfig {
    /// Log file to write, if file logging is enabled.
    pub fn log_file_path(&self) -> Option<&PathBuf> {
        if self.no_logs {
            return None;
        }
        self.log_file.as_ref()
    }
}
