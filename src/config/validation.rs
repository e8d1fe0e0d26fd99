use super::AppConfig;
use crate::job::{CommandSpec, JobTiming};
use crate::phone::PhoneConfig;
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs;
use std::ops::RangeInclusive;
use std::time::Duration;

const STOP_TIMEOUT_RANGE_MS: RangeInclusive<u64> = 100..=60_000;
const TERM_GRACE_RANGE_MS: RangeInclusive<u64> = 10..=10_000;
const KILL_WAIT_RANGE_MS: RangeInclusive<u64> = 10..=10_000;
const POLL_INTERVAL_RANGE_MS: RangeInclusive<u64> = 1..=500;

impl AppConfig {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self> {
        let mut config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Check CLI values and prepare the output directory.
    pub fn validate(&mut self) -> Result<()> {
        check_range("--stop-timeout-ms", self.stop_timeout_ms, STOP_TIMEOUT_RANGE_MS)?;
        check_range("--term-grace-ms", self.term_grace_ms, TERM_GRACE_RANGE_MS)?;
        check_range("--kill-wait-ms", self.kill_wait_ms, KILL_WAIT_RANGE_MS)?;
        check_range("--poll-interval-ms", self.poll_interval_ms, POLL_INTERVAL_RANGE_MS)?;

        // SIGTERM grace plus two SIGKILL windows must fit in one stop wait.
        let escalation_ms = self.term_grace_ms + 2 * self.kill_wait_ms;
        if escalation_ms > self.stop_timeout_ms {
            bail!(
                "--stop-timeout-ms ({}) must cover --term-grace-ms plus two --kill-wait-ms windows ({escalation_ms})",
                self.stop_timeout_ms
            );
        }

        CommandSpec::parse(&self.player_cmd).context("invalid --player-cmd")?;
        CommandSpec::parse(&self.recorder_cmd).context("invalid --recorder-cmd")?;

        if self.greeting.as_os_str().is_empty() {
            bail!("--greeting must not be empty");
        }
        if self.output_dir.as_os_str().is_empty() {
            bail!("--output must not be empty");
        }
        fs::create_dir_all(&self.output_dir).with_context(|| {
            format!(
                "failed to create output directory {}",
                self.output_dir.display()
            )
        })?;
        if !self.output_dir.is_dir() {
            bail!("--output {} is not a directory", self.output_dir.display());
        }

        if let Some(path) = &self.events {
            // FIFOs are accepted; a GPIO daemon may write events into one.
            if !path.exists() || path.is_dir() {
                bail!("--events {} is not a readable file", path.display());
            }
        }
        Ok(())
    }

    pub fn timing(&self) -> JobTiming {
        JobTiming {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            term_grace: Duration::from_millis(self.term_grace_ms),
            kill_wait: Duration::from_millis(self.kill_wait_ms),
        }
    }

    /// Build the phone settings from validated options.
    pub fn phone_config(&self) -> Result<PhoneConfig> {
        Ok(PhoneConfig {
            player_command: CommandSpec::parse(&self.player_cmd)
                .context("invalid --player-cmd")?,
            recorder_command: CommandSpec::parse(&self.recorder_cmd)
                .context("invalid --recorder-cmd")?,
            stop_timeout: Duration::from_millis(self.stop_timeout_ms),
            timing: self.timing(),
        })
    }
}

fn check_range(flag: &str, value: u64, range: RangeInclusive<u64>) -> Result<()> {
    if !range.contains(&value) {
        bail!(
            "{flag} must be between {} and {} ms, got {value}",
            range.start(),
            range.end()
        );
    }
    Ok(())
}
