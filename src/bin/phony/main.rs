//! phony entrypoint: plays the greeting when the handset is lifted, records the
//! caller, and stops both when the handset is replaced.
//!
//! Handset events arrive as lines on stdin (or `--events <file>`); see
//! `phony::handset` for the accepted words.

mod signals;

use anyhow::{Context, Result};
use chrono::Local;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use phony::config::AppConfig;
use phony::handset::{open_event_source, spawn_event_reader, HandsetEvent};
use phony::init_tracing;
use phony::job::signal_name;
use phony::naming::next_recording_path;
use phony::phone::Phone;
use std::time::Duration;
use tracing::{error, info};

/// Max handset events buffered ahead of the loop.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// How often the loop checks for SIGINT/SIGTERM while idle.
const SIGNAL_POLL: Duration = Duration::from_millis(100);

fn main() -> Result<()> {
    let config = AppConfig::parse_args()?;
    init_tracing(&config);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        output = %config.output_dir.display(),
        "phony started at {}",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    signals::install_shutdown_handlers()?;

    let mut phone = Phone::new(config.phone_config()?);
    let reader = open_event_source(config.events.as_deref())?;
    let (events, _reader) = spawn_event_reader(reader, EVENT_CHANNEL_CAPACITY)
        .context("failed to start handset reader")?;

    let result = match run_event_loop(&config, &mut phone, &events) {
        Ok(()) => phone
            .stop()
            .map(drop)
            .context("failed to stop play and record jobs on exit"),
        // The loop only fails on a stop that left jobs attached; waiting again would only delay exit.
        Err(err) => Err(err),
    };
    info!("phony stopped at {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
    result
}

fn run_event_loop(
    config: &AppConfig,
    phone: &mut Phone,
    events: &Receiver<HandsetEvent>,
) -> Result<()> {
    loop {
        if let Some(signal) = signals::take_shutdown() {
            info!("received {}; shutting down", signal_name(signal));
            return Ok(());
        }
        let event = match events.recv_timeout(SIGNAL_POLL) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return Ok(()),
        };
        match event {
            HandsetEvent::Lifted => handset_lifted(config, phone),
            HandsetEvent::Replaced => {
                info!("handset replaced");
                phone
                    .stop()
                    .context("failed to stop play and record jobs")?;
            }
            HandsetEvent::Quit => {
                info!("quit requested");
                return Ok(());
            }
        }
    }
}

/// Play the greeting and start recording the next message.
fn handset_lifted(config: &AppConfig, phone: &mut Phone) {
    info!("handset lifted");
    let target = match next_recording_path(&config.output_dir, Local::now().naive_local()) {
        Ok(path) => path,
        Err(err) => {
            error!("cannot pick a recording name: {err:#}");
            return;
        }
    };

    if let Err(err) = phone.play(&config.greeting.to_string_lossy()) {
        error!(error = %err, "failed to start greeting playback");
    }
    info!(path = %target.display(), "recording message");
    if let Err(err) = phone.record(&target.to_string_lossy()) {
        error!(error = %err, "failed to start recording");
    }
}
