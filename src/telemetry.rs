//! Tracing setup: human-readable console output plus an optional size-capped JSON log file.

use crate::config::AppConfig;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::panic;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;

const LOG_MAX_BYTES: u64 = 5 * 1024 * 1024;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Append-only log file that starts over once it would grow past `max_bytes`.
pub(crate) struct LogWriter {
    path: PathBuf,
    file: File,
    max_bytes: u64,
    bytes_written: u64,
}

impl LogWriter {
    pub(crate) fn open(path: &Path, max_bytes: u64) -> io::Result<Self> {
        let mut bytes_written = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        if bytes_written > max_bytes {
            fs::remove_file(path)?;
            bytes_written = 0;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            max_bytes,
            bytes_written,
        })
    }

    fn truncate_if_needed(&mut self, next_len: usize) -> io::Result<()> {
        if self.bytes_written.saturating_add(next_len as u64) <= self.max_bytes {
            return Ok(());
        }
        self.file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        self.bytes_written = 0;
        Ok(())
    }
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.truncate_if_needed(buf.len())?;
        let written = self.file.write(buf)?;
        self.bytes_written = self.bytes_written.saturating_add(written as u64);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Install the global subscriber once. Later calls are ignored.
pub fn init_tracing(config: &AppConfig) {
    let _ = TRACING_INIT.get_or_init(|| {
        let console_level = if config.debug {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        };
        let console = tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .with_thread_names(true)
            .with_target(false)
            .with_filter(console_level);

        let mut open_error = None;
        let file = config
            .log_file_path()
            .and_then(|path| match LogWriter::open(path, LOG_MAX_BYTES) {
                Ok(writer) => Some(writer),
                Err(err) => {
                    open_error = Some((path.clone(), err));
                    None
                }
            })
            .map(|writer| {
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_timer(UtcTime::rfc_3339())
                    .with_thread_names(true)
                    .with_current_span(false)
                    .with_span_list(false)
                    .with_writer(Mutex::new(writer))
                    .with_filter(LevelFilter::DEBUG)
            });

        let subscriber = tracing_subscriber::registry().with(console).with(file);
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            return;
        }
        if let Some((path, err)) = open_error {
            tracing::warn!(path = %path.display(), error = %err, "log file disabled");
        }
        install_panic_hook();
    });
}

fn install_panic_hook() {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(|text| (*text).to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        tracing::error!(%location, "panic: {payload}");
        previous(info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_writer_appends_to_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phony.log");
        fs::write(&path, b"first\n").unwrap();

        let mut writer = LogWriter::open(&path, 1024).unwrap();
        writer.write_all(b"second\n").unwrap();
        writer.flush().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn log_writer_truncates_past_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phony.log");
        let mut writer = LogWriter::open(&path, 16).unwrap();

        writer.write_all(b"0123456789\n").unwrap();
        writer.write_all(b"abcdefghij\n").unwrap();
        writer.flush().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "abcdefghij\n");
    }

    #[test]
    fn oversized_log_is_discarded_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phony.log");
        fs::write(&path, vec![b'x'; 64]).unwrap();

        let writer = LogWriter::open(&path, 32).unwrap();
        drop(writer);

        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
    }
}
