//! Stream pump: forwards child output channels to the controller's own streams.
//!
//! A single polling loop services every channel of a job, so no thread is
//! dedicated per stream and the caller gets control back at least once per
//! polling interval to check its stop signal.


use crate::error::PumpError;
use std::io::{self, ErrorKind, Write};
use std::os::fd::{AsRawFd, OwnedFd};
use std::time::Duration;
use tracing::debug;

/// Upper bound on a single read from a channel.
pub const READ_CHUNK_BYTES: usize = 1024;

/// Where a job's primary (stdout) and secondary (stderr) output ends up.
pub trait OutputSinks: Send + Sync {
    fn primary(&self) -> Box<dyn Write + Send>;
    fn secondary(&self) -> Box<dyn Write + Send>;
}

/// Forward to the controlling process's stdout and stderr.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessStreams;

impl OutputSinks for ProcessStreams {
    fn primary(&self) -> Box<dyn Write + Send> {
        Box::new(io::stdout())
    }

    fn secondary(&self) -> Box<dyn Write + Send> {
        Box::new(io::stderr())
    }
}

struct PumpSource {
    stream: &'static str,
    fd: OwnedFd,
    sink: Box<dyn Write + Send>,
}

enum SourceState {
    Open(usize),
    Retired,
}

impl PumpSource {
    /// One bounded read; data goes straight to the sink and is flushed.
    fn service(&mut self) -> Result<SourceState, PumpError> {
        let mut buffer = [0u8; READ_CHUNK_BYTES];
        // SAFETY: fd is owned by this source and buffer outlives the call.
        let n = unsafe {
            libc::read(
                self.fd.as_raw_fd(),
                buffer.as_mut_ptr() as *mut libc::c_void,
                buffer.len(),
            )
        };
        if n > 0 {
            let data = buffer.get(..n as usize).unwrap_or(&[]);
            self.sink
                .write_all(data)
                .and_then(|()| self.sink.flush())
                .map_err(|source| PumpError::Write {
                    stream: self.stream,
                    source,
                })?;
            return Ok(SourceState::Open(data.len()));
        }
        if n == 0 {
            return Ok(SourceState::Retired);
        }
        let err = io::Error::last_os_error();
        if should_retry_read_error(&err) {
            return Ok(SourceState::Open(0));
        }
        if is_channel_closed(&err) {
            return Ok(SourceState::Retired);
        }
        Err(PumpError::Read {
            stream: self.stream,
            source: err,
        })
    }
}

pub(crate) fn should_retry_read_error(err: &io::Error) -> bool {
    err.kind() == ErrorKind::Interrupted || err.kind() == ErrorKind::WouldBlock
}

/// A pty master reports EIO once the child side has been closed.
pub(crate) fn is_channel_closed(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::EIO)
}

/// Polls a set of non-blocking sources and forwards each to its sink.
#[derive(Default)]
pub struct StreamPump {
    sources: Vec<PumpSource>,
}

impl StreamPump {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a readable descriptor. `stream` labels it in logs and errors.
    pub fn add_source(&mut self, stream: &'static str, fd: OwnedFd, sink: Box<dyn Write + Send>) {
        self.sources.push(PumpSource { stream, fd, sink });
    }

    pub fn remaining(&self) -> usize {
        self.sources.len()
    }

    /// True once every source has reached end-of-stream.
    pub fn is_drained(&self) -> bool {
        self.sources.is_empty()
    }

    /// Wait up to `timeout` for any source to become readable and service the ready ones.
    ///
    /// Returns the number of bytes forwarded. Retired sources are dropped, which
    /// closes their descriptors.
    pub fn pump_once(&mut self, timeout: Duration) -> Result<usize, PumpError> {
        if self.sources.is_empty() {
            return Ok(0);
        }
        let mut pollfds: Vec<libc::pollfd> = self
            .sources
            .iter()
            .map(|source| libc::pollfd {
                fd: source.fd.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            })
            .collect();
        let timeout_ms = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;
        // SAFETY: pollfds is a live, correctly sized array of pollfd structs.
        let ready = unsafe {
            libc::poll(
                pollfds.as_mut_ptr(),
                pollfds.len() as libc::nfds_t,
                timeout_ms,
            )
        };
        if ready < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == ErrorKind::Interrupted {
                return Ok(0);
            }
            return Err(PumpError::Poll(err));
        }
        if ready == 0 {
            return Ok(0);
        }

        let mut forwarded = 0;
        let mut retired = Vec::new();
        for (idx, pollfd) in pollfds.iter().enumerate() {
            if pollfd.revents == 0 {
                continue;
            }
            match self.sources[idx].service()? {
                SourceState::Open(bytes) => forwarded += bytes,
                SourceState::Retired => retired.push(idx),
            }
        }
        for idx in retired.into_iter().rev() {
            let source = self.sources.remove(idx);
            debug!(stream = source.stream, "output channel closed");
        }
        Ok(forwarded)
    }
}
