//! Error taxonomy for pumping, job lifecycle and coordinated shutdown.

use crate::job::Role;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Fatal conditions raised while forwarding a child's output.
#[derive(Debug, Error)]
pub enum PumpError {
    #[error("poll on output channels failed: {0}")]
    Poll(#[source] io::Error),

    #[error("read from {stream} channel failed: {source}")]
    Read {
        stream: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("write to {stream} sink failed: {source}")]
    Write {
        stream: &'static str,
        #[source]
        source: io::Error,
    },
}

/// Why a job ended in the failed state. Every variant names the command it ran.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("invalid command '{command}': {reason}")]
    InvalidCommand { command: String, reason: String },

    #[error("failed to allocate terminal channel for '{command}': {source}")]
    Channel {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("output pump failed for '{command}': {source}")]
    Pump {
        command: String,
        #[source]
        source: PumpError,
    },

    #[error("failed to wait on '{command}': {source}")]
    Wait {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("job thread for '{command}' exited without reporting an outcome")]
    Panicked { command: String },

    /// The process group survived every SIGKILL we sent.
    #[error("'{command}' (pid {pid}) is still alive after SIGKILL")]
    Unkillable { command: String, pid: u32 },
}

impl JobError {
    pub fn command(&self) -> &str {
        match self {
            Self::InvalidCommand { command, .. }
            | Self::Channel { command, .. }
            | Self::Spawn { command, .. }
            | Self::Pump { command, .. }
            | Self::Wait { command, .. }
            | Self::Panicked { command }
            | Self::Unkillable { command, .. } => command,
        }
    }

    /// Only a process we could not kill needs the operator; everything else stays local to the job.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unkillable { .. })
    }
}

/// Unrecoverable conditions reported by `Phone::stop`.
#[derive(Debug, Error)]
pub enum StopError {
    #[error("{role} job did not finish within {timeout:?}")]
    Timeout { role: Role, timeout: Duration },

    #[error("{role} job could not be terminated: {source}")]
    Unkillable {
        role: Role,
        #[source]
        source: JobError,
    },
}

impl StopError {
    pub fn role(&self) -> Role {
        match self {
            Self::Timeout { role, .. } | Self::Unkillable { role, .. } => *role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_error_display_names_command() {
        let err = JobError::Spawn {
            command: "aplay greeting.wav".to_string(),
            source: io::Error::from_raw_os_error(libc::ENOENT),
        };
        let text = err.to_string();
        assert!(text.contains("aplay greeting.wav"), "{text}");
        assert_eq!(err.command(), "aplay greeting.wav");
        assert!(!err.is_fatal());
    }

    #[test]
    fn only_unkillable_is_fatal() {
        let err = JobError::Unkillable {
            command: "arecord out.wav".to_string(),
            pid: 42,
        };
        assert!(err.is_fatal());
        assert!(err.to_string().contains("pid 42"));
    }

    #[test]
    fn stop_error_reports_role() {
        let err = StopError::Timeout {
            role: Role::Recording,
            timeout: Duration::from_secs(5),
        };
        assert_eq!(err.role(), Role::Recording);
        assert!(err.to_string().starts_with("recording job"));
    }
}
