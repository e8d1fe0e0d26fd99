//! Managed jobs: one media subprocess, its output pumps and its termination.
//!
//! Each job runs on its own named thread (`Player` or `Recorder`). The child
//! leads a fresh process group and writes into two pseudo-terminals whose
//! masters are pumped to the controller's stdout/stderr until the child exits
//! or the shared stop signal is raised.

mod runner;
mod terminate;

pub use terminate::{signal_name, KillPg, ProcessSignaller};

use crate::cancel::StopSignal;
use crate::error::JobError;
use crate::lock_or_recover;
use crate::pump::OutputSinks;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// Exit code reported for a job that failed before or while running its process.
pub const FAILED_EXIT_CODE: i32 = -2;

/// The two independent media activities.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Playback,
    Recording,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Playback, Role::Recording];

    /// Name given to the job thread; shows up in every log line it emits.
    pub fn thread_name(self) -> &'static str {
        match self {
            Role::Playback => "Player",
            Role::Recording => "Recorder",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Role::Playback => "playback",
            Role::Recording => "recording",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Executable plus argument vector. Never run through a shell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Split a command line with shell quoting rules, e.g. `aplay --device=plughw:1,0`.
    pub fn parse(line: &str) -> Result<Self, JobError> {
        let words = shell_words::split(line).map_err(|err| JobError::InvalidCommand {
            command: line.to_string(),
            reason: err.to_string(),
        })?;
        let mut words = words.into_iter();
        let Some(program) = words.next() else {
            return Err(JobError::InvalidCommand {
                command: line.to_string(),
                reason: "command is empty".to_string(),
            });
        };
        Ok(Self {
            program,
            args: words.collect(),
        })
    }

    /// Copy of this command with `target` appended as the final argument.
    pub fn with_target(&self, target: &str) -> Self {
        let mut command = self.clone();
        command.args.push(target.to_string());
        command
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words = std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str));
        f.write_str(&shell_words::join(words))
    }
}

/// Lifecycle of a job as seen from outside its thread.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobStatus {
    Starting,
    Running { pid: u32 },
    Exited(i32),
    Failed { reason: String },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Exited(_) | JobStatus::Failed { .. })
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            JobStatus::Exited(code) => Some(*code),
            JobStatus::Failed { .. } => Some(FAILED_EXIT_CODE),
            _ => None,
        }
    }
}

/// What a bounded wait on a job produced.
#[derive(Debug)]
pub enum JobOutcome {
    /// The process exited; signal deaths report `-signo`.
    Exited(i32),
    Failed(JobError),
    /// The job thread was still running when the wait gave up.
    TimedOut,
}

impl JobOutcome {
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            JobOutcome::Exited(code) => Some(*code),
            JobOutcome::Failed(_) => Some(FAILED_EXIT_CODE),
            JobOutcome::TimedOut => None,
        }
    }
}

/// Timing knobs for the pump loop and termination escalation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JobTiming {
    /// Longest single wait inside the pump loop; bounds stop-signal latency.
    pub poll_interval: Duration,
    /// How long a process gets to exit after SIGTERM.
    pub term_grace: Duration,
    /// How long to wait after each SIGKILL.
    pub kill_wait: Duration,
}

impl Default for JobTiming {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(20),
            term_grace: Duration::from_millis(500),
            kill_wait: Duration::from_millis(1000),
        }
    }
}

/// Everything a job borrows from its controller.
#[derive(Clone)]
pub struct JobContext {
    pub stop: StopSignal,
    pub sinks: Arc<dyn OutputSinks>,
    pub signaller: Arc<dyn ProcessSignaller>,
    pub timing: JobTiming,
}

/// Controller-side handle to a running job thread.
pub struct JobHandle {
    role: Role,
    command: CommandSpec,
    status: Arc<Mutex<JobStatus>>,
    done_rx: Receiver<JobOutcome>,
    thread: Option<JoinHandle<()>>,
}

/// Start `command` on a dedicated thread named after `role`.
pub fn spawn_job(role: Role, command: CommandSpec, ctx: JobContext) -> Result<JobHandle, JobError> {
    let status = Arc::new(Mutex::new(JobStatus::Starting));
    let (done_tx, done_rx) = bounded(1);
    let thread_status = Arc::clone(&status);
    let thread_command = command.clone();
    let thread = thread::Builder::new()
        .name(role.thread_name().to_string())
        .spawn(move || {
            debug!("{} thread started", role.thread_name());
            let outcome = runner::run_job(&thread_command, &ctx, &thread_status);
            let _ = done_tx.send(outcome);
            debug!("{} thread finished", role.thread_name());
        })
        .map_err(|source| JobError::Spawn {
            command: command.to_string(),
            source,
        })?;

    Ok(JobHandle {
        role,
        command,
        status,
        done_rx,
        thread: Some(thread),
    })
}

impl JobHandle {
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn command(&self) -> &CommandSpec {
        &self.command
    }

    pub fn status(&self) -> JobStatus {
        lock_or_recover(&self.status, "JobHandle::status").clone()
    }

    /// True while the job thread has not finished.
    pub fn is_active(&self) -> bool {
        self.thread
            .as_ref()
            .is_some_and(|thread| !thread.is_finished())
    }

    /// Wait up to `timeout` for the job thread to report and finish.
    ///
    /// `TimedOut` leaves the handle intact so the wait can be retried. After a
    /// terminal outcome has been returned the handle should be dropped.
    pub fn wait_timeout(&mut self, timeout: Duration) -> JobOutcome {
        match self.done_rx.recv_timeout(timeout) {
            Ok(outcome) => {
                self.join();
                outcome
            }
            Err(RecvTimeoutError::Timeout) => JobOutcome::TimedOut,
            Err(RecvTimeoutError::Disconnected) => {
                self.join();
                JobOutcome::Failed(JobError::Panicked {
                    command: self.command.to_string(),
                })
            }
        }
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!(role = %self.role, "job thread panicked");
            }
        }
    }
}
