use super::JobTiming;
use crate::error::JobError;
use std::io;
use std::process::{Child, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Poll cadence while waiting for a signalled process to exit.
const EXIT_POLL: Duration = Duration::from_millis(10);

/// SIGKILL is sent at most this many times before the process is declared unkillable.
const KILL_ATTEMPTS: usize = 2;

/// Delivers signals to a job's process group.
pub trait ProcessSignaller: Send + Sync {
    fn signal_group(&self, pgid: i32, signal: libc::c_int) -> io::Result<()>;
}

/// Signals the real process group with `killpg(2)`.
#[derive(Clone, Copy, Debug, Default)]
pub struct KillPg;

impl ProcessSignaller for KillPg {
    fn signal_group(&self, pgid: i32, signal: libc::c_int) -> io::Result<()> {
        // SAFETY: killpg has no memory-safety preconditions.
        if unsafe { libc::killpg(pgid, signal) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

pub fn signal_name(signal: libc::c_int) -> &'static str {
    match signal {
        libc::SIGTERM => "SIGTERM",
        libc::SIGKILL => "SIGKILL",
        libc::SIGINT => "SIGINT",
        _ => "signal",
    }
}

/// Map an exit status to a code; signal deaths become `-signo`.
pub(super) fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .unwrap_or_else(|| -status.signal().unwrap_or(0))
}

fn send(signaller: &dyn ProcessSignaller, pgid: i32, signal: libc::c_int) {
    match signaller.signal_group(pgid, signal) {
        Ok(()) => {}
        // Group already gone; the next wait reaps the leader.
        Err(err) if err.raw_os_error() == Some(libc::ESRCH) => {
            debug!(pgid, signal = signal_name(signal), "process group already exited");
        }
        Err(err) => {
            warn!(pgid, signal = signal_name(signal), error = %err, "failed to signal process group");
        }
    }
}

/// Poll `try_wait` until the child exits or `timeout` passes.
pub(super) fn wait_for_exit(
    child: &mut Child,
    timeout: Duration,
    command: &str,
) -> Result<Option<ExitStatus>, JobError> {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Some(status)),
            Ok(None) => {}
            Err(source) => {
                return Err(JobError::Wait {
                    command: command.to_string(),
                    source,
                })
            }
        }
        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return Ok(None);
        }
        thread::sleep(EXIT_POLL.min(timeout - elapsed));
    }
}

/// Graceful-then-forceful shutdown of the child's whole process group.
///
/// SIGTERM, then up to `term_grace` for the group leader to exit, then SIGKILL.
/// SIGKILL is repeated once after `kill_wait`; a leader that is still alive
/// after the second `kill_wait` is reported as unkillable.
pub(super) fn terminate(
    child: &mut Child,
    command: &str,
    signaller: &dyn ProcessSignaller,
    timing: &JobTiming,
) -> Result<ExitStatus, JobError> {
    let pid = child.id();
    // The child called setsid(), so it leads a group with its own pid.
    let pgid = pid as i32;

    debug!(pid, "sending SIGTERM to process group");
    send(signaller, pgid, libc::SIGTERM);
    if let Some(status) = wait_for_exit(child, timing.term_grace, command)? {
        return Ok(status);
    }

    warn!(pid, "process is still alive after SIGTERM; sending SIGKILL");
    for attempt in 1..=KILL_ATTEMPTS {
        send(signaller, pgid, libc::SIGKILL);
        if let Some(status) = wait_for_exit(child, timing.kill_wait, command)? {
            return Ok(status);
        }
        if attempt < KILL_ATTEMPTS {
            warn!(pid, attempt, "process survived SIGKILL; retrying");
        }
    }

    Err(JobError::Unkillable {
        command: command.to_string(),
        pid,
    })
}
