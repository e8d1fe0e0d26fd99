use super::terminate::{exit_code, terminate, wait_for_exit};
use super::{CommandSpec, JobContext, JobOutcome, JobStatus};
use crate::error::JobError;
use crate::lock_or_recover;
use crate::pty::TerminalChannel;
use crate::pump::StreamPump;
use std::io;
use std::os::fd::OwnedFd;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Mutex;
use tracing::{error, info, warn};

/// Serializes pty allocation and spawn across job threads.
static SPAWN_LOCK: Mutex<()> = Mutex::new(());

/// Body of a job thread. Never panics on process errors; they become `Failed`.
pub(super) fn run_job(
    command: &CommandSpec,
    ctx: &JobContext,
    status: &Mutex<JobStatus>,
) -> JobOutcome {
    let (outcome, terminal) = match drive(command, ctx, status) {
        Ok(code) => {
            info!(exit_code = code, "process finished with return code {code}");
            (JobOutcome::Exited(code), JobStatus::Exited(code))
        }
        Err(err) => {
            error!(command = %command, error = %err, "job failed");
            let reason = err.to_string();
            (JobOutcome::Failed(err), JobStatus::Failed { reason })
        }
    };
    *lock_or_recover(status, "run_job") = terminal;
    outcome
}

fn drive(command: &CommandSpec, ctx: &JobContext, status: &Mutex<JobStatus>) -> Result<i32, JobError> {
    let command_line = command.to_string();
    let channel_error = |source: io::Error| JobError::Channel {
        command: command_line.clone(),
        source,
    };
    let (stdout_master, stderr_master, mut child) = {
        // openpty and FD_CLOEXEC are separate steps; a sibling job forking in
        // between would inherit our slaves.
        let _guard = lock_or_recover(&SPAWN_LOCK, "drive");
        let (stdout_master, stdout_slave) =
            TerminalChannel::open().map_err(channel_error)?.into_parts();
        let (stderr_master, stderr_slave) =
            TerminalChannel::open().map_err(channel_error)?.into_parts();

        info!(command = %command_line, "spawning process using command '{command_line}'");
        let child =
            spawn_child(command, stdout_slave, stderr_slave).map_err(|source| JobError::Spawn {
                command: command_line.clone(),
                source,
            })?;
        (stdout_master, stderr_master, child)
    };
    let pid = child.id();
    *lock_or_recover(status, "drive") = JobStatus::Running { pid };

    let mut pump = StreamPump::new();
    pump.add_source("stdout", stdout_master, ctx.sinks.primary());
    pump.add_source("stderr", stderr_master, ctx.sinks.secondary());

    let exited = loop {
        if ctx.stop.is_set() {
            info!(pid, "received stop signal");
            break None;
        }
        if pump.is_drained() {
            // Both channels closed; the child is exiting on its own.
            if let Some(exit_status) =
                wait_for_exit(&mut child, ctx.timing.poll_interval, &command_line)?
            {
                break Some(exit_status);
            }
            continue;
        }
        if let Err(source) = pump.pump_once(ctx.timing.poll_interval) {
            abandon(&mut child, &command_line, ctx);
            return Err(JobError::Pump {
                command: command_line,
                source,
            });
        }
    };

    let exit_status = match exited {
        Some(exit_status) => exit_status,
        None => stop_child(&mut child, &command_line, ctx)?,
    };
    drop(pump);
    Ok(exit_code(exit_status))
}

/// Reap the child if it already exited, otherwise escalate.
fn stop_child(child: &mut Child, command: &str, ctx: &JobContext) -> Result<ExitStatus, JobError> {
    match child.try_wait() {
        Ok(Some(status)) => Ok(status),
        Ok(None) => terminate(child, command, ctx.signaller.as_ref(), &ctx.timing),
        Err(source) => Err(JobError::Wait {
            command: command.to_string(),
            source,
        }),
    }
}

/// Best-effort teardown when the pump fails while the child is still running.
fn abandon(child: &mut Child, command: &str, ctx: &JobContext) {
    if let Err(err) = stop_child(child, command, ctx) {
        warn!(error = %err, "could not terminate process after pump failure");
    }
}

/// Spawn with stdin inherited, stdout/stderr on the pty slaves, in a new session.
///
/// The slave descriptors move into the `Command`, which is dropped on return,
/// so the parent holds no slave end once the child is running.
fn spawn_child(command: &CommandSpec, stdout: OwnedFd, stderr: OwnedFd) -> io::Result<Child> {
    let mut cmd = Command::new(command.program());
    cmd.args(command.args())
        .stdin(Stdio::inherit())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr));
    // SAFETY: setsid is async-signal-safe and touches no state shared with the parent.
    unsafe {
        cmd.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }
    cmd.spawn()
}
