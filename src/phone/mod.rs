//! The phone: one playback job and one recording job behind a shared stop signal.
//!
//! `play` and `record` each start at most one job per role; starting a role that
//! is still active is a caller error that is logged and ignored. `stop` raises
//! the stop signal, waits a bounded time for both jobs, and only clears the
//! signal once no job is left attached.


use crate::cancel::StopSignal;
use crate::error::{JobError, StopError};
use crate::job::{
    spawn_job, CommandSpec, JobContext, JobHandle, JobOutcome, JobStatus, JobTiming, KillPg,
    ProcessSignaller, Role,
};
use crate::pump::{OutputSinks, ProcessStreams};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const DEFAULT_PLAYER_CMD: &str = "aplay --device=plughw:1,0";
pub const DEFAULT_RECORDER_CMD: &str = "arecord --device=plughw:1,0 --format=S24_LE --rate=48000";
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Commands and timeouts for a phone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhoneConfig {
    /// Player command; the target file is appended as the last argument.
    pub player_command: CommandSpec,
    /// Recorder command; the target file is appended as the last argument.
    pub recorder_command: CommandSpec,
    /// Bound on the wait for each role inside `stop`.
    pub stop_timeout: Duration,
    pub timing: JobTiming,
}

impl Default for PhoneConfig {
    fn default() -> Self {
        Self {
            player_command: CommandSpec::new("aplay", ["--device=plughw:1,0"]),
            recorder_command: CommandSpec::new(
                "arecord",
                ["--device=plughw:1,0", "--format=S24_LE", "--rate=48000"],
            ),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            timing: JobTiming::default(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StartResult {
    Started,
    /// A job for this role is still running; nothing was started.
    AlreadyActive,
}

/// Observable per-role state.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RoleState {
    Idle,
    Starting,
    Running,
    Exited(i32),
    Failed,
}

/// Outcomes collected by a successful `stop`. `None` means the role had no job.
#[derive(Debug, Default)]
pub struct StopReport {
    pub playback: Option<JobOutcome>,
    pub recording: Option<JobOutcome>,
}

impl StopReport {
    pub fn outcome(&self, role: Role) -> Option<&JobOutcome> {
        match role {
            Role::Playback => self.playback.as_ref(),
            Role::Recording => self.recording.as_ref(),
        }
    }

    fn set(&mut self, role: Role, outcome: Option<JobOutcome>) {
        match role {
            Role::Playback => self.playback = outcome,
            Role::Recording => self.recording = outcome,
        }
    }
}

pub struct Phone {
    config: PhoneConfig,
    stop: StopSignal,
    sinks: Arc<dyn OutputSinks>,
    signaller: Arc<dyn ProcessSignaller>,
    player: Option<JobHandle>,
    recorder: Option<JobHandle>,
    /// Set while the last `stop` left a job attached; dropping then skips a second stop.
    stop_failed: bool,
}

impl Phone {
    /// Phone whose jobs write to this process's stdout/stderr and are signalled with `killpg`.
    pub fn new(config: PhoneConfig) -> Self {
        Self::with_parts(config, Arc::new(ProcessStreams), Arc::new(KillPg))
    }

    pub fn with_parts(
        config: PhoneConfig,
        sinks: Arc<dyn OutputSinks>,
        signaller: Arc<dyn ProcessSignaller>,
    ) -> Self {
        Self {
            config,
            stop: StopSignal::new(),
            sinks,
            signaller,
            player: None,
            recorder: None,
            stop_failed: false,
        }
    }

    pub fn config(&self) -> &PhoneConfig {
        &self.config
    }

    /// Play `target` unless playback is already in progress.
    pub fn play(&mut self, target: &str) -> Result<StartResult, JobError> {
        self.start(Role::Playback, target)
    }

    /// Record to `target` unless a recording is already in progress.
    pub fn record(&mut self, target: &str) -> Result<StartResult, JobError> {
        self.start(Role::Recording, target)
    }

    pub fn is_active(&self, role: Role) -> bool {
        self.slot(role).as_ref().is_some_and(JobHandle::is_active)
    }

    /// Status of the job attached to `role`, if any.
    pub fn status(&self, role: Role) -> Option<JobStatus> {
        self.slot(role).as_ref().map(JobHandle::status)
    }

    pub fn state(&self, role: Role) -> RoleState {
        match self.status(role) {
            None => RoleState::Idle,
            Some(JobStatus::Starting) => RoleState::Starting,
            Some(JobStatus::Running { .. }) => RoleState::Running,
            Some(JobStatus::Exited(code)) => RoleState::Exited(code),
            Some(JobStatus::Failed { .. }) => RoleState::Failed,
        }
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.is_set()
    }

    /// Stop both jobs and wait for them, at most `stop_timeout` per role.
    ///
    /// A job that does not finish in time stays attached and keeps the stop
    /// signal raised, so `stop` can be called again. The first fatal error is
    /// returned after both roles have been waited on.
    pub fn stop(&mut self) -> Result<StopReport, StopError> {
        info!("stopping play and record jobs");
        self.stop.set();

        let mut report = StopReport::default();
        let mut first_error = None;
        for role in Role::ALL {
            match self.await_role(role) {
                Ok(outcome) => report.set(role, outcome),
                Err(err) => {
                    error!(role = %role, error = %err, "job did not stop cleanly");
                    first_error.get_or_insert(err);
                }
            }
        }
        self.clear_stop_if_idle();
        self.stop_failed = first_error.is_some();

        match first_error {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }

    fn start(&mut self, role: Role, target: &str) -> Result<StartResult, JobError> {
        if self.is_active(role) {
            warn!(role = %role, "attempted to start {role} while {role} is in progress");
            return Ok(StartResult::AlreadyActive);
        }
        self.reap(role);
        if self.stop.is_set() {
            // A job left attached by a timed-out stop may have finished since.
            for other in Role::ALL {
                if !self.is_active(other) {
                    self.reap(other);
                }
            }
        }
        self.clear_stop_if_idle();

        let command = self.command_for(role).with_target(target);
        let ctx = JobContext {
            stop: self.stop.clone(),
            sinks: Arc::clone(&self.sinks),
            signaller: Arc::clone(&self.signaller),
            timing: self.config.timing,
        };
        let handle = spawn_job(role, command, ctx)?;
        *self.slot_mut(role) = Some(handle);
        Ok(StartResult::Started)
    }

    /// Drop a finished job left over from an earlier round.
    fn reap(&mut self, role: Role) {
        if let Some(mut handle) = self.slot_mut(role).take() {
            let outcome = handle.wait_timeout(Duration::ZERO);
            debug!(role = %role, ?outcome, "released finished job");
        }
    }

    fn await_role(&mut self, role: Role) -> Result<Option<JobOutcome>, StopError> {
        let timeout = self.config.stop_timeout;
        let Some(handle) = self.slot_mut(role).as_mut() else {
            return Ok(None);
        };
        let outcome = handle.wait_timeout(timeout);
        if matches!(outcome, JobOutcome::TimedOut) {
            return Err(StopError::Timeout { role, timeout });
        }
        self.slot_mut(role).take();
        match outcome {
            JobOutcome::Failed(source) if source.is_fatal() => {
                Err(StopError::Unkillable { role, source })
            }
            outcome => {
                debug!(role = %role, ?outcome, "job stopped");
                Ok(Some(outcome))
            }
        }
    }

    fn clear_stop_if_idle(&mut self) {
        if self.player.is_none() && self.recorder.is_none() {
            self.stop.clear();
        }
    }

    fn command_for(&self, role: Role) -> &CommandSpec {
        match role {
            Role::Playback => &self.config.player_command,
            Role::Recording => &self.config.recorder_command,
        }
    }

    fn slot(&self, role: Role) -> &Option<JobHandle> {
        match role {
            Role::Playback => &self.player,
            Role::Recording => &self.recorder,
        }
    }

    fn slot_mut(&mut self, role: Role) -> &mut Option<JobHandle> {
        match role {
            Role::Playback => &mut self.player,
            Role::Recording => &mut self.recorder,
        }
    }
}

impl Drop for Phone {
    fn drop(&mut self) {
        if self.player.is_none() && self.recorder.is_none() {
            return;
        }
        if self.stop_failed {
            warn!("jobs left running after a failed stop");
            return;
        }
        if let Err(err) = self.stop() {
            error!(error = %err, "jobs still running while the phone shuts down");
        }
    }
}
