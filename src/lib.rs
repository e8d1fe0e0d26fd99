pub mod cancel;
pub mod config;
pub mod error;
pub mod handset;
pub mod job;
mod lock;
pub mod naming;
pub mod phone;
pub mod pty;
pub mod pump;
mod telemetry;
#[cfg(test)]
mod test_support;

pub(crate) use lock::lock_or_recover;
pub use cancel::StopSignal;
pub use error::{JobError, PumpError, StopError};
pub use job::{CommandSpec, JobOutcome, JobStatus, Role};
pub use phone::{Phone, PhoneConfig, RoleState, StartResult, StopReport};
pub use telemetry::init_tracing;
