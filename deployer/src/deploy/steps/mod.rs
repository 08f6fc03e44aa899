//! Step executors, one per pipeline stage

pub mod distribute;
pub mod enable;
pub mod launch;
pub mod launcher;
pub mod reboot;
pub mod screenshot;
pub mod validate;
pub mod verify;

use crate::errors::StepError;

/// Summary message on success
pub type StepResult = Result<String, StepError>;
