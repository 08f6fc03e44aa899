//! Pipeline step records

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::deploy::fsm::{StepEvent, StepStatus};
use crate::errors::{DeployerError, StepError};
use crate::models::command::{CommandState, CommandStatus};
use crate::models::deployment::DeploymentPlan;

/// Latest status per device, last write wins
pub type DeviceStatusMap = BTreeMap<String, CommandStatus>;

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Distribute,
    Verify,
    Enable,
    Validate,
    Launch,
    Screenshot,
    Launcher,
    Reboot,
}

impl StepKind {
    pub fn id(&self) -> &'static str {
        match self {
            StepKind::Distribute => "distribute",
            StepKind::Verify => "verify",
            StepKind::Enable => "enable",
            StepKind::Validate => "validate",
            StepKind::Launch => "launch",
            StepKind::Screenshot => "screenshot",
            StepKind::Launcher => "launcher",
            StepKind::Reboot => "reboot",
        }
    }
}

/// Error payload of a failed step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFailure {
    pub message: String,
    pub technical_details: String,
}

impl From<&StepError> for StepFailure {
    fn from(err: &StepError) -> Self {
        Self {
            message: err.to_string(),
            technical_details: err.technical_details(),
        }
    }
}

/// Counts over a device status map
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatusSummary {
    pub successful: usize,
    pub failed: usize,
    pub in_progress: usize,
}

/// Live per-device status of a polling step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDeviceStatus {
    pub device_statuses: DeviceStatusMap,
    pub summary: DeviceStatusSummary,
}

impl From<DeviceStatusMap> for StepDeviceStatus {
    fn from(device_statuses: DeviceStatusMap) -> Self {
        let mut summary = DeviceStatusSummary::default();
        for status in device_statuses.values() {
            match status.state {
                CommandState::Success => summary.successful += 1,
                CommandState::Failure => summary.failed += 1,
                _ => summary.in_progress += 1,
            }
        }

        Self {
            device_statuses,
            summary,
        }
    }
}

/// One stage of the deployment pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentStep {
    pub kind: StepKind,
    pub title: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_status: Option<StepDeviceStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StepFailure>,
    pub attempts: u32,
}

impl DeploymentStep {
    pub fn new(kind: StepKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            status: StepStatus::Pending,
            timestamp: None,
            details: None,
            device_status: None,
            error: None,
            attempts: 0,
        }
    }

    pub fn id(&self) -> &'static str {
        self.kind.id()
    }

    /// pending -> running
    pub fn start(&mut self, timestamp: String) -> Result<(), DeployerError> {
        self.status = self.status.next(StepEvent::Start)?;
        self.timestamp = Some(timestamp);
        self.attempts += 1;
        Ok(())
    }

    /// running -> completed
    pub fn complete(&mut self, details: String) -> Result<(), DeployerError> {
        self.status = self.status.next(StepEvent::Complete)?;
        self.details = Some(details);
        Ok(())
    }

    /// running -> failed
    pub fn fail(&mut self, failure: StepFailure) -> Result<(), DeployerError> {
        self.status = self.status.next(StepEvent::Fail)?;
        self.details = Some(failure.message.clone());
        self.error = Some(failure);
        Ok(())
    }

    /// failed -> pending, clearing the previous attempt's output
    pub fn reset(&mut self) -> Result<(), DeployerError> {
        self.status = self.status.next(StepEvent::Retry)?;
        self.timestamp = None;
        self.details = None;
        self.device_status = None;
        self.error = None;
        Ok(())
    }
}

/// Build the step list for a plan.
///
/// Launch, screenshot and launcher only run when apps are flagged for
/// auto-start; reboot only when requested.
pub fn build_steps(plan: &DeploymentPlan) -> Vec<DeploymentStep> {
    let device_count = plan.devices.len();
    let mut steps = vec![
        DeploymentStep::new(
            StepKind::Distribute,
            format!("Distributing to {} device(s)", device_count),
        ),
        DeploymentStep::new(StepKind::Verify, "Verifying installation status"),
        DeploymentStep::new(StepKind::Enable, "Enabling installed apps"),
        DeploymentStep::new(StepKind::Validate, "Validating app presence on devices"),
    ];

    if !plan.launch_apps.is_empty() {
        steps.push(DeploymentStep::new(
            StepKind::Launch,
            format!("Launching {} app(s)", plan.launch_apps.len()),
        ));
        steps.push(DeploymentStep::new(
            StepKind::Screenshot,
            format!("Capturing screenshots on {} device(s)", device_count),
        ));
        steps.push(DeploymentStep::new(
            StepKind::Launcher,
            format!("Relaunching home launcher on {} device(s)", device_count),
        ));
    }

    if plan.reboot_after_deploy {
        steps.push(DeploymentStep::new(
            StepKind::Reboot,
            format!("Rebooting {} device(s)", device_count),
        ));
    }

    steps
}
