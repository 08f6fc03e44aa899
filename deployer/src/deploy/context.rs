//! Per-invocation context handed to step executors

use tokio::sync::watch;

use crate::app::options::PipelineOptions;
use crate::deploy::orchestrator::PipelineSnapshot;
use crate::deploy::step::{DeviceStatusMap, StepDeviceStatus};
use crate::http::api::MdmApi;
use crate::models::command::CommandResponse;
use crate::models::credentials::Credentials;
use crate::models::deployment::DeploymentPlan;

/// Read-only view of the pipeline inputs for one executor call
pub struct StepContext<'a> {
    pub api: &'a dyn MdmApi,
    pub credentials: &'a Credentials,
    pub plan: &'a DeploymentPlan,
    pub options: &'a PipelineOptions,

    /// Commands issued by earlier steps, oldest first
    pub command_responses: &'a [CommandResponse],
}

/// Side effects an executor reports back to the orchestrator
pub trait StepReporter: Send {
    /// Record a newly issued command
    fn record_command(&mut self, response: CommandResponse);

    /// Publish the latest per-device status
    fn publish_device_statuses(&mut self, statuses: DeviceStatusMap);
}

/// Buffers an executor's commands and forwards live device status
pub struct StepEffects<'a> {
    step_index: usize,
    snapshots: &'a watch::Sender<PipelineSnapshot>,
    commands: Vec<CommandResponse>,
    device_status: Option<StepDeviceStatus>,
}

impl<'a> StepEffects<'a> {
    pub fn new(step_index: usize, snapshots: &'a watch::Sender<PipelineSnapshot>) -> Self {
        Self {
            step_index,
            snapshots,
            commands: Vec::new(),
            device_status: None,
        }
    }

    /// Commands recorded during the call and the last device status
    pub fn into_parts(self) -> (Vec<CommandResponse>, Option<StepDeviceStatus>) {
        (self.commands, self.device_status)
    }
}

impl StepReporter for StepEffects<'_> {
    fn record_command(&mut self, response: CommandResponse) {
        self.commands.push(response);
    }

    fn publish_device_statuses(&mut self, statuses: DeviceStatusMap) {
        let view = StepDeviceStatus::from(statuses);
        let index = self.step_index;
        let live = view.clone();
        self.snapshots.send_modify(|snapshot| {
            if let Some(step) = snapshot.steps.get_mut(index) {
                step.device_status = Some(live);
            }
        });
        self.device_status = Some(view);
    }
}
