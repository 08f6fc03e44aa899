//! Deployment orchestrator: runs the steps in order and owns all pipeline state

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info, warn, Instrument};

use crate::app::options::PipelineOptions;
use crate::deploy::context::{StepContext, StepEffects};
use crate::deploy::fsm::{DisplayStatus, StepStatus};
use crate::deploy::step::{build_steps, DeploymentStep, StepFailure, StepKind};
use crate::deploy::steps::{
    distribute, enable, launch, launcher, reboot, screenshot, validate, verify, StepResult,
};
use crate::errors::DeployerError;
use crate::http::api::MdmApi;
use crate::models::command::CommandResponse;
use crate::models::credentials::Credentials;
use crate::models::deployment::DeploymentPlan;
use crate::utils::generate_uuid;

/// Called with `false` when a deployment starts and `true` once every step completed
pub type CompletionCallback = Box<dyn Fn(bool) + Send + Sync>;

/// Point-in-time view of the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineSnapshot {
    pub run_id: String,
    pub steps: Vec<DeploymentStep>,
    pub current_step: usize,
    pub has_failed: bool,
    pub is_complete: bool,
}

/// A step as presented to the UI
#[derive(Debug, Clone, Serialize)]
pub struct StepView<'a> {
    pub index: usize,
    pub id: &'static str,
    pub display_status: DisplayStatus,
    #[serde(flatten)]
    pub step: &'a DeploymentStep,
}

impl PipelineSnapshot {
    /// Status shown for a step; pending steps behind a failure read as canceled
    pub fn display_status(&self, index: usize) -> Option<DisplayStatus> {
        let step = self.steps.get(index)?;
        let status = match step.status {
            StepStatus::Pending if self.has_failed && index > self.current_step => {
                DisplayStatus::Canceled
            }
            StepStatus::Pending => DisplayStatus::Pending,
            StepStatus::Running => DisplayStatus::Running,
            StepStatus::Completed => DisplayStatus::Completed,
            StepStatus::Failed => DisplayStatus::Failed,
        };
        Some(status)
    }

    pub fn views(&self) -> Vec<StepView<'_>> {
        self.steps
            .iter()
            .enumerate()
            .map(|(index, step)| StepView {
                index,
                id: step.id(),
                display_status: self.display_status(index).unwrap_or(DisplayStatus::Pending),
                step,
            })
            .collect()
    }

    pub fn running_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Running)
            .count()
    }

    /// Index of the failed step, if the pipeline is halted
    pub fn failed_step(&self) -> Option<usize> {
        self.steps.iter().position(|s| s.status == StepStatus::Failed)
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Every step completed
    Completed,

    /// Halted at this step index
    Failed(usize),
}

/// Append-only record of issued commands, tagged with the issuing step
#[derive(Debug, Clone, Default)]
pub struct CommandLedger {
    responses: Vec<CommandResponse>,
    origins: Vec<StepKind>,
}

impl CommandLedger {
    pub fn responses(&self) -> &[CommandResponse] {
        &self.responses
    }

    pub fn record(&mut self, origin: StepKind, responses: Vec<CommandResponse>) {
        for response in responses {
            self.responses.push(response);
            self.origins.push(origin);
        }
    }

    /// Drop the commands a step issued; returns how many were removed
    pub fn discard(&mut self, origin: StepKind) -> usize {
        let before = self.responses.len();
        let mut kept_responses = Vec::with_capacity(before);
        let mut kept_origins = Vec::with_capacity(before);

        for (response, kind) in self.responses.drain(..).zip(self.origins.drain(..)) {
            if kind != origin {
                kept_responses.push(response);
                kept_origins.push(kind);
            }
        }

        self.responses = kept_responses;
        self.origins = kept_origins;
        before - self.responses.len()
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}

/// Deployment orchestrator
pub struct Orchestrator {
    api: Arc<dyn MdmApi>,
    credentials: Arc<Credentials>,
    plan: Arc<DeploymentPlan>,
    options: PipelineOptions,
    run_id: String,
    steps: Vec<DeploymentStep>,
    current: usize,
    has_failed: bool,
    is_complete: bool,
    started: bool,
    ledger: CommandLedger,
    snapshots: watch::Sender<PipelineSnapshot>,
    on_complete: Option<CompletionCallback>,
}

impl Orchestrator {
    /// Create an orchestrator with the step list derived from the plan
    pub fn new(
        api: Arc<dyn MdmApi>,
        credentials: Arc<Credentials>,
        plan: Arc<DeploymentPlan>,
        options: PipelineOptions,
    ) -> Self {
        let run_id = generate_uuid();
        let steps = build_steps(&plan);
        let (snapshots, _) = watch::channel(PipelineSnapshot {
            run_id: run_id.clone(),
            steps: steps.clone(),
            current_step: 0,
            has_failed: false,
            is_complete: false,
        });

        Self {
            api,
            credentials,
            plan,
            options,
            run_id,
            steps,
            current: 0,
            has_failed: false,
            is_complete: false,
            started: false,
            ledger: CommandLedger::default(),
            snapshots,
            on_complete: None,
        }
    }

    /// Register the deployment-complete callback
    pub fn with_completion_callback(mut self, callback: CompletionCallback) -> Self {
        self.on_complete = Some(callback);
        self
    }

    pub fn steps(&self) -> &[DeploymentStep] {
        &self.steps
    }

    pub fn command_responses(&self) -> &[CommandResponse] {
        self.ledger.responses()
    }

    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    pub fn has_failed(&self) -> bool {
        self.has_failed
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            run_id: self.run_id.clone(),
            steps: self.steps.clone(),
            current_step: self.current,
            has_failed: self.has_failed,
            is_complete: self.is_complete,
        }
    }

    /// Receive a snapshot after every transition
    pub fn subscribe(&self) -> watch::Receiver<PipelineSnapshot> {
        self.snapshots.subscribe()
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.snapshot());
    }

    fn notify_complete(&self, completed: bool) {
        if let Some(callback) = &self.on_complete {
            callback(completed);
        }
    }

    /// Run from the current step until the pipeline completes or a step fails
    pub async fn run(&mut self) -> Result<PipelineOutcome, DeployerError> {
        let span = tracing::info_span!("deployment", run_id = %self.run_id);
        self.run_steps().instrument(span).await
    }

    async fn run_steps(&mut self) -> Result<PipelineOutcome, DeployerError> {
        if !self.started {
            self.started = true;
            info!(
                "Starting deployment of {} app(s) to {} device(s) in {} step(s)",
                self.plan.applications.len(),
                self.plan.devices.len(),
                self.steps.len()
            );
            self.notify_complete(false);
        }

        while !self.has_failed && !self.is_complete && self.current < self.steps.len() {
            sleep(self.options.step_start_delay).await;

            let index = self.current;
            let timestamp = chrono::Local::now().format("%H:%M:%S").to_string();
            self.steps[index].start(timestamp)?;
            self.publish();
            info!(
                "Step {} started (attempt {})",
                self.steps[index].id(),
                self.steps[index].attempts
            );

            match self.execute_step(index).await {
                Ok(message) => {
                    info!("Step {} completed: {}", self.steps[index].id(), message);
                    self.steps[index].complete(message)?;

                    if index + 1 < self.steps.len() {
                        self.publish();
                        sleep(self.options.step_advance_delay).await;
                        self.current = index + 1;
                    } else {
                        self.is_complete = true;
                        self.publish();
                        info!("Deployment completed");
                        self.notify_complete(true);
                    }
                }
                Err(err) => {
                    error!("Step {} failed: {}", self.steps[index].id(), err);
                    self.steps[index].fail(StepFailure::from(&err))?;
                    self.has_failed = true;
                }
            }

            self.publish();
        }

        Ok(self.outcome())
    }

    fn outcome(&self) -> PipelineOutcome {
        if self.has_failed {
            PipelineOutcome::Failed(self.current)
        } else {
            PipelineOutcome::Completed
        }
    }

    async fn execute_step(&mut self, index: usize) -> StepResult {
        let kind = self.steps[index].kind;
        let mut effects = StepEffects::new(index, &self.snapshots);
        let ctx = StepContext {
            api: self.api.as_ref(),
            credentials: &self.credentials,
            plan: &self.plan,
            options: &self.options,
            command_responses: self.ledger.responses(),
        };

        let result = match kind {
            StepKind::Distribute => distribute::execute(&ctx, &mut effects).await,
            StepKind::Verify => verify::execute(&ctx, &mut effects).await,
            StepKind::Enable => enable::execute(&ctx, &mut effects).await,
            StepKind::Validate => validate::execute(&ctx, &mut effects).await,
            StepKind::Launch => launch::execute(&ctx, &mut effects).await,
            StepKind::Screenshot => screenshot::execute(&ctx, &mut effects).await,
            StepKind::Launcher => launcher::execute(&ctx, &mut effects).await,
            StepKind::Reboot => reboot::execute(&ctx, &mut effects).await,
        };

        let (commands, device_status) = effects.into_parts();
        self.ledger.record(kind, commands);
        if device_status.is_some() {
            self.steps[index].device_status = device_status;
        }

        result
    }

    /// Re-arm a failed step so the next `run` resumes from it.
    ///
    /// Commands the step issued during its failed attempt are discarded.
    pub fn retry_step(&mut self, index: usize) -> Result<(), DeployerError> {
        let step = self
            .steps
            .get_mut(index)
            .ok_or_else(|| DeployerError::InvalidRetry(format!("No step at index {}", index)))?;

        if step.status != StepStatus::Failed {
            return Err(DeployerError::InvalidRetry(format!(
                "Step {} is {:?}, only failed steps can be retried",
                step.id(),
                step.status
            )));
        }

        step.reset()?;
        let kind = step.kind;
        let discarded = self.ledger.discard(kind);
        if discarded > 0 {
            warn!(
                "Discarded {} command(s) from the failed {} attempt, {} still tracked",
                discarded,
                kind.id(),
                self.ledger.len()
            );
        }

        self.current = index;
        self.has_failed = false;
        self.publish();
        info!("Step {} re-armed for retry", kind.id());
        Ok(())
    }
}
