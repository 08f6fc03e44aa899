//! Driver task that owns the orchestrator and serializes retry requests

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::deploy::orchestrator::{Orchestrator, PipelineOutcome, PipelineSnapshot};
use crate::errors::DeployerError;

/// Retry request sent to the driver
#[derive(Debug)]
pub struct RetryRequest {
    pub index: usize,
    pub reply: oneshot::Sender<Result<(), DeployerError>>,
}

/// Cloneable control surface of a running deployment
#[derive(Debug, Clone)]
pub struct DeploymentControl {
    retry_tx: mpsc::Sender<RetryRequest>,
    snapshots: watch::Receiver<PipelineSnapshot>,
}

impl DeploymentControl {
    /// Latest published snapshot
    pub fn snapshot(&self) -> PipelineSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelineSnapshot> {
        self.snapshots.clone()
    }

    /// Ask the driver to re-arm a failed step and resume from it
    pub async fn retry_step(&self, index: usize) -> Result<(), DeployerError> {
        let (reply, reply_rx) = oneshot::channel();
        if self.retry_tx.send(RetryRequest { index, reply }).await.is_err() {
            return Err(self.stopped_error());
        }

        reply_rx.await.map_err(|_| self.stopped_error())?
    }

    // The driver returns once every step completed, so nothing is left to retry
    fn stopped_error(&self) -> DeployerError {
        if self.snapshots.borrow().is_complete {
            DeployerError::InvalidRetry("deployment has already completed".to_string())
        } else {
            DeployerError::Internal("deployment driver has stopped".to_string())
        }
    }

    /// Wait until the pipeline has failed or completed
    pub async fn wait_settled(&self) -> Result<PipelineSnapshot, DeployerError> {
        let mut snapshots = self.snapshots.clone();
        let snapshot = snapshots
            .wait_for(|s| s.has_failed || s.is_complete)
            .await
            .map_err(|_| DeployerError::Internal("deployment driver has stopped".to_string()))?;
        Ok(snapshot.clone())
    }

    /// Wait until every step completed
    pub async fn wait_complete(&self) -> Result<PipelineSnapshot, DeployerError> {
        let mut snapshots = self.snapshots.clone();
        let snapshot = snapshots
            .wait_for(|s| s.is_complete)
            .await
            .map_err(|_| DeployerError::Internal("deployment driver has stopped".to_string()))?;
        Ok(snapshot.clone())
    }
}

/// Handle to a spawned deployment
pub struct DeploymentHandle {
    control: DeploymentControl,
    task: JoinHandle<Result<PipelineOutcome, DeployerError>>,
}

impl DeploymentHandle {
    /// Spawn the driver task; the pipeline starts running immediately
    pub fn spawn(orchestrator: Orchestrator) -> Self {
        let (retry_tx, retry_rx) = mpsc::channel(8);
        let snapshots = orchestrator.subscribe();
        let task = tokio::spawn(drive(orchestrator, retry_rx));

        Self {
            control: DeploymentControl {
                retry_tx,
                snapshots,
            },
            task,
        }
    }

    pub fn control(&self) -> DeploymentControl {
        self.control.clone()
    }

    /// Release this handle's control and wait for the driver to exit.
    ///
    /// A failed pipeline keeps waiting for retries while any other
    /// `DeploymentControl` clone is alive.
    pub async fn finish(self) -> Result<PipelineOutcome, DeployerError> {
        drop(self.control);
        self.task
            .await
            .map_err(|e| DeployerError::Internal(e.to_string()))?
    }

    /// Stop the driver without waiting for the current step
    pub fn abort(self) {
        self.task.abort();
    }
}

async fn drive(
    mut orchestrator: Orchestrator,
    mut retry_rx: mpsc::Receiver<RetryRequest>,
) -> Result<PipelineOutcome, DeployerError> {
    loop {
        let outcome = {
            let run = orchestrator.run();
            tokio::pin!(run);

            loop {
                tokio::select! {
                    outcome = &mut run => break outcome?,
                    Some(request) = retry_rx.recv() => {
                        debug!("Rejecting retry of step {} while the pipeline is running", request.index);
                        let _ = request.reply.send(Err(DeployerError::InvalidRetry(
                            "deployment is still running".to_string(),
                        )));
                    }
                }
            }
        };

        let failed_index = match outcome {
            PipelineOutcome::Completed => return Ok(outcome),
            PipelineOutcome::Failed(index) => index,
        };

        info!("Pipeline halted at step {}, waiting for a retry", failed_index);
        loop {
            let Some(request) = retry_rx.recv().await else {
                warn!("No retry controls left, leaving the pipeline failed");
                return Ok(outcome);
            };

            let result = orchestrator.retry_step(request.index);
            let accepted = result.is_ok();
            let _ = request.reply.send(result);
            if accepted {
                break;
            }
        }
    }
}
