//! Verify: poll every accumulated command until all devices are terminal

use futures::future::try_join_all;
use tracing::info;

use crate::deploy::context::{StepContext, StepReporter};
use crate::deploy::poll::{poll_until, PollOutcome};
use crate::deploy::step::DeviceStatusMap;
use crate::deploy::steps::StepResult;
use crate::errors::{DeployerError, StepError};
use crate::models::command::CommandStatus;

pub async fn execute(ctx: &StepContext<'_>, reporter: &mut dyn StepReporter) -> StepResult {
    let commands = ctx.command_responses;
    if commands.is_empty() {
        return Ok("No command responses available for verification".to_string());
    }

    let command_ids: Vec<String> = commands.iter().map(|c| c.id.clone()).collect();
    info!("Verifying {} command(s)", command_ids.len());

    let poll = ctx.options.verify_poll;
    let outcome = poll_until(
        &poll,
        || fetch_statuses(ctx, &command_ids),
        |statuses| {
            reporter.publish_device_statuses(device_map(statuses));
            all_terminal(statuses)
        },
    )
    .await?;

    let statuses = match outcome {
        PollOutcome::Ready(statuses) => statuses,
        PollOutcome::TimedOut(statuses) => {
            return Err(StepError::PollTimeout {
                operation: "Verification".to_string(),
                timeout: poll.timeout,
                statuses,
            });
        }
    };

    let total = statuses.len();
    let success_count = ensure_all_succeeded("Installation", statuses, command_ids)?;

    Ok(format!(
        "Verification completed successfully: {}/{} command(s) succeeded across {} deployment(s)",
        success_count,
        total,
        commands.len()
    ))
}

/// Current statuses of all commands, flattened in command order
async fn fetch_statuses(
    ctx: &StepContext<'_>,
    command_ids: &[String],
) -> Result<Vec<CommandStatus>, DeployerError> {
    let polls = command_ids
        .iter()
        .map(|id| ctx.api.poll_command_status(ctx.credentials, id));
    let per_command = try_join_all(polls).await?;
    Ok(per_command.into_iter().flatten().collect())
}

/// Keyed by device; a later command's status replaces an earlier one
pub(crate) fn device_map(statuses: &[CommandStatus]) -> DeviceStatusMap {
    statuses
        .iter()
        .map(|status| (status.device.clone(), status.clone()))
        .collect()
}

/// An empty status list means the backend has not fanned out yet
pub(crate) fn all_terminal(statuses: &[CommandStatus]) -> bool {
    !statuses.is_empty() && statuses.iter().all(|s| s.state.is_terminal())
}

/// Every terminal state other than success counts as a failure
pub(crate) fn ensure_all_succeeded(
    operation: &str,
    statuses: Vec<CommandStatus>,
    command_ids: Vec<String>,
) -> Result<usize, StepError> {
    let total = statuses.len();
    let success_count = statuses.iter().filter(|s| s.state.is_success()).count();
    let failure_count = total - success_count;

    if failure_count > 0 {
        return Err(StepError::PartialCommandFailure {
            operation: operation.to_string(),
            success_count,
            failure_count,
            total,
            statuses,
            command_ids,
        });
    }

    Ok(success_count)
}
