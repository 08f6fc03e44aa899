//! Screenshot: capture on every device and wait for the command to settle

use tokio::time::sleep;
use tracing::info;

use crate::deploy::context::{StepContext, StepReporter};
use crate::deploy::poll::{poll_until, PollOutcome};
use crate::deploy::steps::verify::{all_terminal, device_map, ensure_all_succeeded};
use crate::deploy::steps::StepResult;
use crate::errors::StepError;

pub async fn execute(ctx: &StepContext<'_>, reporter: &mut dyn StepReporter) -> StepResult {
    let devices = &ctx.plan.devices;
    info!("Capturing screenshots on {} device(s)", devices.len());

    let command = ctx
        .api
        .capture_screenshots(ctx.credentials, devices, &ctx.options.screenshot_tag)
        .await?;
    let command_id = command.id.clone();
    reporter.record_command(command);

    let poll = ctx.options.screenshot_poll;
    let outcome = poll_until(
        &poll,
        || ctx.api.poll_command_status(ctx.credentials, &command_id),
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
                operation: "Screenshot capture".to_string(),
                timeout: poll.timeout,
                statuses,
            });
        }
    };

    let total = statuses.len();
    let success_count =
        ensure_all_succeeded("Screenshot capture", statuses, vec![command_id])?;

    // Screenshots need server-side processing before they can be listed
    sleep(ctx.options.screenshot_grace).await;

    Ok(format!(
        "Screenshot capture completed successfully: {}/{} device(s) captured screenshots",
        success_count, total
    ))
}
