//! Launcher: bring the home launcher back after screenshots

use tokio::time::sleep;
use tracing::info;

use crate::deploy::context::{StepContext, StepReporter};
use crate::deploy::steps::StepResult;

pub async fn execute(ctx: &StepContext<'_>, reporter: &mut dyn StepReporter) -> StepResult {
    let devices = &ctx.plan.devices;
    info!("Relaunching home launcher on {} device(s)", devices.len());

    let response = ctx
        .api
        .launch_launcher_home(ctx.credentials, devices)
        .await?;
    reporter.record_command(response);

    // Launcher state is not observable, give it time to come up
    sleep(ctx.options.launcher_grace).await;

    Ok(format!(
        "Successfully relaunched home launcher on {} device(s)",
        devices.len()
    ))
}
