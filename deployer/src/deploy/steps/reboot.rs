//! Reboot: one bulk REBOOT command, not awaited

use tracing::info;

use crate::deploy::context::{StepContext, StepReporter};
use crate::deploy::steps::StepResult;

pub async fn execute(ctx: &StepContext<'_>, _reporter: &mut dyn StepReporter) -> StepResult {
    let devices = &ctx.plan.devices;
    info!("Rebooting {} device(s)", devices.len());

    let response = ctx.api.reboot_devices(ctx.credentials, devices).await?;
    info!("Reboot command {} accepted", response.id);

    Ok(format!(
        "Successfully initiated reboot on {} device(s)",
        devices.len()
    ))
}
