//! Launch: fire-and-forget launch intents for auto-start apps

use tracing::info;

use crate::deploy::context::{StepContext, StepReporter};
use crate::deploy::steps::StepResult;

pub async fn execute(ctx: &StepContext<'_>, reporter: &mut dyn StepReporter) -> StepResult {
    let plan = ctx.plan;
    if plan.launch_apps.is_empty() {
        return Ok("No apps selected for launch".to_string());
    }

    let targets = plan.launch_targets();
    if targets.is_empty() {
        return Ok("No app data available for launch".to_string());
    }

    let names = targets
        .iter()
        .map(|app| app.application_name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    info!("Launching apps [{}] on {} device(s)", names, plan.devices.len());

    let responses = ctx
        .api
        .launch_apps(ctx.credentials, &plan.devices, &targets)
        .await?;
    for response in responses {
        reporter.record_command(response);
    }

    Ok(format!(
        "Successfully launched {} app(s) ({}) on {} device(s)",
        targets.len(),
        names,
        plan.devices.len()
    ))
}
