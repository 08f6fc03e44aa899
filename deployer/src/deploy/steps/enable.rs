//! Enable: one SET_APP_STATE command per application

use tracing::info;

use crate::deploy::context::{StepContext, StepReporter};
use crate::deploy::steps::StepResult;

pub async fn execute(ctx: &StepContext<'_>, reporter: &mut dyn StepReporter) -> StepResult {
    let plan = ctx.plan;
    if plan.applications_data.is_empty() {
        return Ok("No apps to enable".to_string());
    }

    let names = plan
        .applications_data
        .iter()
        .map(|app| app.application_name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    info!("Enabling apps [{}] on {} device(s)", names, plan.devices.len());

    let responses = ctx
        .api
        .enable_apps(ctx.credentials, &plan.devices, &plan.applications_data)
        .await?;
    for response in responses {
        reporter.record_command(response);
    }

    Ok(format!(
        "Successfully enabled {} app(s) ({}) on {} device(s)",
        plan.applications_data.len(),
        names,
        plan.devices.len()
    ))
}
