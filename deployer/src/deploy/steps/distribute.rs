//! Distribute: one bulk INSTALL command per selected application

use tracing::info;

use crate::deploy::context::{StepContext, StepReporter};
use crate::deploy::steps::StepResult;
use crate::errors::StepError;

pub async fn execute(ctx: &StepContext<'_>, reporter: &mut dyn StepReporter) -> StepResult {
    let plan = ctx.plan;
    if plan.applications.is_empty() {
        return Ok("No applications to distribute".to_string());
    }

    let device_count = plan.devices.len();
    let mut results = Vec::with_capacity(plan.applications.len());

    for app_id in &plan.applications {
        let version_id = plan
            .version_for(app_id)
            .ok_or_else(|| StepError::MissingVersionSelection {
                app_id: app_id.clone(),
            })?;

        info!(
            "Deploying app {} with version {} to {} device(s)",
            app_id, version_id, device_count
        );

        let response = ctx
            .api
            .deploy_app(ctx.credentials, &plan.devices, version_id)
            .await?;
        reporter.record_command(response);

        results.push(format!(
            "App {} (version {}) bulk deployed to {} device(s)",
            app_id, version_id, device_count
        ));
    }

    Ok(format!(
        "Bulk deployed {} application(s) to {} device(s): {}",
        plan.applications.len(),
        device_count,
        results.join("; ")
    ))
}
