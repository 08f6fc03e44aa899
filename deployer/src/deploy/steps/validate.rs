//! Validate: poll each device's installed apps until every expected package is present

use std::collections::HashSet;
use std::convert::Infallible;

use futures::future::join_all;
use tracing::{info, warn};

use crate::deploy::context::{StepContext, StepReporter};
use crate::deploy::poll::{poll_until, PollOutcome};
use crate::deploy::steps::StepResult;
use crate::errors::{DeviceShortfall, StepError};

pub async fn execute(ctx: &StepContext<'_>, _reporter: &mut dyn StepReporter) -> StepResult {
    let plan = ctx.plan;
    if plan.applications_data.is_empty() {
        return Ok("App validation skipped - no app data available".to_string());
    }

    let expected = plan.expected_packages();
    info!(
        "Validating {} package(s) on {} device(s)",
        expected.len(),
        plan.devices.len()
    );

    let poll = ctx.options.validate_poll;
    let outcome = match poll_until(
        &poll,
        || check_devices(ctx, &expected),
        |checks| checks.iter().all(is_satisfied),
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(never) => match never {},
    };

    match outcome {
        PollOutcome::Ready(_) => Ok(format!(
            "Validation completed: All {} app(s) verified on {} device(s)",
            expected.len(),
            plan.devices.len()
        )),
        PollOutcome::TimedOut(checks) => Err(StepError::ValidationMismatch {
            timeout: poll.timeout,
            total_devices: plan.devices.len(),
            expected_packages: expected,
            failed_devices: checks.into_iter().filter(|c| !is_satisfied(c)).collect(),
        }),
    }
}

fn is_satisfied(check: &DeviceShortfall) -> bool {
    check.error.is_none() && check.missing_packages.is_empty()
}

/// Check all devices concurrently; a failed fetch counts as missing everything
async fn check_devices(
    ctx: &StepContext<'_>,
    expected: &[String],
) -> Result<Vec<DeviceShortfall>, Infallible> {
    let checks = ctx.plan.devices.iter().map(|device_id| async move {
        match ctx
            .api
            .get_device_installed_apps(ctx.credentials, device_id)
            .await
        {
            Ok(apps) => {
                let installed: HashSet<&str> =
                    apps.iter().map(|app| app.package_name.as_str()).collect();
                let missing_packages: Vec<String> = expected
                    .iter()
                    .filter(|pkg| !installed.contains(pkg.as_str()))
                    .cloned()
                    .collect();

                DeviceShortfall {
                    device_id: device_id.clone(),
                    installed_count: expected.len() - missing_packages.len(),
                    missing_packages,
                    error: None,
                }
            }
            Err(e) => {
                warn!("Error validating apps on device {}: {}", device_id, e);
                DeviceShortfall {
                    device_id: device_id.clone(),
                    missing_packages: expected.to_vec(),
                    installed_count: 0,
                    error: Some(e.to_string()),
                }
            }
        }
    });

    Ok(join_all(checks).await)
}
