//! Step executor tests against the in-memory backend

use std::time::Duration;

use serde_json::json;
use tokio::time::Instant;
use tokio_test::{assert_err, assert_ok};

use mdm_deployer::app::options::PipelineOptions;
use mdm_deployer::deploy::context::StepContext;
use mdm_deployer::deploy::steps::{
    distribute, enable, launch, launcher, reboot, screenshot, validate, verify,
};
use mdm_deployer::errors::{DeployerError, StepError};
use mdm_deployer::http::api::MdmApi;
use mdm_deployer::models::command::{CommandResponse, CommandState};
use mdm_deployer::models::credentials::Credentials;
use mdm_deployer::models::deployment::DeploymentPlan;

use crate::support::{credentials, package, plan, MockApi, RecordingReporter};

struct Fixture {
    api: MockApi,
    credentials: Credentials,
    plan: DeploymentPlan,
    options: PipelineOptions,
    ledger: Vec<CommandResponse>,
}

impl Fixture {
    fn new(plan: DeploymentPlan) -> Self {
        Self {
            api: MockApi::new(),
            credentials: credentials(),
            plan,
            options: PipelineOptions::default(),
            ledger: Vec::new(),
        }
    }

    fn ctx(&self) -> StepContext<'_> {
        StepContext {
            api: &self.api,
            credentials: &self.credentials,
            plan: &self.plan,
            options: &self.options,
            command_responses: &self.ledger,
        }
    }
}

// ================================= DISTRIBUTE ===================================== //

#[tokio::test]
async fn test_distribute_issues_one_install_per_app() {
    let fixture = Fixture::new(plan(&["d1", "d2"], 2));
    let mut reporter = RecordingReporter::default();

    let message = distribute::execute(&fixture.ctx(), &mut reporter).await.unwrap();

    assert_eq!(fixture.api.issued(), vec!["INSTALL", "INSTALL"]);
    assert_eq!(reporter.commands.len(), 2);
    assert!(message.starts_with("Bulk deployed 2 application(s) to 2 device(s)"));

    let bodies = fixture.api.bodies();
    assert_eq!(bodies[0]["command_args"]["app_version"], "ver-1");
    assert_eq!(bodies[1]["command_args"]["app_version"], "ver-2");
    assert_eq!(bodies[1]["devices"], json!(["d1", "d2"]));
}

#[tokio::test]
async fn test_distribute_requires_version_selection() {
    let mut plan = plan(&["d1"], 2);
    plan.app_versions.remove("app-2");
    let fixture = Fixture::new(plan);
    let mut reporter = RecordingReporter::default();

    let err = distribute::execute(&fixture.ctx(), &mut reporter)
        .await
        .unwrap_err();

    assert!(matches!(err, StepError::MissingVersionSelection { ref app_id } if app_id == "app-2"));
    assert_eq!(
        err.to_string(),
        "No version selected for app app-2. Please select a version in the app selection step."
    );
    // app-1 went out before the gap was found
    assert_eq!(reporter.commands.len(), 1);
}

#[tokio::test]
async fn test_distribute_surfaces_backend_message() {
    let fixture = Fixture::new(plan(&["d1"], 1));
    fixture.api.fail_command("INSTALL", 1);
    let mut reporter = RecordingReporter::default();

    let err = distribute::execute(&fixture.ctx(), &mut reporter)
        .await
        .unwrap_err();

    assert!(matches!(err, StepError::Client(DeployerError::ApiError { status: 500, .. })));
    assert_eq!(err.to_string(), "Internal server error");
    assert!(reporter.commands.is_empty());
}

#[tokio::test]
async fn test_distribute_without_apps() {
    let fixture = Fixture::new(plan(&["d1"], 0));
    let mut reporter = RecordingReporter::default();

    let message = distribute::execute(&fixture.ctx(), &mut reporter).await.unwrap();
    assert_eq!(message, "No applications to distribute");
    assert!(fixture.api.issued().is_empty());
}

// =================================== VERIFY ======================================= //

async fn distribute_first(fixture: &mut Fixture) {
    let mut reporter = RecordingReporter::default();
    assert_ok!(distribute::execute(&fixture.ctx(), &mut reporter).await);
    fixture.ledger = reporter.commands;
}

#[tokio::test(start_paused = true)]
async fn test_verify_waits_for_terminal_states() {
    let mut fixture = Fixture::new(plan(&["d1", "d2"], 1));
    fixture.api.script_states(
        "INSTALL",
        vec![
            CommandState::Queued,
            CommandState::InProgress,
            CommandState::Success,
        ],
    );
    distribute_first(&mut fixture).await;

    let started = Instant::now();
    let mut reporter = RecordingReporter::default();
    let message = verify::execute(&fixture.ctx(), &mut reporter).await.unwrap();

    assert_eq!(
        message,
        "Verification completed successfully: 2/2 command(s) succeeded across 1 deployment(s)"
    );
    assert_eq!(fixture.api.status_polls("cmd-1"), 3);
    assert_eq!(started.elapsed(), Duration::from_secs(10));

    // live status published on every poll
    assert_eq!(reporter.device_statuses.len(), 3);
    assert_eq!(reporter.device_statuses[0].summary.in_progress, 2);
    assert_eq!(reporter.device_statuses[2].summary.successful, 2);
    assert!(reporter.commands.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_verify_reports_partial_failure() {
    let mut fixture = Fixture::new(plan(&["d1", "d2"], 1));
    fixture
        .api
        .script_device_states("INSTALL", "d2", vec![CommandState::Failure]);
    distribute_first(&mut fixture).await;

    let mut reporter = RecordingReporter::default();
    let err = verify::execute(&fixture.ctx(), &mut reporter)
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Installation failed: 1 command(s) failed out of 2 total"
    );

    let details: serde_json::Value = serde_json::from_str(&err.technical_details()).unwrap();
    assert_eq!(details["successCount"], 1);
    assert_eq!(details["failureCount"], 1);
    assert_eq!(details["commandIds"], json!(["cmd-1"]));
    assert_eq!(details["rawResponse"].as_array().map(Vec::len), Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_verify_times_out_after_ten_minutes() {
    let mut fixture = Fixture::new(plan(&["d1"], 1));
    fixture
        .api
        .script_states("INSTALL", vec![CommandState::InProgress]);
    distribute_first(&mut fixture).await;

    let started = Instant::now();
    let mut reporter = RecordingReporter::default();
    let err = verify::execute(&fixture.ctx(), &mut reporter)
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Verification timeout: Commands did not complete after 10 minutes"
    );
    assert_eq!(started.elapsed(), Duration::from_secs(600));
    assert_eq!(fixture.api.status_polls("cmd-1"), 121);
}

#[tokio::test(start_paused = true)]
async fn test_verify_keeps_polling_empty_status_lists() {
    let mut fixture = Fixture::new(plan(&["d1"], 1));
    fixture.api.script_states("INSTALL", Vec::new());
    distribute_first(&mut fixture).await;

    let mut reporter = RecordingReporter::default();
    let err = verify::execute(&fixture.ctx(), &mut reporter)
        .await
        .unwrap_err();

    match err {
        StepError::PollTimeout { statuses, .. } => assert!(statuses.is_empty()),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_verify_treats_scheduled_as_failure() {
    let mut fixture = Fixture::new(plan(&["d1"], 1));
    fixture
        .api
        .script_states("INSTALL", vec![CommandState::Scheduled]);
    distribute_first(&mut fixture).await;

    let mut reporter = RecordingReporter::default();
    let err = assert_err!(verify::execute(&fixture.ctx(), &mut reporter).await);
    assert!(matches!(
        err,
        StepError::PartialCommandFailure {
            success_count: 0,
            failure_count: 1,
            ..
        }
    ));
}

#[tokio::test]
async fn test_verify_without_commands() {
    let fixture = Fixture::new(plan(&["d1"], 1));
    let mut reporter = RecordingReporter::default();

    let message = verify::execute(&fixture.ctx(), &mut reporter).await.unwrap();
    assert_eq!(message, "No command responses available for verification");
}

// ==================================== ENABLE ====================================== //

#[tokio::test]
async fn test_enable_issues_set_app_state_per_package() {
    let fixture = Fixture::new(plan(&["d1"], 2));
    let mut reporter = RecordingReporter::default();

    let message = enable::execute(&fixture.ctx(), &mut reporter).await.unwrap();

    assert_eq!(
        message,
        "Successfully enabled 2 app(s) (App 1, App 2) on 1 device(s)"
    );
    assert_eq!(reporter.commands.len(), 2);

    let bodies = fixture.api.bodies();
    assert_eq!(bodies[0]["command"], "SET_APP_STATE");
    assert_eq!(
        bodies[1]["command_args"],
        json!({"package_name": package(2), "app_state": "SHOW"})
    );
}

#[tokio::test]
async fn test_enable_skips_without_app_data() {
    let mut plan = plan(&["d1"], 1);
    plan.applications_data.clear();
    let fixture = Fixture::new(plan);
    let mut reporter = RecordingReporter::default();

    let message = enable::execute(&fixture.ctx(), &mut reporter).await.unwrap();
    assert_eq!(message, "No apps to enable");
    assert!(fixture.api.issued().is_empty());
}

// =================================== VALIDATE ===================================== //

#[tokio::test(start_paused = true)]
async fn test_validate_waits_for_packages() {
    let fixture = Fixture::new(plan(&["d1", "d2"], 2));
    fixture
        .api
        .script_installed("d1", vec![vec![], vec!["com.example.app1", "com.example.app2"]]);
    fixture.api.script_installed(
        "d2",
        vec![vec!["com.example.app1", "com.example.app2", "com.android.chrome"]],
    );

    let started = Instant::now();
    let mut reporter = RecordingReporter::default();
    let message = validate::execute(&fixture.ctx(), &mut reporter).await.unwrap();

    assert_eq!(
        message,
        "Validation completed: All 2 app(s) verified on 2 device(s)"
    );
    assert_eq!(started.elapsed(), Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_validate_mismatch_after_timeout() {
    let fixture = Fixture::new(plan(&["d1", "d2", "d3"], 2));
    fixture
        .api
        .script_installed("d1", vec![vec!["com.example.app1", "com.example.app2"]]);
    fixture
        .api
        .script_installed("d2", vec![vec!["com.example.app1"]]);
    fixture.api.break_device("d3");

    let started = Instant::now();
    let mut reporter = RecordingReporter::default();
    let err = validate::execute(&fixture.ctx(), &mut reporter)
        .await
        .unwrap_err();

    assert_eq!(started.elapsed(), Duration::from_secs(300));
    assert_eq!(
        err.to_string(),
        "Validation failed: Apps not found on 2 device(s) after 5 minutes \
         (d2: missing com.example.app2; d3: missing com.example.app1, com.example.app2)"
    );

    match err {
        StepError::ValidationMismatch {
            total_devices,
            failed_devices,
            ..
        } => {
            assert_eq!(total_devices, 3);
            assert_eq!(failed_devices[0].installed_count, 1);
            assert!(failed_devices[0].error.is_none());
            assert_eq!(failed_devices[1].installed_count, 0);
            assert!(failed_devices[1].error.is_some());
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_validate_skips_without_app_data() {
    let mut plan = plan(&["d1"], 1);
    plan.applications_data.clear();
    let fixture = Fixture::new(plan);
    let mut reporter = RecordingReporter::default();

    let message = validate::execute(&fixture.ctx(), &mut reporter).await.unwrap();
    assert_eq!(message, "App validation skipped - no app data available");
}

// ============================ LAUNCH / SCREENSHOT / LAUNCHER ============================ //

#[tokio::test]
async fn test_launch_sends_main_activity_intent() {
    let mut plan = plan(&["d1"], 2);
    plan.launch_apps = vec!["app-2".to_string()];
    let fixture = Fixture::new(plan);
    let mut reporter = RecordingReporter::default();

    let message = launch::execute(&fixture.ctx(), &mut reporter).await.unwrap();

    assert_eq!(message, "Successfully launched 1 app(s) (App 2) on 1 device(s)");
    assert_eq!(reporter.commands.len(), 1);

    let body = &fixture.api.bodies()[0];
    assert_eq!(body["command"], "UPDATE_DEVICE_CONFIG");
    assert_eq!(body["schedule"], "IMMEDIATE");
    assert_eq!(
        body["command_args"]["custom_settings_config"]["scripts"][0],
        json!({
            "action": "LAUNCH",
            "actionParams": {
                "flags": 270532608,
                "launchType": "ACTIVITY",
                "intentAction": "android.intent.action.MAIN",
                "componentName": "com.example.app2/com.example.app2.MainActivity",
            }
        })
    );
}

#[tokio::test]
async fn test_launch_without_metadata() {
    let mut plan = plan(&["d1"], 1);
    plan.launch_apps = vec!["app-9".to_string()];
    let fixture = Fixture::new(plan);
    let mut reporter = RecordingReporter::default();

    let message = launch::execute(&fixture.ctx(), &mut reporter).await.unwrap();
    assert_eq!(message, "No app data available for launch");
    assert!(fixture.api.issued().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_screenshot_waits_for_upload_grace() {
    let fixture = Fixture::new(plan(&["d1", "d2"], 1));
    let mut reporter = RecordingReporter::default();

    let started = Instant::now();
    let message = screenshot::execute(&fixture.ctx(), &mut reporter).await.unwrap();

    assert_eq!(
        message,
        "Screenshot capture completed successfully: 2/2 device(s) captured screenshots"
    );
    assert_eq!(started.elapsed(), Duration::from_secs(15));
    assert_eq!(reporter.commands.len(), 1);

    let body = &fixture.api.bodies()[0];
    assert_eq!(body["command"], "CAPTURE_SCREENSHOT");
    assert_eq!(body["device_type"], "active");
    assert_eq!(body["command_args"]["tag"], "post-deployment-screenshot");
}

#[tokio::test(start_paused = true)]
async fn test_screenshot_failure_skips_grace() {
    let fixture = Fixture::new(plan(&["d1"], 1));
    fixture
        .api
        .script_states("CAPTURE_SCREENSHOT", vec![CommandState::Failure]);
    let mut reporter = RecordingReporter::default();

    let started = Instant::now();
    let err = screenshot::execute(&fixture.ctx(), &mut reporter)
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Screenshot capture failed: 1 command(s) failed out of 1 total"
    );
    assert_eq!(started.elapsed(), Duration::ZERO);
    // the command was recorded before polling started
    assert_eq!(reporter.commands.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_screenshot_times_out_after_ten_minutes() {
    let fixture = Fixture::new(plan(&["d1"], 1));
    fixture
        .api
        .script_states("CAPTURE_SCREENSHOT", vec![CommandState::InProgress]);
    let mut reporter = RecordingReporter::default();

    let started = Instant::now();
    let err = screenshot::execute(&fixture.ctx(), &mut reporter)
        .await
        .unwrap_err();

    assert!(matches!(err, StepError::PollTimeout { .. }));
    assert_eq!(
        err.to_string(),
        "Screenshot capture timeout: Commands did not complete after 10 minutes"
    );
    // no grace period after a timeout
    assert_eq!(started.elapsed(), Duration::from_secs(600));
    assert_eq!(fixture.api.status_polls("cmd-1"), 121);
}

#[tokio::test(start_paused = true)]
async fn test_launcher_relaunches_home() {
    let fixture = Fixture::new(plan(&["d1", "d2"], 1));
    let mut reporter = RecordingReporter::default();

    let started = Instant::now();
    let message = launcher::execute(&fixture.ctx(), &mut reporter).await.unwrap();

    assert_eq!(
        message,
        "Successfully relaunched home launcher on 2 device(s)"
    );
    assert_eq!(started.elapsed(), Duration::from_secs(15));
    assert_eq!(
        fixture.api.bodies()[0]["command_args"]["custom_settings_config"]["scripts"][0]
            ["actionParams"]["componentName"],
        "io.shoonya.shoonyadpc/com.shoonyaos.shoonyadpc.activities.Dashboard"
    );
}

#[tokio::test]
async fn test_reboot_is_not_recorded() {
    let fixture = Fixture::new(plan(&["d1", "d2", "d3"], 1));
    let mut reporter = RecordingReporter::default();

    let message = reboot::execute(&fixture.ctx(), &mut reporter).await.unwrap();

    assert_eq!(message, "Successfully initiated reboot on 3 device(s)");
    assert_eq!(fixture.api.issued(), vec!["REBOOT"]);
    assert!(reporter.commands.is_empty());
}

// ================================= CREDENTIALS ==================================== //

#[tokio::test]
async fn test_validate_credentials_maps_statuses() {
    let api = MockApi::new();
    let credentials = credentials();

    let enterprise = api.validate_credentials(&credentials).await.unwrap();
    assert_eq!(enterprise.id, "ent-1");

    for (status, message) in [
        (401, "Invalid API key"),
        (404, "Invalid tenant ID or enterprise ID"),
        (403, "Invalid credentials"),
    ] {
        api.reject_enterprise(status);
        let err = api.validate_credentials(&credentials).await.unwrap_err();
        assert!(matches!(err, DeployerError::InvalidCredentials(_)));
        assert_eq!(err.to_string(), message);
    }

    api.reject_enterprise(503);
    let err = api.validate_credentials(&credentials).await.unwrap_err();
    assert_eq!(err.status(), Some(503));
}

#[tokio::test]
async fn test_latest_screenshot() {
    let api = MockApi::new();
    api.add_screenshot("d1", "https://cdn.example/d1.png");

    let shot = api.latest_screenshot(&credentials(), "d1").await.unwrap();
    assert_eq!(shot.map(|s| s.image_file).as_deref(), Some("https://cdn.example/d1.png"));
    assert!(api.latest_screenshot(&credentials(), "d2").await.unwrap().is_none());
}
