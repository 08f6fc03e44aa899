//! Orchestrator tests: sequencing, failure halting and retries

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use mdm_deployer::app::options::PipelineOptions;
use mdm_deployer::deploy::fsm::{DisplayStatus, StepStatus};
use mdm_deployer::deploy::orchestrator::{Orchestrator, PipelineOutcome};
use mdm_deployer::errors::DeployerError;
use mdm_deployer::models::command::CommandState;
use mdm_deployer::models::deployment::DeploymentPlan;

use crate::support::{credentials, install_everything, plan, MockApi};

fn orchestrator(api: &Arc<MockApi>, plan: DeploymentPlan) -> Orchestrator {
    Orchestrator::new(
        api.clone(),
        Arc::new(credentials()),
        Arc::new(plan),
        PipelineOptions::default(),
    )
}

fn statuses(orchestrator: &Orchestrator) -> Vec<StepStatus> {
    orchestrator.steps().iter().map(|s| s.status).collect()
}

fn ledger_ids(orchestrator: &Orchestrator) -> Vec<String> {
    orchestrator
        .command_responses()
        .iter()
        .map(|c| c.id.clone())
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_happy_path_runs_every_step() {
    let api = Arc::new(MockApi::new());
    let plan = plan(&["d1", "d2"], 2);
    install_everything(&api, &plan);

    let signals = Arc::new(Mutex::new(Vec::new()));
    let recorded = signals.clone();
    let mut orchestrator = orchestrator(&api, plan).with_completion_callback(Box::new(
        move |completed| recorded.lock().unwrap().push(completed),
    ));

    let started = Instant::now();
    let outcome = orchestrator.run().await.unwrap();

    assert_eq!(outcome, PipelineOutcome::Completed);
    assert!(orchestrator.is_complete());
    assert!(!orchestrator.has_failed());
    assert!(statuses(&orchestrator)
        .iter()
        .all(|s| *s == StepStatus::Completed));
    assert_eq!(
        api.issued(),
        vec!["INSTALL", "INSTALL", "SET_APP_STATE", "SET_APP_STATE"]
    );
    assert_eq!(ledger_ids(&orchestrator), vec!["cmd-1", "cmd-2", "cmd-3", "cmd-4"]);
    assert_eq!(*signals.lock().unwrap(), vec![false, true]);

    // 4 start delays and 3 advance delays; every poll succeeds at once
    assert_eq!(started.elapsed(), Duration::from_secs(7));

    let verify = &orchestrator.steps()[1];
    assert_eq!(verify.device_status.as_ref().map(|d| d.summary.successful), Some(2));
    assert!(verify.timestamp.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_full_plan_with_launch_and_reboot() {
    let api = Arc::new(MockApi::new());
    let mut plan = plan(&["d1"], 2);
    plan.launch_apps = vec!["app-1".to_string()];
    plan.reboot_after_deploy = true;
    install_everything(&api, &plan);

    let mut orchestrator = orchestrator(&api, plan);
    let outcome = orchestrator.run().await.unwrap();

    assert_eq!(outcome, PipelineOutcome::Completed);
    assert_eq!(
        api.issued(),
        vec![
            "INSTALL",
            "INSTALL",
            "SET_APP_STATE",
            "SET_APP_STATE",
            "UPDATE_DEVICE_CONFIG",
            "CAPTURE_SCREENSHOT",
            "UPDATE_DEVICE_CONFIG",
            "REBOOT",
        ]
    );
    // the reboot command is fire-and-forget
    assert_eq!(orchestrator.command_responses().len(), 7);
}

#[tokio::test(start_paused = true)]
async fn test_failure_halts_and_cancels_the_rest() {
    let api = Arc::new(MockApi::new());
    let plan = plan(&["d1", "d2"], 1);
    install_everything(&api, &plan);
    api.script_device_states("INSTALL", "d2", vec![CommandState::Failure]);

    let mut orchestrator = orchestrator(&api, plan);
    let mut snapshots = orchestrator.subscribe();

    let outcome = orchestrator.run().await.unwrap();
    assert_eq!(outcome, PipelineOutcome::Failed(1));
    assert!(orchestrator.has_failed());
    assert!(!orchestrator.is_complete());
    assert_eq!(
        statuses(&orchestrator),
        vec![
            StepStatus::Completed,
            StepStatus::Failed,
            StepStatus::Pending,
            StepStatus::Pending
        ]
    );
    // nothing after the failed step ran
    assert_eq!(api.issued(), vec!["INSTALL"]);

    let verify = &orchestrator.steps()[1];
    let failure = verify.error.as_ref().unwrap();
    assert_eq!(
        failure.message,
        "Installation failed: 1 command(s) failed out of 2 total"
    );
    assert_eq!(verify.details.as_deref(), Some(failure.message.as_str()));
    assert!(failure.technical_details.contains("\"failureCount\": 1"));

    let snapshot = snapshots.borrow_and_update().clone();
    assert!(snapshot.has_failed);
    assert_eq!(snapshot.current_step, 1);
    assert_eq!(snapshot.display_status(2), Some(DisplayStatus::Canceled));
    assert_eq!(snapshot.display_status(3), Some(DisplayStatus::Canceled));
}

#[tokio::test(start_paused = true)]
async fn test_retry_resumes_from_failed_step() {
    let api = Arc::new(MockApi::new());
    let plan = plan(&["d1", "d2"], 1);
    install_everything(&api, &plan);
    api.script_device_states("INSTALL", "d2", vec![CommandState::Failure]);

    let signals = Arc::new(Mutex::new(Vec::new()));
    let recorded = signals.clone();
    let mut orchestrator = orchestrator(&api, plan).with_completion_callback(Box::new(
        move |completed| recorded.lock().unwrap().push(completed),
    ));
    assert_eq!(orchestrator.run().await.unwrap(), PipelineOutcome::Failed(1));

    // the device recovers on its own; re-verify the same command
    api.script_device_states("INSTALL", "d2", vec![CommandState::Success]);
    orchestrator.retry_step(1).unwrap();

    let verify = &orchestrator.steps()[1];
    assert_eq!(verify.status, StepStatus::Pending);
    assert!(verify.error.is_none());
    assert!(!orchestrator.has_failed());

    assert_eq!(orchestrator.run().await.unwrap(), PipelineOutcome::Completed);
    assert_eq!(orchestrator.steps()[0].attempts, 1);
    assert_eq!(orchestrator.steps()[1].attempts, 2);
    // distribute is not re-issued on retry
    assert_eq!(api.issued(), vec!["INSTALL", "SET_APP_STATE"]);
    assert_eq!(*signals.lock().unwrap(), vec![false, true]);
}

#[tokio::test(start_paused = true)]
async fn test_retry_discards_commands_from_failed_attempt() {
    let api = Arc::new(MockApi::new());
    let mut plan = plan(&["d1"], 1);
    plan.launch_apps = vec!["app-1".to_string()];
    install_everything(&api, &plan);

    // INSTALL cmd-1, SET_APP_STATE cmd-2, launch cmd-3, screenshot cmd-4
    api.script_command_states("cmd-4", vec![CommandState::Failure]);

    let mut orchestrator = orchestrator(&api, plan);
    assert_eq!(orchestrator.run().await.unwrap(), PipelineOutcome::Failed(5));
    assert_eq!(ledger_ids(&orchestrator), vec!["cmd-1", "cmd-2", "cmd-3", "cmd-4"]);

    orchestrator.retry_step(5).unwrap();
    assert_eq!(ledger_ids(&orchestrator), vec!["cmd-1", "cmd-2", "cmd-3"]);

    assert_eq!(orchestrator.run().await.unwrap(), PipelineOutcome::Completed);
    assert_eq!(
        ledger_ids(&orchestrator),
        vec!["cmd-1", "cmd-2", "cmd-3", "cmd-5", "cmd-6"]
    );
    assert_eq!(orchestrator.steps()[5].attempts, 2);
}

#[tokio::test(start_paused = true)]
async fn test_retry_only_from_failed() {
    let api = Arc::new(MockApi::new());
    let plan = plan(&["d1"], 1);
    install_everything(&api, &plan);
    api.fail_command("SET_APP_STATE", 1);

    let mut orchestrator = orchestrator(&api, plan);

    // nothing has failed yet
    let err = orchestrator.retry_step(0).unwrap_err();
    assert!(matches!(err, DeployerError::InvalidRetry(_)));

    assert_eq!(orchestrator.run().await.unwrap(), PipelineOutcome::Failed(2));
    assert_eq!(
        orchestrator.steps()[2].error.as_ref().map(|e| e.message.as_str()),
        Some("Internal server error")
    );

    assert!(matches!(
        orchestrator.retry_step(1),
        Err(DeployerError::InvalidRetry(_))
    ));
    assert!(matches!(
        orchestrator.retry_step(3),
        Err(DeployerError::InvalidRetry(_))
    ));
    assert!(matches!(
        orchestrator.retry_step(42),
        Err(DeployerError::InvalidRetry(_))
    ));

    orchestrator.retry_step(2).unwrap();
    assert_eq!(orchestrator.run().await.unwrap(), PipelineOutcome::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_missing_version_fails_first_step() {
    let api = Arc::new(MockApi::new());
    let mut plan = plan(&["d1"], 1);
    plan.app_versions.clear();

    let mut orchestrator = orchestrator(&api, plan);
    assert_eq!(orchestrator.run().await.unwrap(), PipelineOutcome::Failed(0));
    assert!(api.issued().is_empty());
    assert_eq!(
        orchestrator.steps()[0].error.as_ref().map(|e| e.message.as_str()),
        Some("No version selected for app app-1. Please select a version in the app selection step.")
    );
}

#[tokio::test(start_paused = true)]
async fn test_validation_timeout_fails_pipeline() {
    let api = Arc::new(MockApi::new());
    let plan = plan(&["d1", "d2"], 1);
    api.script_installed("d1", vec![vec!["com.example.app1"]]);

    let mut orchestrator = orchestrator(&api, plan);
    assert_eq!(orchestrator.run().await.unwrap(), PipelineOutcome::Failed(3));

    let failure = orchestrator.steps()[3].error.clone().unwrap();
    assert_eq!(
        failure.message,
        "Validation failed: Apps not found on 1 device(s) after 5 minutes (d2: missing com.example.app1)"
    );
    let details: serde_json::Value = serde_json::from_str(&failure.technical_details).unwrap();
    assert_eq!(details["failedDevices"][0]["deviceId"], "d2");
    assert_eq!(details["failedDevices"][0]["installedCount"], 0);
}

#[tokio::test(start_paused = true)]
async fn test_empty_plan_completes_with_skips() {
    let api = Arc::new(MockApi::new());
    let plan = plan(&["d1"], 0);

    let mut orchestrator = orchestrator(&api, plan);
    assert_eq!(orchestrator.run().await.unwrap(), PipelineOutcome::Completed);

    let details: Vec<&str> = orchestrator
        .steps()
        .iter()
        .filter_map(|s| s.details.as_deref())
        .collect();
    assert_eq!(
        details,
        vec![
            "No applications to distribute",
            "No command responses available for verification",
            "No apps to enable",
            "App validation skipped - no app data available",
        ]
    );
    assert!(api.issued().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_at_most_one_step_running() {
    let api = Arc::new(MockApi::new());
    let mut plan = plan(&["d1", "d2"], 2);
    plan.launch_apps = vec!["app-2".to_string()];
    install_everything(&api, &plan);
    api.script_states(
        "INSTALL",
        vec![CommandState::Queued, CommandState::InProgress, CommandState::Success],
    );

    let mut orchestrator = orchestrator(&api, plan);
    let mut snapshots = orchestrator.subscribe();

    let watcher = tokio::spawn(async move {
        let mut max_running = 0;
        let mut saw_live_status = false;
        while snapshots.changed().await.is_ok() {
            let snapshot = snapshots.borrow_and_update().clone();
            max_running = max_running.max(snapshot.running_count());
            if snapshot.steps[1].status == StepStatus::Running
                && snapshot.steps[1].device_status.is_some()
            {
                saw_live_status = true;
            }
            if snapshot.is_complete {
                break;
            }
        }
        (max_running, saw_live_status)
    });

    assert_eq!(orchestrator.run().await.unwrap(), PipelineOutcome::Completed);
    let (max_running, saw_live_status) = watcher.await.unwrap();
    assert_eq!(max_running, 1);
    assert!(saw_live_status);
}
