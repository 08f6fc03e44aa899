//! Error types for the deployer

use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::models::command::CommandStatus;

/// Main error type for the deployer
#[derive(Error, Debug)]
pub enum DeployerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("{message}")]
    ApiError { status: u16, message: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("{0}")]
    InvalidCredentials(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid retry: {0}")]
    InvalidRetry(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for DeployerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DeployerError::MalformedResponse(err.to_string())
        } else {
            DeployerError::NetworkError(err.to_string())
        }
    }
}

impl DeployerError {
    /// HTTP status carried by an API error
    pub fn status(&self) -> Option<u16> {
        match self {
            DeployerError::ApiError { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A device that still lacks expected packages after validation gave up
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceShortfall {
    pub device_id: String,
    pub missing_packages: Vec<String>,
    pub installed_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Why a pipeline step failed
#[derive(Error, Debug)]
pub enum StepError {
    #[error(transparent)]
    Client(#[from] DeployerError),

    #[error("No version selected for app {app_id}. Please select a version in the app selection step.")]
    MissingVersionSelection { app_id: String },

    #[error("{operation} failed: {failure_count} command(s) failed out of {total} total")]
    PartialCommandFailure {
        operation: String,
        success_count: usize,
        failure_count: usize,
        total: usize,
        statuses: Vec<CommandStatus>,
        command_ids: Vec<String>,
    },

    #[error("{operation} timeout: Commands did not complete after {} minutes", minutes(.timeout))]
    PollTimeout {
        operation: String,
        timeout: Duration,
        statuses: Vec<CommandStatus>,
    },

    #[error(
        "Validation failed: Apps not found on {} device(s) after {} minutes ({})",
        .failed_devices.len(),
        minutes(.timeout),
        shortfall_summary(.failed_devices)
    )]
    ValidationMismatch {
        timeout: Duration,
        total_devices: usize,
        expected_packages: Vec<String>,
        failed_devices: Vec<DeviceShortfall>,
    },
}

impl StepError {
    /// Technical payload shown under a failed step
    pub fn technical_details(&self) -> String {
        let details = match self {
            StepError::PartialCommandFailure {
                operation,
                success_count,
                failure_count,
                total,
                statuses,
                command_ids,
            } => json!({
                "message": format!("{operation} failed: {failure_count} of {total} command(s) failed"),
                "rawResponse": statuses,
                "successCount": success_count,
                "failureCount": failure_count,
                "totalCommands": command_ids.len(),
                "commandIds": command_ids,
            }),
            StepError::PollTimeout {
                operation,
                timeout,
                statuses,
            } => json!({
                "message": self.to_string(),
                "operation": operation,
                "timeoutSecs": timeout.as_secs(),
                "lastStatuses": statuses,
            }),
            StepError::ValidationMismatch {
                total_devices,
                expected_packages,
                failed_devices,
                ..
            } => json!({
                "message": format!(
                    "App validation failed on {}/{} device(s)",
                    failed_devices.len(),
                    total_devices
                ),
                "failedDevices": failed_devices,
                "expectedPackages": expected_packages,
            }),
            StepError::Client(err) => return format!("{err:?}"),
            StepError::MissingVersionSelection { .. } => return format!("{self:?}"),
        };

        serde_json::to_string_pretty(&details).unwrap_or_else(|_| details.to_string())
    }
}

fn minutes(duration: &Duration) -> u64 {
    duration.as_secs() / 60
}

fn shortfall_summary(devices: &[DeviceShortfall]) -> String {
    devices
        .iter()
        .map(|d| format!("{}: missing {}", d.device_id, d.missing_packages.join(", ")))
        .collect::<Vec<_>>()
        .join("; ")
}
