//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use futures::future::join_all;
use serde::Serialize;
use tracing::warn;

use crate::deploy::orchestrator::{PipelineSnapshot, StepView};
use crate::errors::DeployerError;
use crate::models::device::Screenshot;
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "mdm-deployer".to_string(),
        version: version.version,
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    Json(version_info())
}

/// Pipeline state with display statuses
#[derive(Debug, Serialize)]
pub struct DeploymentResponse<'a> {
    pub run_id: &'a str,
    pub current_step: usize,
    pub has_failed: bool,
    pub is_complete: bool,
    pub running_steps: usize,
    pub steps: Vec<StepView<'a>>,
}

impl<'a> From<&'a PipelineSnapshot> for DeploymentResponse<'a> {
    fn from(snapshot: &'a PipelineSnapshot) -> Self {
        Self {
            run_id: &snapshot.run_id,
            current_step: snapshot.current_step,
            has_failed: snapshot.has_failed,
            is_complete: snapshot.is_complete,
            running_steps: snapshot.running_count(),
            steps: snapshot.views(),
        }
    }
}

/// Current deployment snapshot
pub async fn deployment_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<impl IntoResponse, StatusCode> {
    let snapshot = state.deployment.snapshot();
    let body = serde_json::to_value(DeploymentResponse::from(&snapshot))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(body))
}

/// Error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Re-arm a failed step
pub async fn retry_handler(
    State(state): State<Arc<ServerState>>,
    Path(index): Path<usize>,
) -> impl IntoResponse {
    let step_count = state.deployment.snapshot().steps.len();
    if index >= step_count {
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("No step at index {}", index),
            }),
        )
            .into_response();
    }

    match state.deployment.retry_step(index).await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e @ DeployerError::InvalidRetry(_)) => (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

/// Latest screenshot of one device
#[derive(Debug, Serialize)]
pub struct DeviceScreenshot {
    pub device_id: String,
    pub screenshot: Option<Screenshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Latest screenshot per selected device
pub async fn screenshots_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let state = &state;
    let lookups = state.plan.devices.iter().map(|device_id| {
        async move {
            match state
                .api
                .latest_screenshot(&state.credentials, device_id)
                .await
            {
                Ok(screenshot) => DeviceScreenshot {
                    device_id: device_id.clone(),
                    screenshot,
                    error: None,
                },
                Err(e) => {
                    warn!("Failed to fetch screenshot for device {}: {}", device_id, e);
                    DeviceScreenshot {
                        device_id: device_id.clone(),
                        screenshot: None,
                        error: Some(e.to_string()),
                    }
                }
            }
        }
    });

    Json(join_all(lookups).await)
}
