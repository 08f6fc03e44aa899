//! Main application run loop

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::app::options::AppOptions;
use crate::deploy::handle::DeploymentHandle;
use crate::deploy::orchestrator::{Orchestrator, PipelineSnapshot};
use crate::errors::DeployerError;
use crate::http::api::MdmApi;
use crate::http::client::EsperClient;
use crate::models::credentials::Credentials;
use crate::models::deployment::DeploymentPlan;
use crate::server::serve::serve;
use crate::server::state::ServerState;

const MAX_SHUTDOWN_DELAY: Duration = Duration::from_secs(10);

/// Build the MDM client the options describe
pub fn build_client(options: &AppOptions) -> Result<EsperClient, DeployerError> {
    match &options.api_base_url {
        Some(base_url) => EsperClient::with_base_url(base_url, options.request_timeout),
        None => EsperClient::new(options.request_timeout),
    }
}

/// Validate credentials, then run the deployment pipeline.
///
/// Returns the final snapshot. Without the local server the run ends at the
/// first failure; with it, the process waits for a retry, completion, or
/// the shutdown signal.
pub async fn run(
    options: AppOptions,
    credentials: Credentials,
    plan: DeploymentPlan,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<PipelineSnapshot, DeployerError> {
    let api: Arc<dyn MdmApi> = Arc::new(build_client(&options)?);

    let enterprise = api.validate_credentials(&credentials).await?;
    info!("Authenticated against enterprise {} ({})", enterprise.name, enterprise.id);

    run_pipeline(options, api, Arc::new(credentials), Arc::new(plan), shutdown_signal).await
}

/// Run the pipeline against an already constructed API client
pub async fn run_pipeline(
    options: AppOptions,
    api: Arc<dyn MdmApi>,
    credentials: Arc<Credentials>,
    plan: Arc<DeploymentPlan>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<PipelineSnapshot, DeployerError> {
    let orchestrator = Orchestrator::new(
        api.clone(),
        credentials.clone(),
        plan.clone(),
        options.pipeline.clone(),
    )
    .with_completion_callback(Box::new(|completed| {
        if completed {
            info!("Deployment complete");
        }
    }));

    let handle = DeploymentHandle::spawn(orchestrator);
    let control = handle.control();

    // Create shutdown channel
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);

    let server_handle = if options.enable_server {
        let state = ServerState::new(control.clone(), api, credentials, plan);
        let mut shutdown_rx = shutdown_tx.subscribe();
        Some(
            serve(&options.server, Arc::new(state), async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?,
        )
    } else {
        None
    };

    let settled = async {
        if options.enable_server {
            control.wait_complete().await
        } else {
            control.wait_settled().await
        }
    };

    let interrupted = tokio::select! {
        result = settled => {
            result?;
            false
        }
        _ = shutdown_signal => {
            info!("Shutdown signal received, shutting down...");
            true
        }
    };

    let snapshot = control.snapshot();
    drop(control);
    shutdown(shutdown_tx, server_handle, handle, interrupted).await?;
    Ok(snapshot)
}

async fn shutdown(
    shutdown_tx: broadcast::Sender<()>,
    server_handle: Option<JoinHandle<Result<(), DeployerError>>>,
    deployment: DeploymentHandle,
    interrupted: bool,
) -> Result<(), DeployerError> {
    let _ = shutdown_tx.send(());

    let shutdown_impl = async {
        // 1. Socket server, which holds a deployment control
        if let Some(handle) = server_handle {
            handle
                .await
                .map_err(|e| DeployerError::ServerError(e.to_string()))??;
        }

        // 2. Deployment driver
        if interrupted {
            warn!("Abandoning the deployment mid-run; issued commands keep executing on devices");
            deployment.abort();
        } else {
            deployment.finish().await?;
        }

        Ok::<(), DeployerError>(())
    };

    match tokio::time::timeout(MAX_SHUTDOWN_DELAY, shutdown_impl).await {
        Ok(result) => {
            info!("Shutdown complete");
            result
        }
        Err(_) => {
            error!("Shutdown timed out after {:?}", MAX_SHUTDOWN_DELAY);
            Err(DeployerError::Internal("shutdown timed out".to_string()))
        }
    }
}
