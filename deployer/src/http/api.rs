//! Remote command operations against the MDM backend

use async_trait::async_trait;
use futures::future::try_join_all;
use tracing::debug;

use crate::errors::DeployerError;
use crate::models::command::{
    main_activity, CommandRequest, CommandResponse, CommandStatus, HOME_LAUNCHER_COMPONENT,
};
use crate::models::credentials::Credentials;
use crate::models::deployment::AppInfo;
use crate::models::device::{DeviceApp, EnterpriseSettings, Screenshot};

/// MDM backend transport.
///
/// Implementors provide the wire primitives; the bulk operations the
/// pipeline issues are built on top of them.
#[async_trait]
pub trait MdmApi: Send + Sync {
    /// `POST /v0/enterprise/{enterprise}/command/`
    async fn issue_command(
        &self,
        credentials: &Credentials,
        request: &CommandRequest,
    ) -> Result<CommandResponse, DeployerError>;

    /// `GET /v0/enterprise/{enterprise}/command/{id}/status/`
    async fn command_status(
        &self,
        credentials: &Credentials,
        command_id: &str,
    ) -> Result<Vec<CommandStatus>, DeployerError>;

    /// `GET /enterprise/{enterprise}/device/{id}/app/`
    async fn device_apps(
        &self,
        credentials: &Credentials,
        device_id: &str,
    ) -> Result<Vec<DeviceApp>, DeployerError>;

    /// `GET /v1/enterprise/{enterprise}/`
    async fn enterprise_settings(
        &self,
        credentials: &Credentials,
    ) -> Result<EnterpriseSettings, DeployerError>;

    /// `GET /v0/enterprise/{enterprise}/device/{id}/screenshot/`, newest first
    async fn device_screenshots(
        &self,
        credentials: &Credentials,
        device_id: &str,
        limit: u32,
    ) -> Result<Vec<Screenshot>, DeployerError>;

    /// Install one application version on all devices with a single command
    async fn deploy_app(
        &self,
        credentials: &Credentials,
        device_ids: &[String],
        version_id: &str,
    ) -> Result<CommandResponse, DeployerError> {
        debug!(
            "Issuing INSTALL of version {} to {} device(s)",
            version_id,
            device_ids.len()
        );
        self.issue_command(credentials, &CommandRequest::install(device_ids, version_id))
            .await
    }

    /// One SET_APP_STATE command per application, issued concurrently
    async fn enable_apps(
        &self,
        credentials: &Credentials,
        device_ids: &[String],
        apps: &[AppInfo],
    ) -> Result<Vec<CommandResponse>, DeployerError> {
        let requests = apps.iter().map(|app| {
            let request = CommandRequest::set_app_state(device_ids, &app.package_name);
            async move { self.issue_command(credentials, &request).await }
        });
        try_join_all(requests).await
    }

    /// One launch-intent command per application, issued concurrently
    async fn launch_apps(
        &self,
        credentials: &Credentials,
        device_ids: &[String],
        apps: &[&AppInfo],
    ) -> Result<Vec<CommandResponse>, DeployerError> {
        let requests = apps.iter().map(|app| {
            let request =
                CommandRequest::launch_component(device_ids, &main_activity(&app.package_name));
            async move { self.issue_command(credentials, &request).await }
        });
        try_join_all(requests).await
    }

    /// Bring the home launcher back to the foreground
    async fn launch_launcher_home(
        &self,
        credentials: &Credentials,
        device_ids: &[String],
    ) -> Result<CommandResponse, DeployerError> {
        self.issue_command(
            credentials,
            &CommandRequest::launch_component(device_ids, HOME_LAUNCHER_COMPONENT),
        )
        .await
    }

    async fn reboot_devices(
        &self,
        credentials: &Credentials,
        device_ids: &[String],
    ) -> Result<CommandResponse, DeployerError> {
        self.issue_command(credentials, &CommandRequest::reboot(device_ids))
            .await
    }

    async fn capture_screenshots(
        &self,
        credentials: &Credentials,
        device_ids: &[String],
        tag: &str,
    ) -> Result<CommandResponse, DeployerError> {
        self.issue_command(credentials, &CommandRequest::capture_screenshot(device_ids, tag))
            .await
    }

    async fn poll_command_status(
        &self,
        credentials: &Credentials,
        command_id: &str,
    ) -> Result<Vec<CommandStatus>, DeployerError> {
        self.command_status(credentials, command_id).await
    }

    async fn get_device_installed_apps(
        &self,
        credentials: &Credentials,
        device_id: &str,
    ) -> Result<Vec<DeviceApp>, DeployerError> {
        self.device_apps(credentials, device_id).await
    }

    /// Check that the credentials address a reachable enterprise
    async fn validate_credentials(
        &self,
        credentials: &Credentials,
    ) -> Result<EnterpriseSettings, DeployerError> {
        match self.enterprise_settings(credentials).await {
            Ok(settings) => Ok(settings),
            Err(DeployerError::ApiError { status: 401, .. }) => Err(
                DeployerError::InvalidCredentials("Invalid API key".to_string()),
            ),
            Err(DeployerError::ApiError { status: 404, .. }) => Err(
                DeployerError::InvalidCredentials("Invalid tenant ID or enterprise ID".to_string()),
            ),
            Err(DeployerError::ApiError { status, .. }) if (400..500).contains(&status) => Err(
                DeployerError::InvalidCredentials("Invalid credentials".to_string()),
            ),
            Err(e) => Err(e),
        }
    }

    /// Most recent screenshot of a device, if any
    async fn latest_screenshot(
        &self,
        credentials: &Credentials,
        device_id: &str,
    ) -> Result<Option<Screenshot>, DeployerError> {
        let screenshots = self.device_screenshots(credentials, device_id, 1).await?;
        Ok(screenshots.into_iter().next())
    }
}
