//! Credentials and deployment plan files

use crate::errors::DeployerError;
use crate::filesys::file::File;
use crate::models::credentials::Credentials;
use crate::models::deployment::DeploymentPlan;

/// Environment variable that overrides the API key from the credentials file
pub const API_KEY_ENV: &str = "MDM_API_KEY";

/// Load the credentials file, letting `api_key_override` replace its key
pub async fn load_credentials(
    credentials_file: &File,
    api_key_override: Option<String>,
) -> Result<Credentials, DeployerError> {
    if !credentials_file.exists().await {
        return Err(DeployerError::ConfigError(format!(
            "Credentials file {} does not exist",
            credentials_file.path().display()
        )));
    }

    let mut credentials: Credentials = credentials_file.read_json().await.map_err(|e| {
        DeployerError::ConfigError(format!("Failed to read credentials file: {}", e))
    })?;

    if let Some(api_key) = api_key_override.filter(|key| !key.is_empty()) {
        credentials = credentials.with_api_key(api_key);
    }

    if !credentials.is_complete() {
        return Err(DeployerError::InvalidCredentials(
            "Tenant ID, enterprise ID and API key are all required".to_string(),
        ));
    }

    Ok(credentials)
}

/// Load and sanity-check a deployment plan
pub async fn load_plan(plan_file: &File) -> Result<DeploymentPlan, DeployerError> {
    let plan: DeploymentPlan = plan_file.read_json().await.map_err(|e| {
        DeployerError::ConfigError(format!("Failed to read deployment plan: {}", e))
    })?;

    if plan.devices.is_empty() {
        return Err(DeployerError::ConfigError(
            "Deployment plan selects no devices".to_string(),
        ));
    }

    if let Some(app_id) = plan
        .launch_apps
        .iter()
        .find(|id| !plan.applications.contains(id))
    {
        return Err(DeployerError::ConfigError(format!(
            "Launch app {} is not among the selected applications",
            app_id
        )));
    }

    Ok(plan)
}
