//! HTTP client implementation

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, error};
use url::Url;

use crate::errors::DeployerError;
use crate::http::api::MdmApi;
use crate::models::command::{CommandRequest, CommandResponse, CommandStatus, CommandStatusList};
use crate::models::credentials::Credentials;
use crate::models::device::{DeviceApp, DeviceAppList, EnterpriseSettings, Screenshot, ScreenshotList};

/// Esper MDM API client
pub struct EsperClient {
    client: Client,
    base_url: Option<String>,
}

/// Error body returned by the backend
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errors: Vec<String>,
}

impl EsperClient {
    /// Create a new client addressing each tenant's own API host
    pub fn new(timeout: Duration) -> Result<Self, DeployerError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: None,
        })
    }

    /// Create a new client pinned to a fixed base URL
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, DeployerError> {
        Url::parse(base_url)
            .map_err(|e| DeployerError::ConfigError(format!("Invalid API base URL {base_url}: {e}")))?;

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: Some(base_url.trim_end_matches('/').to_string()),
        })
    }

    /// Get the base URL for a tenant
    pub fn base_url(&self, credentials: &Credentials) -> String {
        match &self.base_url {
            Some(url) => url.clone(),
            None => format!("https://{}-api.esper.cloud/api", credentials.tenant_id),
        }
    }

    /// Make a GET request
    async fn get<T: DeserializeOwned>(
        &self,
        credentials: &Credentials,
        path: &str,
        query: &[(&str, String)],
        context: &str,
    ) -> Result<T, DeployerError> {
        let url = format!("{}{}", self.base_url(credentials), path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header(header::AUTHORIZATION, credentials.bearer())
            .query(query)
            .send()
            .await?;

        parse_response(response, context).await
    }

    /// Make a POST request
    async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        credentials: &Credentials,
        path: &str,
        body: &B,
        context: &str,
    ) -> Result<T, DeployerError> {
        let url = format!("{}{}", self.base_url(credentials), path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, credentials.bearer())
            .json(body)
            .send()
            .await?;

        parse_response(response, context).await
    }
}

async fn parse_response<T: DeserializeOwned>(
    response: Response,
    context: &str,
) -> Result<T, DeployerError> {
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        error!("{} failed: {} - {}", context, status, body);
        return Err(DeployerError::ApiError {
            status: status.as_u16(),
            message: error_message(&body, &format!("{}: {}", context, status.as_u16())),
        });
    }

    let body = response.text().await?;
    serde_json::from_str(&body)
        .map_err(|e| DeployerError::MalformedResponse(format!("{}: {}", context, e)))
}

/// Best-effort message from a JSON error body
fn error_message(body: &str, fallback: &str) -> String {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    parsed
        .message
        .filter(|m| !m.is_empty())
        .or_else(|| parsed.errors.into_iter().next())
        .unwrap_or_else(|| fallback.to_string())
}

#[async_trait]
impl MdmApi for EsperClient {
    async fn issue_command(
        &self,
        credentials: &Credentials,
        request: &CommandRequest,
    ) -> Result<CommandResponse, DeployerError> {
        let path = format!("/v0/enterprise/{}/command/", credentials.enterprise_id);
        let context = format!("Failed to issue {:?} command", request.command);
        self.post(credentials, &path, request, &context).await
    }

    async fn command_status(
        &self,
        credentials: &Credentials,
        command_id: &str,
    ) -> Result<Vec<CommandStatus>, DeployerError> {
        let path = format!(
            "/v0/enterprise/{}/command/{}/status/",
            credentials.enterprise_id, command_id
        );
        let list: CommandStatusList = self
            .get(credentials, &path, &[], "Failed to get command status")
            .await?;
        Ok(list.results)
    }

    async fn device_apps(
        &self,
        credentials: &Credentials,
        device_id: &str,
    ) -> Result<Vec<DeviceApp>, DeployerError> {
        let path = format!(
            "/enterprise/{}/device/{}/app/",
            credentials.enterprise_id, device_id
        );
        let list: DeviceAppList = self
            .get(credentials, &path, &[], "Failed to get device apps")
            .await?;
        Ok(list.results)
    }

    async fn enterprise_settings(
        &self,
        credentials: &Credentials,
    ) -> Result<EnterpriseSettings, DeployerError> {
        let path = format!("/v1/enterprise/{}/", credentials.enterprise_id);
        self.get(credentials, &path, &[], "Failed to validate credentials")
            .await
    }

    async fn device_screenshots(
        &self,
        credentials: &Credentials,
        device_id: &str,
        limit: u32,
    ) -> Result<Vec<Screenshot>, DeployerError> {
        let path = format!(
            "/v0/enterprise/{}/device/{}/screenshot/",
            credentials.enterprise_id, device_id
        );
        let query = [
            ("limit", limit.to_string()),
            ("ordering", "-created_on".to_string()),
        ];
        let list: ScreenshotList = self
            .get(credentials, &path, &query, "Failed to get device screenshots")
            .await?;
        Ok(list.results)
    }
}
