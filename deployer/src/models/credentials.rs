//! MDM tenant credentials

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// Credentials addressing one tenant and enterprise
#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub tenant_id: String,
    pub enterprise_id: String,
    #[serde(alias = "apiKey")]
    api_key: SecretString,
}

impl Credentials {
    pub fn new(
        tenant_id: impl Into<String>,
        enterprise_id: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            enterprise_id: enterprise_id.into(),
            api_key: SecretString::from(api_key.into()),
        }
    }

    /// Replace the API key, e.g. from the environment
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = SecretString::from(api_key.into());
        self
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.api_key.expose_secret())
    }

    pub fn is_complete(&self) -> bool {
        !self.tenant_id.is_empty()
            && !self.enterprise_id.is_empty()
            && !self.api_key.expose_secret().is_empty()
    }
}
