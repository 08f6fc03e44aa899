//! Server state

use std::sync::Arc;

use crate::deploy::handle::DeploymentControl;
use crate::http::api::MdmApi;
use crate::models::credentials::Credentials;
use crate::models::deployment::DeploymentPlan;

/// Server state shared across handlers
pub struct ServerState {
    pub deployment: DeploymentControl,
    pub api: Arc<dyn MdmApi>,
    pub credentials: Arc<Credentials>,
    pub plan: Arc<DeploymentPlan>,
}

impl ServerState {
    pub fn new(
        deployment: DeploymentControl,
        api: Arc<dyn MdmApi>,
        credentials: Arc<Credentials>,
        plan: Arc<DeploymentPlan>,
    ) -> Self {
        Self {
            deployment,
            api,
            credentials,
            plan,
        }
    }
}
