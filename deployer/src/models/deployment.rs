//! Deployment plan models

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Package metadata for a selected application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    /// Application ID in the MDM catalog
    pub app_id: String,

    /// Android package name matched against installed apps
    pub package_name: String,

    /// Display name
    pub application_name: String,
}

/// Selections gathered by the wizard before results start
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeploymentPlan {
    /// Target device IDs
    #[serde(default)]
    pub devices: Vec<String>,

    /// Selected application IDs, in install order
    #[serde(default)]
    pub applications: Vec<String>,

    /// Application ID -> chosen version ID
    #[serde(default)]
    pub app_versions: HashMap<String, String>,

    /// Package metadata for the selected applications
    #[serde(default)]
    pub applications_data: Vec<AppInfo>,

    /// Application IDs to auto-start after install
    #[serde(default)]
    pub launch_apps: Vec<String>,

    /// Reboot devices once everything else is done
    #[serde(default)]
    pub reboot_after_deploy: bool,
}

impl DeploymentPlan {
    /// Version chosen for an application, if any
    pub fn version_for(&self, app_id: &str) -> Option<&str> {
        self.app_versions.get(app_id).map(String::as_str)
    }

    /// Packages every device must end up with
    pub fn expected_packages(&self) -> Vec<String> {
        self.applications_data
            .iter()
            .map(|app| app.package_name.clone())
            .collect()
    }

    /// Metadata of the auto-start applications that are known
    pub fn launch_targets(&self) -> Vec<&AppInfo> {
        self.launch_apps
            .iter()
            .filter_map(|id| self.applications_data.iter().find(|app| &app.app_id == id))
            .collect()
    }
}
