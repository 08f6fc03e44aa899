//! Device-side records read back from the MDM backend

use serde::{Deserialize, Serialize};

/// An application installed on a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceApp {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub app_name: String,
    pub package_name: String,
    #[serde(default)]
    pub version_name: Option<String>,
    #[serde(default)]
    pub version_code: Option<String>,
    #[serde(default)]
    pub app_type: Option<String>,
    #[serde(default)]
    pub is_system: bool,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceAppList {
    #[serde(default)]
    pub results: Vec<DeviceApp>,
}

/// A screenshot captured on a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screenshot {
    pub id: String,
    pub device: String,
    #[serde(default)]
    pub image_file: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub created_on: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScreenshotList {
    #[serde(default)]
    pub results: Vec<Screenshot>,
}

/// Enterprise record returned when credentials are valid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnterpriseSettings {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub short_code: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
}
