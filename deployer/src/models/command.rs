//! Remote command models exchanged with the MDM backend

use serde::{Deserialize, Serialize};

/// Android intent flags sent with launch scripts
/// (FLAG_ACTIVITY_NEW_TASK | FLAG_ACTIVITY_RESET_TASK_IF_NEEDED)
pub const LAUNCH_FLAGS: u32 = 270_532_608;

/// Component relaunched by the launcher step
pub const HOME_LAUNCHER_COMPONENT: &str =
    "io.shoonya.shoonyadpc/com.shoonyaos.shoonyadpc.activities.Dashboard";

/// State of one command on one device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandState {
    #[serde(rename = "Command Queued")]
    Queued,
    #[serde(rename = "Command Initiated")]
    Initiated,
    #[serde(rename = "Command Acknowledged")]
    Acknowledged,
    #[serde(rename = "Command In Progress")]
    InProgress,
    #[serde(rename = "Command TimeOut")]
    TimeOut,
    #[serde(rename = "Command Success")]
    Success,
    #[serde(rename = "Command Failure")]
    Failure,
    #[serde(rename = "Command Scheduled")]
    Scheduled,
    #[serde(rename = "Command Cancelled")]
    Cancelled,
}

impl CommandState {
    /// No further transition happens once a device reaches a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CommandState::TimeOut
                | CommandState::Success
                | CommandState::Failure
                | CommandState::Scheduled
                | CommandState::Cancelled
        )
    }

    pub fn is_success(&self) -> bool {
        *self == CommandState::Success
    }
}

/// Per-device status of a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandStatus {
    #[serde(default)]
    pub id: String,
    pub device: String,
    pub state: CommandState,
    #[serde(default)]
    pub command_id: String,
    #[serde(default)]
    pub created_on: Option<String>,
    #[serde(default)]
    pub updated_on: Option<String>,
}

/// Handle to an issued bulk command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub id: String,
    #[serde(default)]
    pub enterprise: Option<String>,
    #[serde(default)]
    pub command_type: Option<String>,
    #[serde(default)]
    pub devices: Vec<String>,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub command_args: serde_json::Value,
    #[serde(default)]
    pub schedule: Option<String>,
    #[serde(default)]
    pub issued_by: Option<String>,
    #[serde(default)]
    pub created_on: Option<String>,
    #[serde(default)]
    pub status: Vec<CommandStatus>,
}

/// Envelope of the command status endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct CommandStatusList {
    #[serde(default)]
    pub results: Vec<CommandStatus>,
}

/// Device command names used by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandName {
    Install,
    SetAppState,
    UpdateDeviceConfig,
    Reboot,
    CaptureScreenshot,
}

/// Which devices of the target list the backend addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    All,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AppState {
    Show,
}

/// Body of a bulk command request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandRequest {
    pub command_type: &'static str,
    pub command: CommandName,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_args: Option<CommandArgs>,
    pub devices: Vec<String>,
    pub groups: Vec<String>,
    pub device_type: DeviceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<&'static str>,
}

/// Typed command arguments
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CommandArgs {
    Install {
        app_version: String,
        app_state: AppState,
    },
    SetAppState {
        package_name: String,
        app_state: AppState,
    },
    DeviceConfig {
        custom_settings_config: CustomSettingsConfig,
    },
    Screenshot {
        tag: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomSettingsConfig {
    pub scripts: Vec<LaunchScript>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LaunchScript {
    pub action: &'static str,
    #[serde(rename = "actionParams")]
    pub action_params: LaunchParams,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchParams {
    pub flags: u32,
    pub launch_type: &'static str,
    pub intent_action: &'static str,
    pub component_name: String,
}

impl CommandRequest {
    fn device(command: CommandName, devices: &[String], args: Option<CommandArgs>) -> Self {
        Self {
            command_type: "DEVICE",
            command,
            command_args: args,
            devices: devices.to_vec(),
            groups: Vec::new(),
            device_type: DeviceType::All,
            schedule: None,
        }
    }

    /// Install one application version on every device
    pub fn install(devices: &[String], app_version: &str) -> Self {
        Self::device(
            CommandName::Install,
            devices,
            Some(CommandArgs::Install {
                app_version: app_version.to_string(),
                app_state: AppState::Show,
            }),
        )
    }

    /// Make an installed package visible on every device
    pub fn set_app_state(devices: &[String], package_name: &str) -> Self {
        Self::device(
            CommandName::SetAppState,
            devices,
            Some(CommandArgs::SetAppState {
                package_name: package_name.to_string(),
                app_state: AppState::Show,
            }),
        )
    }

    /// Fire a MAIN intent at the given activity component
    pub fn launch_component(devices: &[String], component_name: &str) -> Self {
        let mut request = Self::device(
            CommandName::UpdateDeviceConfig,
            devices,
            Some(CommandArgs::DeviceConfig {
                custom_settings_config: CustomSettingsConfig {
                    scripts: vec![LaunchScript {
                        action: "LAUNCH",
                        action_params: LaunchParams {
                            flags: LAUNCH_FLAGS,
                            launch_type: "ACTIVITY",
                            intent_action: "android.intent.action.MAIN",
                            component_name: component_name.to_string(),
                        },
                    }],
                },
            }),
        );
        request.schedule = Some("IMMEDIATE");
        request
    }

    pub fn reboot(devices: &[String]) -> Self {
        Self::device(CommandName::Reboot, devices, None)
    }

    pub fn capture_screenshot(devices: &[String], tag: &str) -> Self {
        let mut request = Self::device(
            CommandName::CaptureScreenshot,
            devices,
            Some(CommandArgs::Screenshot {
                tag: tag.to_string(),
            }),
        );
        request.device_type = DeviceType::Active;
        request
    }
}

/// Main activity component for a package
pub fn main_activity(package_name: &str) -> String {
    format!("{package_name}/{package_name}.MainActivity")
}
