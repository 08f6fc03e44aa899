//! Settings file management

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::options::{AppOptions, PipelineOptions, ServerOptions, DEFAULT_SCREENSHOT_TAG};
use crate::deploy::poll::PollOptions;
use crate::logs::LogLevel;

/// Deployer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub json_logs: bool,

    /// Override for `https://{tenant_id}-api.esper.cloud/api`
    #[serde(default)]
    pub api_base_url: Option<String>,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Local HTTP server configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// Pipeline pacing and polling
    #[serde(default)]
    pub timings: TimingSettings,

    /// Tag attached to post-deployment screenshots
    #[serde(default = "default_screenshot_tag")]
    pub screenshot_tag: String,
}

fn default_request_timeout() -> u64 {
    30
}

fn default_screenshot_tag() -> String {
    DEFAULT_SCREENSHOT_TAG.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            json_logs: false,
            api_base_url: None,
            request_timeout_secs: default_request_timeout(),
            server: ServerSettings::default(),
            timings: TimingSettings::default(),
            screenshot_tag: default_screenshot_tag(),
        }
    }
}

impl Settings {
    /// Map the file settings onto runtime options
    pub fn to_options(&self) -> AppOptions {
        let timings = &self.timings;
        let verify_poll = PollOptions::new(
            Duration::from_secs(timings.verify_poll_interval_secs),
            Duration::from_secs(timings.verify_timeout_secs),
        );

        AppOptions {
            api_base_url: self.api_base_url.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            enable_server: self.server.enabled,
            server: ServerOptions {
                host: self.server.host.clone(),
                port: self.server.port,
            },
            pipeline: PipelineOptions {
                step_start_delay: Duration::from_millis(timings.step_start_delay_ms),
                step_advance_delay: Duration::from_millis(timings.step_advance_delay_ms),
                verify_poll,
                validate_poll: PollOptions::new(
                    Duration::from_secs(timings.validate_poll_interval_secs),
                    Duration::from_secs(timings.validate_timeout_secs),
                ),
                screenshot_poll: verify_poll,
                screenshot_grace: Duration::from_secs(timings.screenshot_grace_secs),
                launcher_grace: Duration::from_secs(timings.launcher_grace_secs),
                screenshot_tag: self.screenshot_tag.clone(),
            },
        }
    }
}

/// Local HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_server_host")]
    pub host: String,

    #[serde(default = "default_server_port")]
    pub port: u16,
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

/// Pipeline timing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingSettings {
    #[serde(default = "default_step_delay_ms")]
    pub step_start_delay_ms: u64,

    #[serde(default = "default_step_delay_ms")]
    pub step_advance_delay_ms: u64,

    #[serde(default = "default_verify_interval")]
    pub verify_poll_interval_secs: u64,

    #[serde(default = "default_verify_timeout")]
    pub verify_timeout_secs: u64,

    #[serde(default = "default_validate_interval")]
    pub validate_poll_interval_secs: u64,

    #[serde(default = "default_validate_timeout")]
    pub validate_timeout_secs: u64,

    #[serde(default = "default_grace")]
    pub screenshot_grace_secs: u64,

    #[serde(default = "default_grace")]
    pub launcher_grace_secs: u64,
}

fn default_step_delay_ms() -> u64 {
    1000
}

fn default_verify_interval() -> u64 {
    5
}

fn default_verify_timeout() -> u64 {
    600 // 10 minutes
}

fn default_validate_interval() -> u64 {
    10
}

fn default_validate_timeout() -> u64 {
    300 // 5 minutes
}

fn default_grace() -> u64 {
    15
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            step_start_delay_ms: default_step_delay_ms(),
            step_advance_delay_ms: default_step_delay_ms(),
            verify_poll_interval_secs: default_verify_interval(),
            verify_timeout_secs: default_verify_timeout(),
            validate_poll_interval_secs: default_validate_interval(),
            validate_timeout_secs: default_validate_timeout(),
            screenshot_grace_secs: default_grace(),
            launcher_grace_secs: default_grace(),
        }
    }
}
