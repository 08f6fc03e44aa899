//! Application configuration options

use std::time::Duration;

use crate::deploy::poll::PollOptions;

/// Tag attached to screenshots captured after a deployment
pub const DEFAULT_SCREENSHOT_TAG: &str = "post-deployment-screenshot";

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Override for the tenant-derived MDM API base URL
    pub api_base_url: Option<String>,

    /// Per-request HTTP timeout
    pub request_timeout: Duration,

    /// Keep the local HTTP server up for retries
    pub enable_server: bool,

    /// Server configuration
    pub server: ServerOptions,

    /// Pipeline pacing and polling
    pub pipeline: PipelineOptions,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            api_base_url: None,
            request_timeout: Duration::from_secs(30),
            enable_server: false,
            server: ServerOptions::default(),
            pipeline: PipelineOptions::default(),
        }
    }
}

/// Pipeline pacing, polling and grace periods
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Pause before a step starts
    pub step_start_delay: Duration,

    /// Pause after a step completes, before the next one starts
    pub step_advance_delay: Duration,

    /// Installation status polling
    pub verify_poll: PollOptions,

    /// Installed-app polling
    pub validate_poll: PollOptions,

    /// Screenshot command polling
    pub screenshot_poll: PollOptions,

    /// Wait after screenshots succeed so devices can upload them
    pub screenshot_grace: Duration,

    /// Wait after relaunching the home launcher
    pub launcher_grace: Duration,

    pub screenshot_tag: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            step_start_delay: Duration::from_secs(1),
            step_advance_delay: Duration::from_secs(1),
            verify_poll: PollOptions::new(Duration::from_secs(5), Duration::from_secs(600)), // 10 minutes
            validate_poll: PollOptions::new(Duration::from_secs(10), Duration::from_secs(300)), // 5 minutes
            screenshot_poll: PollOptions::new(Duration::from_secs(5), Duration::from_secs(600)),
            screenshot_grace: Duration::from_secs(15),
            launcher_grace: Duration::from_secs(15),
            screenshot_tag: DEFAULT_SCREENSHOT_TAG.to_string(),
        }
    }
}

/// Local HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}
