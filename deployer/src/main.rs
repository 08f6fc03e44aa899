//! MDM Deployer - Entry Point
//!
//! Pushes applications to a fleet of managed Android devices and walks the
//! deployment through distribution, verification and post-install steps.

use std::collections::HashMap;
use std::env;
use std::process::ExitCode;

use mdm_deployer::app::run::{build_client, run};
use mdm_deployer::filesys::file::File;
use mdm_deployer::http::api::MdmApi;
use mdm_deployer::logs::{init_logging, LogOptions};
use mdm_deployer::report::render_steps;
use mdm_deployer::storage::inputs::{load_credentials, load_plan, API_KEY_ENV};
use mdm_deployer::storage::settings::Settings;
use mdm_deployer::utils::version_info;

use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(version) => println!("{}", version),
            Err(e) => eprintln!("Failed to render version: {e}"),
        }
        return ExitCode::SUCCESS;
    }

    // Retrieve the settings file
    let settings_path = cli_args
        .get("settings")
        .map(String::as_str)
        .unwrap_or("settings.json");
    let settings = match File::new(settings_path).read_json_or_default::<Settings>().await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Unable to read settings file {settings_path}: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        json_format: settings.json_logs,
        ..Default::default()
    };
    if let Err(e) = init_logging(log_options) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let mut options = settings.to_options();
    if cli_args.contains_key("serve") {
        options.enable_server = true;
    }

    // Credentials
    let credentials_path = cli_args
        .get("credentials")
        .map(String::as_str)
        .unwrap_or("credentials.json");
    let credentials =
        match load_credentials(&File::new(credentials_path), env::var(API_KEY_ENV).ok()).await {
            Ok(credentials) => credentials,
            Err(e) => {
                error!("Unable to load credentials: {}", e);
                return ExitCode::FAILURE;
            }
        };

    if cli_args.contains_key("check-credentials") {
        let client = match build_client(&options) {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to build the MDM client: {}", e);
                return ExitCode::FAILURE;
            }
        };
        return match client.validate_credentials(&credentials).await {
            Ok(enterprise) => {
                println!("Credentials valid for enterprise {} ({})", enterprise.name, enterprise.id);
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("Credential check failed: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    // Deployment plan
    let plan_path = cli_args.get("plan").map(String::as_str).unwrap_or("plan.json");
    let plan = match load_plan(&File::new(plan_path)).await {
        Ok(plan) => plan,
        Err(e) => {
            error!("Unable to load deployment plan: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Running MDM Deployer with options: {:?}", options);
    match run(options, credentials, plan, await_shutdown_signal()).await {
        Ok(snapshot) => {
            print!("{}", render_steps(&snapshot));
            if snapshot.is_complete {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            error!("Deployment aborted: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("Failed to listen for SIGTERM");
        let mut sigint = signal(SignalKind::interrupt()).expect("Failed to listen for SIGINT");

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
        info!("Ctrl+C received, shutting down...");
    }
}
