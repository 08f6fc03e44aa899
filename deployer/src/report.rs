//! Terminal rendering of a pipeline snapshot

use std::fmt::Write;

use colored::Colorize;

use crate::deploy::fsm::DisplayStatus;
use crate::deploy::orchestrator::PipelineSnapshot;

fn status_label(status: DisplayStatus) -> colored::ColoredString {
    match status {
        DisplayStatus::Pending => "pending".dimmed(),
        DisplayStatus::Running => "running".cyan(),
        DisplayStatus::Completed => "completed".green(),
        DisplayStatus::Failed => "failed".red().bold(),
        DisplayStatus::Canceled => "canceled".yellow(),
    }
}

/// One line per step, plus the error of a failed step
pub fn render_steps(snapshot: &PipelineSnapshot) -> String {
    let mut out = String::new();

    for view in snapshot.views() {
        let step = view.step;
        let _ = writeln!(
            out,
            "{:>2}. {:<11} {:<10} {}",
            view.index + 1,
            view.id,
            status_label(view.display_status),
            step.title
        );

        if let Some(details) = &step.details {
            let _ = writeln!(out, "      {}", details);
        }

        if let Some(device_status) = &step.device_status {
            let summary = device_status.summary;
            let _ = writeln!(
                out,
                "      devices: {} successful, {} failed, {} in progress",
                summary.successful, summary.failed, summary.in_progress
            );
        }

        if let Some(error) = &step.error {
            for line in error.technical_details.lines() {
                let _ = writeln!(out, "      {}", line.dimmed());
            }
        }
    }

    let verdict = if snapshot.is_complete {
        "Deployment complete".green().bold()
    } else if snapshot.has_failed {
        "Deployment failed".red().bold()
    } else {
        "Deployment interrupted".yellow().bold()
    };
    let _ = writeln!(out, "{}", verdict);

    out
}
