//! up presentation.

use crate::deployer::UpReport;
use owo_colors::OwoColorize;

pub fn format_up_report_text(report: &UpReport) -> String {
    let mut output = format!(
        "{} {} cluster(s) ready in {} after {} attempt(s)\n",
        "Up:".green().bold(),
        report.run_id,
        report.location,
        report.attempts
    );
    if !report.rolled_back_attempts.is_empty() {
        let attempts: Vec<String> = report
            .rolled_back_attempts
            .iter()
            .map(|a| a.to_string())
            .collect();
        output.push_str(&format!("Rolled back attempt(s): {}\n", attempts.join(", ")));
    }
    output.push_str(&format!("Finished at: {}\n", report.finished_at));
    output.push_str(&format!("KUBECONFIG={}", report.kubeconfig));
    output
}

pub fn format_up_report_json(report: &UpReport) -> String {
    serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
}
