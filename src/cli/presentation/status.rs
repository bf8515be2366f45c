//! is-up presentation: per-cluster node counts.

use crate::verify::ClusterStatus;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde_json::json;

pub fn format_is_up_text(statuses: &[ClusterStatus]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Project", "Cluster", "Nodes"]);
    for status in statuses {
        table.add_row(vec![
            status.project.clone(),
            status.cluster.clone(),
            status.nodes.to_string(),
        ]);
    }
    format!(
        "{}\n{}\n{} cluster(s) up",
        "Cluster status".bold().underline(),
        table,
        statuses.len().green()
    )
}

pub fn format_is_up_json(statuses: &[ClusterStatus]) -> String {
    let out = json!({ "up": true, "clusters": statuses });
    serde_json::to_string_pretty(&out).unwrap_or_else(|_| "{}".to_string())
}
