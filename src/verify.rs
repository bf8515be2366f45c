//! Cluster readiness: a cluster is up when its API server reports nodes.

use crate::error::{ProvisionError, VerificationFailure};
use crate::exec::{CommandRunner, ToolCommand};
use crate::kubeconfig::{fetch_credentials, kubeconfig_path, KUBECONFIG_ENV};
use crate::retry::Location;
use crate::topology::Topology;
use serde::Serialize;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Node count reported by one cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterStatus {
    pub project: String,
    pub cluster: String,
    pub nodes: usize,
}

/// Node names of the cluster `kubeconfig` points at.
pub async fn node_names(
    runner: &dyn CommandRunner,
    kubectl: &str,
    kubeconfig: &Path,
) -> Result<Vec<String>, ProvisionError> {
    let command = ToolCommand::new(kubectl)
        .args(["get", "nodes", "-o=name"])
        .env(KUBECONFIG_ENV, kubeconfig.to_string_lossy());
    let output = runner.run(&command, &CancellationToken::new()).await?;
    if !output.is_success() {
        return Err(VerificationFailure {
            message: format!("`{}` failed with status {:?}", command, output.status),
            output: Some(output.combined()),
        }
        .into());
    }
    Ok(output.lines())
}

/// Check every cluster of `topology`; the first one without nodes fails the check.
pub async fn check_clusters(
    runner: &dyn CommandRunner,
    gcloud: &str,
    kubectl: &str,
    topology: &Topology,
    location: &Location,
    scratch_dir: &Path,
) -> Result<Vec<ClusterStatus>, ProvisionError> {
    let mut statuses = Vec::new();
    for (_, project, cluster) in topology.pairs() {
        let kubeconfig = kubeconfig_path(scratch_dir, project, &cluster.name);
        fetch_credentials(runner, gcloud, project, location, &cluster.name, &kubeconfig).await?;
        let nodes = node_names(runner, kubectl, &kubeconfig).await?;
        if nodes.is_empty() {
            return Err(VerificationFailure {
                message: format!("project had no nodes active: {}", project),
                output: None,
            }
            .into());
        }
        statuses.push(ClusterStatus {
            project: project.to_string(),
            cluster: cluster.name.clone(),
            nodes: nodes.len(),
        });
    }
    Ok(statuses)
}
