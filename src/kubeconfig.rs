//! Kubeconfig materialization: one file per (project, cluster), fetched with
//! `gcloud container clusters get-credentials` and joined into a single
//! `KUBECONFIG` value.

use crate::error::ProvisionError;
use crate::exec::{run_checked, CommandRunner, ToolCommand};
use crate::retry::Location;
use crate::topology::Topology;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub const KUBECONFIG_ENV: &str = "KUBECONFIG";

/// Kubeconfig files written for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubeconfigSet {
    pub files: Vec<PathBuf>,
}

impl KubeconfigSet {
    /// Files joined with the platform path-list separator.
    pub fn joined(&self) -> Result<OsString, ProvisionError> {
        std::env::join_paths(&self.files).map_err(|e| {
            ProvisionError::Validation(format!("kubeconfig path cannot be joined: {}", e))
        })
    }
}

/// Scratch directory that outlives the process, so later test phases can read it.
pub fn create_kubeconfig_dir() -> Result<PathBuf, ProvisionError> {
    let dir = tempfile::Builder::new()
        .prefix("gke-provisioner")
        .tempdir()?;
    Ok(dir.into_path())
}

pub fn kubeconfig_path(dir: &Path, project: &str, cluster: &str) -> PathBuf {
    dir.join(format!("kubecfg-{}-{}", project, cluster))
}

/// `get-credentials` writing into `kubeconfig`.
pub fn credentials_command(
    gcloud: &str,
    project: &str,
    location: &Location,
    cluster: &str,
    kubeconfig: &Path,
) -> ToolCommand {
    ToolCommand::new(gcloud)
        .args(["container", "clusters", "get-credentials", cluster])
        .arg(format!("--project={}", project))
        .arg(location.flag())
        .env(KUBECONFIG_ENV, kubeconfig.to_string_lossy())
}

pub async fn fetch_credentials(
    runner: &dyn CommandRunner,
    gcloud: &str,
    project: &str,
    location: &Location,
    cluster: &str,
    kubeconfig: &Path,
) -> Result<(), ProvisionError> {
    debug!(project = %project, cluster = %cluster, kubeconfig = %kubeconfig.display(), "Fetching credentials");
    let command = credentials_command(gcloud, project, location, cluster, kubeconfig);
    run_checked(runner, &command, &CancellationToken::new()).await?;
    Ok(())
}

/// Fetch credentials for every cluster of `topology` into `dir`.
pub async fn materialize(
    runner: &dyn CommandRunner,
    gcloud: &str,
    topology: &Topology,
    location: &Location,
    dir: &Path,
) -> Result<KubeconfigSet, ProvisionError> {
    let mut files = Vec::with_capacity(topology.cluster_count());
    for (_, project, cluster) in topology.pairs() {
        let path = kubeconfig_path(dir, project, &cluster.name);
        fetch_credentials(runner, gcloud, project, location, &cluster.name, &path).await?;
        files.push(path);
    }
    info!(count = files.len(), dir = %dir.display(), "Kubeconfig files written");
    Ok(KubeconfigSet { files })
}
