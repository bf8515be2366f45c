//! A single cluster creation: one cluster, one project, one location.

use super::args::{
    private_cluster_args, sub_network_args, transform_network_name, ClusterSettings,
};
use crate::error::{ProvisionError, ToolError};
use crate::exec::{run_checked, CommandRunner, ToolCommand};
use crate::retry::Location;
use crate::topology::{ClusterSpec, Topology};
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Create one cluster. Never retries, classifies, or cancels siblings itself.
#[derive(Debug, Clone)]
pub struct ClusterOperation {
    pub project: String,
    pub cluster: ClusterSpec,
    pub location: Location,
    settings: Arc<ClusterSettings>,
    /// Network, subnet and private-cluster flags, fixed at construction.
    placement_args: Vec<String>,
}

impl ClusterOperation {
    pub fn new(
        settings: Arc<ClusterSettings>,
        topology: &Topology,
        project_index: usize,
        cluster: ClusterSpec,
        location: Location,
    ) -> Result<Self, ProvisionError> {
        let projects = topology.projects();
        let mut placement_args = vec![format!(
            "--network={}",
            transform_network_name(projects, &settings.network)
        )];
        placement_args.extend(sub_network_args(
            settings.autopilot,
            projects,
            &location.region,
            &settings.network,
            project_index,
        ));
        let private = private_cluster_args(&settings, &cluster)?;

        Ok(Self {
            project: projects[project_index].clone(),
            cluster,
            location,
            settings,
            placement_args: placement_args.into_iter().chain(private).collect(),
        })
    }

    /// Every `project x cluster` operation of `topology` at `location`.
    pub fn for_topology(
        settings: &Arc<ClusterSettings>,
        topology: &Topology,
        location: &Location,
    ) -> Result<Vec<Self>, ProvisionError> {
        topology
            .pairs()
            .map(|(project_index, _, cluster)| {
                Self::new(
                    Arc::clone(settings),
                    topology,
                    project_index,
                    cluster.clone(),
                    location.clone(),
                )
            })
            .collect()
    }

    /// `project/cluster`, for logs.
    pub fn label(&self) -> String {
        format!("{}/{}", self.project, self.cluster.name)
    }

    /// The create command given already-resolved version flags.
    pub fn command(&self, version_args: Vec<String>) -> ToolCommand {
        let settings = &self.settings;
        let mut args = settings.create_command();
        args.push(format!("--project={}", self.project));
        args.push(self.location.flag());
        args.extend(self.placement_args.iter().take(1).cloned());
        args.extend(settings.shape_args(&self.cluster));
        if settings.workload_identity {
            args.push(format!("--workload-pool={}.svc.id.goog", self.project));
        }
        args.extend(version_args);
        args.extend(self.placement_args.iter().skip(1).cloned());
        args.push(self.cluster.name.clone());
        ToolCommand::new(settings.gcloud_binary.clone()).args(args)
    }

    pub async fn execute(
        &self,
        runner: &dyn CommandRunner,
        cancel: &CancellationToken,
    ) -> Result<(), ProvisionError> {
        let version_args = self.version_args(runner, cancel).await?;
        let command = self.command(version_args);
        info!(cluster = %self.label(), location = %self.location, "Creating cluster");
        run_checked(runner, &command, cancel)
            .await
            .map_err(|source| ProvisionError::ClusterCreation {
                project: self.project.clone(),
                cluster: self.cluster.name.clone(),
                source,
            })?;
        info!(cluster = %self.label(), "Cluster created");
        Ok(())
    }

    async fn version_args(
        &self,
        runner: &dyn CommandRunner,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ProvisionError> {
        let settings = &self.settings;
        let mut args = Vec::new();
        let version = match settings.release_channel {
            Some(ref channel) => {
                args.push(format!("--release-channel={}", channel));
                if settings.version == "latest" {
                    let actual = resolve_latest_version_in_channel(
                        runner,
                        &settings.gcloud_binary,
                        &self.location,
                        channel,
                        cancel,
                    )
                    .await?;
                    info!(version = %actual, channel = %channel, "Using the latest version in channel");
                    actual
                } else {
                    settings.version.clone()
                }
            }
            None => settings.version.clone(),
        };
        if !version.is_empty() {
            args.push(format!("--cluster-version={}", version));
        }
        Ok(args)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerConfig {
    #[serde(default)]
    channels: Vec<ChannelConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelConfig {
    channel: String,
    #[serde(default)]
    valid_versions: Vec<String>,
}

/// Newest valid version of `channel` at `location`, from the server config.
pub async fn resolve_latest_version_in_channel(
    runner: &dyn CommandRunner,
    gcloud: &str,
    location: &Location,
    channel: &str,
    cancel: &CancellationToken,
) -> Result<String, ProvisionError> {
    let command = ToolCommand::new(gcloud)
        .args(["container", "get-server-config", "--format=json"])
        .arg(location.flag());
    let output = run_checked(runner, &command, cancel).await?;
    parse_latest_version(&output.stdout, channel).ok_or_else(|| {
        ProvisionError::Tool(ToolError::Failed {
            command: command.to_string(),
            status: output.status,
            output: format!("no valid versions found for channel {:?}", channel),
        })
    })
}

fn parse_latest_version(server_config: &str, channel: &str) -> Option<String> {
    let config: ServerConfig = serde_json::from_str(server_config).ok()?;
    config
        .channels
        .into_iter()
        .find(|c| c.channel.eq_ignore_ascii_case(channel))
        .and_then(|c| c.valid_versions.into_iter().next())
}
