//! gcloud argument assembly for cluster creation.

use crate::config::DeployerConfig;
use crate::error::ProvisionError;
use crate::topology::ClusterSpec;
use std::str::FromStr;

/// Control-plane reachability for private clusters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivateClusterAccess {
    /// Private endpoint only.
    No,
    /// Public endpoint restricted to authorized networks.
    Limited,
    /// Public endpoint open to all.
    Unrestricted,
}

impl FromStr for PrivateClusterAccess {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "no" => Ok(Self::No),
            "limited" => Ok(Self::Limited),
            "unrestricted" => Ok(Self::Unrestricted),
            other => Err(ProvisionError::Validation(format!(
                "invalid private cluster access level {:?} (must be no, limited or unrestricted)",
                other
            ))),
        }
    }
}

/// Run-wide cluster creation settings shared by every operation.
#[derive(Debug, Clone)]
pub struct ClusterSettings {
    pub gcloud_binary: String,
    pub command_group: Option<String>,
    pub extra_flags: Vec<String>,
    pub create_command: Option<Vec<String>>,
    pub autopilot: bool,
    pub network: String,
    pub workload_identity: bool,
    pub release_channel: Option<String>,
    pub version: String,
    pub private_access: Option<PrivateClusterAccess>,
    pub master_ip_ranges: Vec<String>,
}

impl ClusterSettings {
    pub fn from_config(config: &DeployerConfig) -> Result<Self, ProvisionError> {
        let private_access = config
            .private_cluster_access_level
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .transpose()?;
        Ok(Self {
            gcloud_binary: config.gcloud_binary.clone(),
            command_group: config.gcloud_command_group.clone().filter(|g| !g.is_empty()),
            extra_flags: split_fields(&config.gcloud_extra_flags),
            create_command: config
                .create_command
                .as_deref()
                .map(split_fields)
                .filter(|fields| !fields.is_empty()),
            autopilot: config.autopilot,
            network: config.network.clone(),
            workload_identity: config.workload_identity,
            release_channel: config.release_channel.clone().filter(|c| !c.is_empty()),
            version: config.version.clone(),
            private_access,
            master_ip_ranges: config.private_cluster_master_ip_ranges.clone(),
        })
    }

    /// `[group] container clusters <create|create-auto> --quiet [extra flags]`,
    /// or the explicit override verbatim.
    pub fn create_command(&self) -> Vec<String> {
        if let Some(ref custom) = self.create_command {
            return custom.clone();
        }
        let mut fields = Vec::new();
        if let Some(ref group) = self.command_group {
            fields.push(group.clone());
        }
        fields.push("container".to_string());
        fields.push("clusters".to_string());
        fields.push(if self.autopilot { "create-auto" } else { "create" }.to_string());
        fields.push("--quiet".to_string());
        fields.extend(self.extra_flags.iter().cloned());
        fields
    }

    /// Flags that depend only on the cluster shape, not the project or location.
    pub fn shape_args(&self, cluster: &ClusterSpec) -> Vec<String> {
        // Autopilot manages nodes itself and rejects these flags.
        if self.autopilot {
            return Vec::new();
        }
        vec![
            format!("--machine-type={}", cluster.machine_type),
            format!("--num-nodes={}", cluster.num_nodes),
            format!("--image-type={}", cluster.image_type),
        ]
    }
}

fn split_fields(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_string).collect()
}

/// Network reference for the create command; multi-project runs share the host project's VPC.
pub fn transform_network_name(projects: &[String], network: &str) -> String {
    if projects.len() <= 1 {
        network.to_string()
    } else {
        format!("projects/{}/global/networks/{}", projects[0], network)
    }
}

/// Subnet owned by the project at `project_index` in a shared VPC.
pub fn subnet_name(network: &str, projects: &[String], project_index: usize) -> String {
    format!("{}-{}", network, projects[project_index])
}

/// Subnet flags for the project at `project_index`; none for single-project runs.
pub fn sub_network_args(
    autopilot: bool,
    projects: &[String],
    region: &str,
    network: &str,
    project_index: usize,
) -> Vec<String> {
    if projects.len() <= 1 {
        return Vec::new();
    }
    let host_project = &projects[0];
    let subnet = subnet_name(network, projects, project_index);
    let mut args = vec![format!(
        "--subnetwork=projects/{}/regions/{}/subnetworks/{}",
        host_project, region, subnet
    )];
    if !autopilot {
        args.push(format!("--cluster-secondary-range-name={}-pods", subnet));
        args.push(format!("--services-secondary-range-name={}-services", subnet));
    }
    args
}

/// Private cluster flags; none unless an access level is configured.
pub fn private_cluster_args(
    settings: &ClusterSettings,
    cluster: &ClusterSpec,
) -> Result<Vec<String>, ProvisionError> {
    let access = match settings.private_access {
        Some(access) => access,
        None => return Ok(Vec::new()),
    };
    let master_range = settings
        .master_ip_ranges
        .get(cluster.index)
        .ok_or_else(|| {
            ProvisionError::Validation(format!(
                "no private cluster master IP range for cluster {} (index {})",
                cluster.name, cluster.index
            ))
        })?;

    let mut args = vec![
        "--enable-ip-alias".to_string(),
        "--enable-private-nodes".to_string(),
        "--no-enable-basic-auth".to_string(),
        format!("--master-ipv4-cidr={}", master_range),
        "--no-issue-client-certificate".to_string(),
    ];
    match access {
        PrivateClusterAccess::No => {
            args.push("--enable-master-authorized-networks".to_string());
            args.push("--enable-private-endpoint".to_string());
        }
        PrivateClusterAccess::Limited => {
            args.push("--enable-master-authorized-networks".to_string());
        }
        PrivateClusterAccess::Unrestricted => {
            args.push("--no-enable-master-authorized-networks".to_string());
        }
    }
    Ok(args)
}
