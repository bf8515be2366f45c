//! Pre-flight validation: everything here runs before any cloud-side work.

use crate::cluster::{ClusterSettings, PrivateClusterAccess};
use crate::config::{DeployerConfig, ProvisionerConfig};
use crate::error::ProvisionError;
use crate::retry::{ErrorClassifier, LocationCandidates};
use crate::topology::{generate_cluster_names, Topology};
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

const MAX_GENERATED_CLUSTERS: usize = 99;
const MAX_CLUSTER_NAME_LENGTH: usize = 40;
const RELEASE_CHANNELS: &[&str] = &["rapid", "regular", "stable"];

/// Everything a run needs, derived once from config.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub run_id: String,
    pub topology: Topology,
    pub candidates: LocationCandidates,
    pub settings: Arc<ClusterSettings>,
    pub classifier: ErrorClassifier,
}

fn invalid(message: impl Into<String>) -> ProvisionError {
    ProvisionError::Validation(message.into())
}

/// Validate the up flags and build the run plan.
pub fn verify_up_flags(config: &ProvisionerConfig) -> Result<RunPlan, ProvisionError> {
    let deployer = &config.deployer;
    if deployer.projects.is_empty() {
        return Err(invalid("at least one --project must be set for GKE deployment"));
    }
    let mut unique = HashSet::new();
    if let Some(dup) = deployer.projects.iter().find(|p| !unique.insert(p.as_str())) {
        return Err(invalid(format!("project {} is listed more than once", dup)));
    }

    let run_id = deployer
        .run_id
        .clone()
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let cluster_entries = if deployer.clusters.is_empty() {
        if deployer.projects.len() > 1 {
            return Err(invalid(
                "explicit --cluster-name must be set for multi-project profile",
            ));
        }
        if deployer.num_clusters == 0 || deployer.num_clusters > MAX_GENERATED_CLUSTERS {
            return Err(invalid(format!(
                "--num-clusters must be between 1 and {}",
                MAX_GENERATED_CLUSTERS
            )));
        }
        generate_cluster_names(deployer.num_clusters, &run_id)
    } else {
        info!("explicit --cluster-name specified, ignoring --num-clusters");
        deployer.clusters.clone()
    };

    verify_network_flags(deployer)?;
    let candidates = verify_location_flags(deployer)?;
    if deployer.num_nodes == 0 {
        return Err(invalid("--num-nodes must be larger than 0"));
    }
    validate_version(&deployer.version)?;
    validate_release_channel(deployer.release_channel.as_deref())?;

    let topology = Topology::build(&deployer.projects, &cluster_entries, deployer)?;
    for (_, _, cluster) in topology.pairs() {
        validate_cluster_name(&cluster.name)?;
    }
    let settings = ClusterSettings::from_config(deployer)?;
    verify_private_cluster_flags(&settings, topology.cluster_count())?;

    config.retry.validate().map_err(ProvisionError::Validation)?;
    let classifier = ErrorClassifier::new(&config.retry.retryable_error_patterns)?;

    Ok(RunPlan {
        run_id,
        topology,
        candidates,
        settings: Arc::new(settings),
        classifier,
    })
}

/// Multi-project runs share a custom VPC; the auto-created default network cannot be shared.
pub fn verify_network_flags(deployer: &DeployerConfig) -> Result<(), ProvisionError> {
    if deployer.network.is_empty() {
        return Err(invalid("--network must not be empty"));
    }
    if deployer.projects.len() > 1 && deployer.network == "default" {
        return Err(invalid(
            "a non-default --network must be set for multi-project profile",
        ));
    }
    Ok(())
}

pub fn verify_location_flags(deployer: &DeployerConfig) -> Result<LocationCandidates, ProvisionError> {
    let candidates = LocationCandidates::new(deployer.regions.clone(), deployer.zones.clone());
    if candidates.is_empty() {
        return Err(invalid("at least one --region or --zone must be set"));
    }
    if deployer.autopilot && !deployer.zones.is_empty() {
        return Err(invalid("--zone is not supported for autopilot clusters, use --region"));
    }
    if candidates
        .regions()
        .iter()
        .chain(candidates.zones())
        .any(|l| l.trim().is_empty())
    {
        return Err(invalid("region and zone values must not be empty"));
    }
    Ok(candidates)
}

fn verify_private_cluster_flags(
    settings: &ClusterSettings,
    cluster_count: usize,
) -> Result<(), ProvisionError> {
    if let Some(access) = settings.private_access {
        if settings.master_ip_ranges.len() < cluster_count {
            return Err(invalid(format!(
                "private cluster access level {:?} needs {} master IP range(s), got {}",
                access,
                cluster_count,
                settings.master_ip_ranges.len()
            )));
        }
        if settings.autopilot && access == PrivateClusterAccess::No {
            return Err(invalid("autopilot clusters need a reachable control plane"));
        }
    }
    Ok(())
}

/// GKE cluster names: lowercase letter first, then lowercase letters, digits
/// or hyphens, not ending in a hyphen, at most 40 characters.
pub fn validate_cluster_name(name: &str) -> Result<(), ProvisionError> {
    let re = Regex::new(r"^[a-z]([-a-z0-9]*[a-z0-9])?$")?;
    if name.len() > MAX_CLUSTER_NAME_LENGTH || !re.is_match(name) {
        return Err(invalid(format!(
            "invalid cluster name {:?}: must match [a-z]([-a-z0-9]*[a-z0-9])? and be at most {} characters",
            name, MAX_CLUSTER_NAME_LENGTH
        )));
    }
    Ok(())
}

/// `latest`, empty, or something shaped like `1.29`, `1.29.1-gke.100`.
pub fn validate_version(version: &str) -> Result<(), ProvisionError> {
    match version {
        "latest" | "" => Ok(()),
        _ => {
            let re = Regex::new(r"(\d)\.(\d)+(\.(\d)*(.*))?")?;
            if re.is_match(version) {
                Ok(())
            } else {
                Err(invalid(format!("unknown version {:?}", version)))
            }
        }
    }
}

pub fn validate_release_channel(channel: Option<&str>) -> Result<(), ProvisionError> {
    match channel {
        None | Some("") => Ok(()),
        Some(c) if RELEASE_CHANNELS.contains(&c) => Ok(()),
        Some(c) => Err(invalid(format!(
            "unknown release channel {:?} (must be one of {})",
            c,
            RELEASE_CHANNELS.join(", ")
        ))),
    }
}
