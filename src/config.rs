//! Configuration System
//!
//! Layered configuration for a provisioning run: built-in defaults, the global
//! config file, a workspace file, `GKE_PROVISIONER__*` environment variables,
//! and finally CLI flags (applied by the CLI layer).

use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;
pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisionerConfig {
    /// What to create and where
    #[serde(default)]
    pub deployer: DeployerConfig,

    /// Retry and fan-out behavior
    #[serde(default)]
    pub retry: RetryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Cluster, network and tool settings for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployerConfig {
    /// GCP projects; the first one hosts the shared network in multi-project runs
    #[serde(default)]
    pub projects: Vec<String>,

    /// Explicit cluster layout entries: `name` or `name:projectIndex`
    #[serde(default)]
    pub clusters: Vec<String>,

    /// Number of clusters to generate names for when `clusters` is empty
    #[serde(default = "default_num_clusters")]
    pub num_clusters: usize,

    /// Run identifier used in generated cluster names (defaults to a UUID)
    #[serde(default)]
    pub run_id: Option<String>,

    /// Candidate regions, tried in order
    #[serde(default)]
    pub regions: Vec<String>,

    /// Candidate zones, tried in order
    #[serde(default)]
    pub zones: Vec<String>,

    #[serde(default = "default_network")]
    pub network: String,

    #[serde(default = "default_machine_type")]
    pub machine_type: String,

    #[serde(default = "default_num_nodes")]
    pub num_nodes: usize,

    #[serde(default = "default_image_type")]
    pub image_type: String,

    /// Cluster version, `latest`, or empty for the server default
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub release_channel: Option<String>,

    #[serde(default)]
    pub workload_identity: bool,

    /// Create GKE Autopilot clusters (`create-auto`)
    #[serde(default)]
    pub autopilot: bool,

    /// `alpha` or `beta` gcloud command group
    #[serde(default)]
    pub gcloud_command_group: Option<String>,

    /// Extra flags appended to the create command, whitespace separated
    #[serde(default)]
    pub gcloud_extra_flags: String,

    /// Full create command override, whitespace separated (without `gcloud`)
    #[serde(default)]
    pub create_command: Option<String>,

    /// Private cluster access level: `no`, `limited` or `unrestricted`
    #[serde(default)]
    pub private_cluster_access_level: Option<String>,

    /// One master CIDR per cluster, by cluster index
    #[serde(default)]
    pub private_cluster_master_ip_ranges: Vec<String>,

    /// Repository root holding `cluster/log-dump/log-dump.sh`
    #[serde(default)]
    pub repo_root: Option<PathBuf>,

    /// Destination for dumped cluster logs
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,

    /// Service account key activated before any gcloud call
    #[serde(default)]
    pub service_account_key_file: Option<PathBuf>,

    #[serde(default = "default_gcloud_binary")]
    pub gcloud_binary: String,

    #[serde(default = "default_kubectl_binary")]
    pub kubectl_binary: String,
}

fn default_num_clusters() -> usize {
    1
}

fn default_network() -> String {
    "default".to_string()
}

fn default_machine_type() -> String {
    "n1-standard-4".to_string()
}

fn default_num_nodes() -> usize {
    3
}

fn default_image_type() -> String {
    "cos_containerd".to_string()
}

fn default_version() -> String {
    "latest".to_string()
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("_artifacts")
}

fn default_gcloud_binary() -> String {
    "gcloud".to_string()
}

fn default_kubectl_binary() -> String {
    "kubectl".to_string()
}

impl Default for DeployerConfig {
    fn default() -> Self {
        Self {
            projects: Vec::new(),
            clusters: Vec::new(),
            num_clusters: default_num_clusters(),
            run_id: None,
            regions: Vec::new(),
            zones: Vec::new(),
            network: default_network(),
            machine_type: default_machine_type(),
            num_nodes: default_num_nodes(),
            image_type: default_image_type(),
            version: default_version(),
            release_channel: None,
            workload_identity: false,
            autopilot: false,
            gcloud_command_group: None,
            gcloud_extra_flags: String::new(),
            create_command: None,
            private_cluster_access_level: None,
            private_cluster_master_ip_ranges: Vec::new(),
            repo_root: None,
            artifacts_dir: default_artifacts_dir(),
            service_account_key_file: None,
            gcloud_binary: default_gcloud_binary(),
            kubectl_binary: default_kubectl_binary(),
        }
    }
}

/// Retry and fan-out settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Regular expressions marking a creation failure as retryable.
    /// Empty means every failure is fatal.
    #[serde(default)]
    pub retryable_error_patterns: Vec<String>,

    /// Maximum concurrent cluster creations per attempt (unbounded when unset)
    #[serde(default)]
    pub max_in_flight: Option<usize>,
}

impl RetryConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_in_flight == Some(0) {
            return Err("max_in_flight must be larger than 0 when set".to_string());
        }
        for pattern in &self.retryable_error_patterns {
            regex::Regex::new(pattern)
                .map_err(|e| format!("invalid retryable error pattern {:?}: {}", pattern, e))?;
        }
        Ok(())
    }
}
