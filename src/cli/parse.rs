//! CLI parse: clap types for gke-provisioner. No behavior; definitions only.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// gke-provisioner CLI - multi-project GKE clusters for test runs
#[derive(Parser)]
#[command(name = "gke-provisioner")]
#[command(about = "Create, verify and tear down GKE clusters across projects")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory (holds gke-provisioner.toml)
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, default_value = "false")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create every cluster, retrying in other locations on retryable failures
    Up {
        #[command(flatten)]
        deploy: DeployArgs,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Check that every cluster reports nodes
    IsUp {
        #[command(flatten)]
        deploy: DeployArgs,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Delete every cluster, then the subnets and network
    Down {
        #[command(flatten)]
        deploy: DeployArgs,
    },
    /// Fetch credentials for every cluster and print the joined KUBECONFIG
    Kubeconfig {
        #[command(flatten)]
        deploy: DeployArgs,
    },
    /// Print the effective configuration as TOML
    Config {
        #[command(flatten)]
        deploy: DeployArgs,
    },
}

/// Per-run overrides on top of the loaded configuration.
#[derive(Args, Debug, Clone, Default)]
pub struct DeployArgs {
    /// GCP project(s); the first hosts the shared network
    #[arg(long = "project", value_delimiter = ',')]
    pub projects: Vec<String>,

    /// Cluster layout entries: `name` or `name:projectIndex`
    #[arg(long = "cluster-name", value_delimiter = ',')]
    pub cluster_names: Vec<String>,

    /// Number of clusters to generate names for (ignored with --cluster-name)
    #[arg(long)]
    pub num_clusters: Option<usize>,

    /// Run identifier used in generated cluster names
    #[arg(long)]
    pub run_id: Option<String>,

    /// Candidate regions, tried in order
    #[arg(long = "region", value_delimiter = ',')]
    pub regions: Vec<String>,

    /// Candidate zones, tried in order
    #[arg(long = "zone", value_delimiter = ',')]
    pub zones: Vec<String>,

    #[arg(long)]
    pub network: Option<String>,

    #[arg(long)]
    pub machine_type: Option<String>,

    #[arg(long)]
    pub num_nodes: Option<usize>,

    #[arg(long)]
    pub image_type: Option<String>,

    /// Cluster version, `latest`, or empty for the server default
    #[arg(long)]
    pub version: Option<String>,

    /// rapid, regular or stable
    #[arg(long)]
    pub release_channel: Option<String>,

    #[arg(long)]
    pub enable_workload_identity: bool,

    /// Create Autopilot clusters
    #[arg(long)]
    pub autopilot: bool,

    /// gcloud command group (alpha, beta)
    #[arg(long)]
    pub gcloud_command_group: Option<String>,

    /// Extra flags for the create command
    #[arg(long, allow_hyphen_values = true)]
    pub gcloud_extra_flags: Option<String>,

    /// Full create command override, without the gcloud binary
    #[arg(long, allow_hyphen_values = true)]
    pub create_command: Option<String>,

    /// no, limited or unrestricted
    #[arg(long)]
    pub private_cluster_access_level: Option<String>,

    /// Master CIDRs for private clusters, one per cluster
    #[arg(long = "private-cluster-master-ip-range", value_delimiter = ',')]
    pub private_cluster_master_ip_ranges: Vec<String>,

    /// Regexes marking a creation failure as retryable
    #[arg(long = "retryable-error-pattern")]
    pub retryable_error_patterns: Vec<String>,

    /// Maximum concurrent cluster creations per attempt
    #[arg(long)]
    pub max_in_flight: Option<usize>,

    /// Repository root holding cluster/log-dump/log-dump.sh
    #[arg(long)]
    pub repo_root: Option<PathBuf>,

    /// Destination for dumped cluster logs
    #[arg(long)]
    pub artifacts: Option<PathBuf>,

    /// Service account key activated before any gcloud call
    #[arg(long)]
    pub gcp_service_account: Option<PathBuf>,
}
