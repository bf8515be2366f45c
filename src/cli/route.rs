//! CLI route: single route table and run context. Dispatches to the deployer and presentation.

use crate::cli::help::{command_name, deploy_args};
use crate::cli::parse::{Commands, DeployArgs};
use crate::cli::presentation::{
    format_is_up_json, format_is_up_text, format_up_report_json, format_up_report_text,
};
use crate::config::{ConfigLoader, ProvisionerConfig};
use crate::deployer::Deployer;
use crate::error::ProvisionError;
use std::path::PathBuf;
use tracing::{info, info_span, Instrument};

/// Runtime context for CLI execution: workspace and the loaded configuration.
/// Built from workspace path and optional config path using ConfigLoader only.
pub struct RunContext {
    workspace_root: PathBuf,
    config: ProvisionerConfig,
}

impl RunContext {
    /// Create run context from workspace root and optional config path. Uses ConfigLoader only.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ProvisionError> {
        let config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };
        Ok(Self {
            workspace_root,
            config,
        })
    }

    pub fn config(&self) -> &ProvisionerConfig {
        &self.config
    }

    /// Effective configuration for `command`: loaded layers plus its flags.
    pub fn effective_config(&self, command: &Commands) -> ProvisionerConfig {
        let mut config = self.config.clone();
        apply_deploy_args(&mut config, deploy_args(command));
        config
    }

    /// Execute a CLI command via the single route table.
    pub async fn execute(&self, command: &Commands) -> Result<String, ProvisionError> {
        let name = command_name(command);
        let span = info_span!("command", command = name, workspace = %self.workspace_root.display());
        async {
            info!("Running command");
            let result = self.execute_inner(command).await;
            if result.is_ok() {
                info!("Command finished");
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn execute_inner(&self, command: &Commands) -> Result<String, ProvisionError> {
        let config = self.effective_config(command);
        match command {
            Commands::Up { format, .. } => {
                let mut deployer = Deployer::new(&config)?;
                let report = deployer.up().await?;
                Ok(if format == "json" {
                    format_up_report_json(&report)
                } else {
                    format_up_report_text(&report)
                })
            }
            Commands::IsUp { format, .. } => {
                let deployer = Deployer::new(&config)?;
                let statuses = deployer.is_up().await?;
                Ok(if format == "json" {
                    format_is_up_json(&statuses)
                } else {
                    format_is_up_text(&statuses)
                })
            }
            Commands::Down { .. } => {
                let deployer = Deployer::new(&config)?;
                deployer.down().await?;
                Ok(format!(
                    "Deleted {} cluster(s) for run {}",
                    deployer.plan().topology.cluster_count(),
                    deployer.plan().run_id
                ))
            }
            Commands::Kubeconfig { .. } => {
                let mut deployer = Deployer::new(&config)?;
                let location = deployer.current_location().await?;
                let joined = deployer.kubeconfig(&location).await?;
                Ok(joined.to_string_lossy().into_owned())
            }
            Commands::Config { .. } => toml::to_string_pretty(&config)
                .map_err(|e| ProvisionError::Config(format!("cannot render configuration: {}", e))),
        }
    }
}

/// Apply command-line flags over the loaded configuration. Only flags that
/// were given replace config values.
pub fn apply_deploy_args(config: &mut ProvisionerConfig, args: &DeployArgs) {
    let deployer = &mut config.deployer;
    if !args.projects.is_empty() {
        deployer.projects = args.projects.clone();
    }
    if !args.cluster_names.is_empty() {
        deployer.clusters = args.cluster_names.clone();
    }
    if let Some(n) = args.num_clusters {
        deployer.num_clusters = n;
    }
    if args.run_id.is_some() {
        deployer.run_id = args.run_id.clone();
    }
    if !args.regions.is_empty() {
        deployer.regions = args.regions.clone();
    }
    if !args.zones.is_empty() {
        deployer.zones = args.zones.clone();
    }
    if let Some(ref network) = args.network {
        deployer.network = network.clone();
    }
    if let Some(ref machine_type) = args.machine_type {
        deployer.machine_type = machine_type.clone();
    }
    if let Some(n) = args.num_nodes {
        deployer.num_nodes = n;
    }
    if let Some(ref image_type) = args.image_type {
        deployer.image_type = image_type.clone();
    }
    if let Some(ref version) = args.version {
        deployer.version = version.clone();
    }
    if args.release_channel.is_some() {
        deployer.release_channel = args.release_channel.clone();
    }
    if args.enable_workload_identity {
        deployer.workload_identity = true;
    }
    if args.autopilot {
        deployer.autopilot = true;
    }
    if args.gcloud_command_group.is_some() {
        deployer.gcloud_command_group = args.gcloud_command_group.clone();
    }
    if let Some(ref flags) = args.gcloud_extra_flags {
        deployer.gcloud_extra_flags = flags.clone();
    }
    if args.create_command.is_some() {
        deployer.create_command = args.create_command.clone();
    }
    if args.private_cluster_access_level.is_some() {
        deployer.private_cluster_access_level = args.private_cluster_access_level.clone();
    }
    if !args.private_cluster_master_ip_ranges.is_empty() {
        deployer.private_cluster_master_ip_ranges = args.private_cluster_master_ip_ranges.clone();
    }
    if args.repo_root.is_some() {
        deployer.repo_root = args.repo_root.clone();
    }
    if let Some(ref artifacts) = args.artifacts {
        deployer.artifacts_dir = artifacts.clone();
    }
    if args.gcp_service_account.is_some() {
        deployer.service_account_key_file = args.gcp_service_account.clone();
    }

    if !args.retryable_error_patterns.is_empty() {
        config.retry.retryable_error_patterns = args.retryable_error_patterns.clone();
    }
    if args.max_in_flight.is_some() {
        config.retry.max_in_flight = args.max_in_flight;
    }
}
