//! Up/IsUp/Down flows for one run.
//!
//! `up` sequences project preparation, network setup, the retry coordinator
//! and test setup. The location the coordinator settles on is passed on
//! explicitly; nothing re-derives it from retry state.

use crate::cluster::args::subnet_name;
use crate::config::{DeployerConfig, ProvisionerConfig};
use crate::coordinator::{RetryCoordinator, RollbackReport};
use crate::error::ProvisionError;
use crate::exec::{run_checked, CommandRunner, ProcessRunner, ToolCommand};
use crate::fanout::{CreatedCluster, CreatedSubnet, FanOutExecutor};
use crate::infra::{GcloudInfrastructure, Infrastructure};
use crate::kubeconfig::{self, KUBECONFIG_ENV};
use crate::retry::Location;
use crate::validate::{verify_up_flags, RunPlan};
use crate::verify::{self, ClusterStatus};
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of a successful `up`.
#[derive(Debug, Clone, Serialize)]
pub struct UpReport {
    pub run_id: String,
    pub location: Location,
    pub attempts: usize,
    pub kubeconfig: String,
    pub rolled_back_attempts: Vec<usize>,
    /// RFC 3339 timestamp of when the clusters were ready for tests.
    pub finished_at: String,
}

/// Drives one run against the configured projects.
pub struct Deployer {
    config: DeployerConfig,
    plan: RunPlan,
    runner: Arc<dyn CommandRunner>,
    infra: Arc<dyn Infrastructure>,
    executor: FanOutExecutor,
    test_prepared: bool,
    kubeconfig: Option<OsString>,
    instance_groups: BTreeMap<(String, String), Vec<String>>,
    rollback_reports: Vec<RollbackReport>,
}

impl Deployer {
    /// Validate `config` and wire the real gcloud/kubectl collaborators.
    pub fn new(config: &ProvisionerConfig) -> Result<Self, ProvisionError> {
        let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner);
        let deployer = &config.deployer;
        let infra = Arc::new(GcloudInfrastructure::new(
            Arc::clone(&runner),
            deployer.gcloud_binary.clone(),
            deployer.network.clone(),
            deployer.autopilot,
            deployer.service_account_key_file.clone(),
        ));
        Self::with_collaborators(config, runner, infra)
    }

    /// Validate `config` with caller-supplied collaborators.
    pub fn with_collaborators(
        config: &ProvisionerConfig,
        runner: Arc<dyn CommandRunner>,
        infra: Arc<dyn Infrastructure>,
    ) -> Result<Self, ProvisionError> {
        let plan = verify_up_flags(config)?;
        Ok(Self {
            config: config.deployer.clone(),
            plan,
            runner,
            infra,
            executor: FanOutExecutor::with_max_in_flight(config.retry.max_in_flight),
            test_prepared: false,
            kubeconfig: None,
            instance_groups: BTreeMap::new(),
            rollback_reports: Vec::new(),
        })
    }

    pub fn plan(&self) -> &RunPlan {
        &self.plan
    }

    /// Instance groups discovered during test setup, by (project, cluster).
    pub fn instance_groups(&self) -> &BTreeMap<(String, String), Vec<String>> {
        &self.instance_groups
    }

    /// Rollbacks performed by the last `up`, by attempt.
    pub fn rollback_reports(&self) -> &[RollbackReport] {
        &self.rollback_reports
    }

    /// Create every cluster, then prepare them for tests. Cluster logs are
    /// dumped afterwards whatever the outcome.
    pub async fn up(&mut self) -> Result<UpReport, ProvisionError> {
        let result = self.up_inner().await;
        self.dump_cluster_logs().await;
        result
    }

    async fn up_inner(&mut self) -> Result<UpReport, ProvisionError> {
        let topology = self.plan.topology.clone();
        // Only prepare once, for the first project.
        self.infra.prepare_project(topology.host_project()).await?;
        self.infra.create_network(&topology).await?;
        self.infra.setup_network(&topology).await?;

        let coordinator = RetryCoordinator::new(
            Arc::clone(&self.runner),
            Arc::clone(&self.infra),
            Arc::clone(&self.plan.settings),
            self.plan.classifier.clone(),
            self.plan.candidates.clone(),
            self.executor.clone(),
        );
        let rollbacks = coordinator.rollbacks();
        let provisioned = coordinator.run(&topology).await;

        let provisioned = match provisioned {
            Ok(provisioned) => provisioned,
            Err(err) => {
                self.rollback_reports = rollbacks.wait_all().await;
                return Err(err);
            }
        };

        let setup = self.test_setup(&provisioned.location).await;
        self.rollback_reports = rollbacks.wait_all().await;
        for report in &self.rollback_reports {
            if !report.failures.is_empty() {
                warn!(attempt = report.attempt, failures = ?report.failures, "Rollback left resources behind");
            }
        }
        setup.map_err(|e| ProvisionError::TestSetup(Box::new(e)))?;

        let kubeconfig = self
            .kubeconfig
            .as_ref()
            .map(|k| k.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(UpReport {
            run_id: self.plan.run_id.clone(),
            location: provisioned.location,
            attempts: provisioned.attempts,
            kubeconfig,
            rolled_back_attempts: self.rollback_reports.iter().map(|r| r.attempt).collect(),
            finished_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    /// Kubeconfig, instance groups and firewall rules. Runs at most once.
    pub async fn test_setup(&mut self, location: &Location) -> Result<(), ProvisionError> {
        if self.test_prepared {
            return Ok(());
        }
        let topology = self.plan.topology.clone();
        self.infra.prepare_project(topology.host_project()).await?;
        self.kubeconfig(location).await?;

        for (_, project, cluster) in topology.pairs() {
            let groups = self
                .infra
                .instance_groups(project, location, &cluster.name)
                .await?;
            debug!(project = %project, cluster = %cluster.name, groups = ?groups, "Instance groups");
            self.instance_groups
                .insert((project.to_string(), cluster.name.clone()), groups);
        }
        for (_, project, cluster) in topology.pairs() {
            self.infra
                .ensure_firewall_rule(&topology, project, location, &cluster.name)
                .await?;
        }

        self.test_prepared = true;
        Ok(())
    }

    /// Joined kubeconfig path for every cluster, fetched on first use and
    /// exported as `KUBECONFIG` for later phases.
    pub async fn kubeconfig(&mut self, location: &Location) -> Result<OsString, ProvisionError> {
        if let Some(ref path) = self.kubeconfig {
            return Ok(path.clone());
        }
        let dir = kubeconfig::create_kubeconfig_dir()?;
        let set = kubeconfig::materialize(
            self.runner.as_ref(),
            &self.config.gcloud_binary,
            &self.plan.topology,
            location,
            &dir,
        )
        .await?;
        let joined = set.joined()?;
        std::env::set_var(KUBECONFIG_ENV, &joined);
        self.kubeconfig = Some(joined.clone());
        Ok(joined)
    }

    /// Location of the already-created clusters: asked from the cloud, else the first candidate.
    pub async fn current_location(&self) -> Result<Location, ProvisionError> {
        let topology = &self.plan.topology;
        if let Some((_, project, cluster)) = topology.pairs().next() {
            if let Some(location) = self.infra.locate_cluster(project, &cluster.name).await? {
                return Ok(location);
            }
        }
        self.plan.candidates.select(0).ok_or_else(|| {
            ProvisionError::Validation("at least one region or zone is required".to_string())
        })
    }

    /// Naively treat a cluster that reports nodes as up.
    pub async fn is_up(&self) -> Result<Vec<ClusterStatus>, ProvisionError> {
        let topology = &self.plan.topology;
        self.infra.prepare_project(topology.host_project()).await?;
        let location = self.current_location().await?;
        let scratch = tempfile::Builder::new().prefix("gke-provisioner-isup").tempdir()?;
        verify::check_clusters(
            self.runner.as_ref(),
            &self.config.gcloud_binary,
            &self.config.kubectl_binary,
            topology,
            &location,
            scratch.path(),
        )
        .await
    }

    /// Delete every cluster of the topology, then its subnets and network.
    /// All deletions are attempted; the first failure is returned.
    pub async fn down(&self) -> Result<(), ProvisionError> {
        let topology = &self.plan.topology;
        self.infra.prepare_project(topology.host_project()).await?;

        let mut clusters = Vec::new();
        for (_, project, cluster) in topology.pairs() {
            match self.infra.locate_cluster(project, &cluster.name).await? {
                Some(location) => clusters.push(CreatedCluster {
                    project: project.to_string(),
                    name: cluster.name.clone(),
                    location,
                }),
                None => info!(project = %project, cluster = %cluster.name, "Cluster not found, nothing to delete"),
            }
        }

        let infra = &self.infra;
        let results = join_all(clusters.iter().map(|cluster| async move {
            info!(project = %cluster.project, cluster = %cluster.name, "Deleting cluster");
            infra.delete_cluster(cluster).await
        }))
        .await;
        let mut first_error = results.into_iter().find_map(Result::err);

        if topology.is_multi_project() {
            let mut regions: Vec<String> = clusters.iter().map(|c| c.location.region.clone()).collect();
            regions.sort();
            regions.dedup();
            for region in regions {
                for (index, _) in topology.projects().iter().enumerate() {
                    let subnet = CreatedSubnet {
                        project: topology.host_project().to_string(),
                        name: subnet_name(&self.config.network, topology.projects(), index),
                        region: region.clone(),
                    };
                    if let Err(e) = self.infra.delete_subnet(&subnet).await {
                        warn!(subnet = %subnet.name, error = %e, "Failed to delete subnet");
                        first_error.get_or_insert(e);
                    }
                }
            }
        }

        if let Err(e) = self.infra.delete_network(topology).await {
            warn!(network = %self.config.network, error = %e, "Failed to delete network");
            first_error.get_or_insert(e);
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Run the repository's log dump script; failures only warn.
    async fn dump_cluster_logs(&self) {
        let repo_root = match self.config.repo_root {
            Some(ref root) => root,
            None => {
                warn!("repo-root not supplied, skip dumping cluster logs");
                return;
            }
        };
        let script = repo_root.join("cluster").join("log-dump").join("log-dump.sh");
        let mut command = ToolCommand::new(script.to_string_lossy())
            .arg(self.config.artifacts_dir.to_string_lossy());
        if let Some(ref kubeconfig) = self.kubeconfig {
            command = command.env(KUBECONFIG_ENV, kubeconfig.to_string_lossy());
        }
        info!(script = %script.display(), artifacts = %self.config.artifacts_dir.display(), "Dumping cluster logs");
        if let Err(e) = run_checked(self.runner.as_ref(), &command, &CancellationToken::new()).await {
            warn!(error = %e, "Dumping cluster logs at the end of up failed");
        }
    }
}
