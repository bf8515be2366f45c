//! Shared test doubles for integration tests
//!
//! `ScriptedRunner` stands in for gcloud/kubectl and answers each command
//! through a caller-supplied function. `MockInfrastructure` records every
//! cloud-side call so tests can assert on rollback and teardown.

use async_trait::async_trait;
use gke_provisioner::config::ProvisionerConfig;
use gke_provisioner::error::{ProvisionError, ToolError};
use gke_provisioner::exec::{CommandOutput, CommandRunner, ToolCommand};
use gke_provisioner::fanout::{AttemptLedger, CreatedCluster, CreatedSubnet};
use gke_provisioner::infra::Infrastructure;
use gke_provisioner::retry::Location;
use gke_provisioner::topology::Topology;
use parking_lot::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub type Responder = Box<dyn Fn(&ToolCommand) -> CommandOutput + Send + Sync>;

/// Answers commands through `respond`; cluster creations honor cancellation
/// and take `create_delay` to finish.
pub struct ScriptedRunner {
    pub calls: Mutex<Vec<ToolCommand>>,
    respond: Responder,
    create_delay: Duration,
}

impl ScriptedRunner {
    pub fn new(respond: impl Fn(&ToolCommand) -> CommandOutput + Send + Sync + 'static) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            respond: Box::new(respond),
            create_delay: Duration::from_millis(0),
        }
    }

    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = delay;
        self
    }

    /// Every cluster creation command issued so far.
    pub fn creates(&self) -> Vec<ToolCommand> {
        self.calls
            .lock()
            .iter()
            .filter(|c| is_create(c))
            .cloned()
            .collect()
    }
}

pub fn is_create(command: &ToolCommand) -> bool {
    command.has_arg("clusters") && (command.has_arg("create") || command.has_arg("create-auto"))
}

/// Name of the cluster a create command targets (always the last argument).
pub fn cluster_of(command: &ToolCommand) -> String {
    command.args.last().cloned().unwrap_or_default()
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(
        &self,
        command: &ToolCommand,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput, ToolError> {
        self.calls.lock().push(command.clone());
        if is_create(command) && !self.create_delay.is_zero() {
            let output = (self.respond)(command);
            // Failures surface quickly; successes take the full delay.
            if !output.is_success() {
                return Ok(output);
            }
            return tokio::select! {
                _ = tokio::time::sleep(self.create_delay) => Ok(output),
                _ = cancel.cancelled() => Err(ToolError::Cancelled { command: command.to_string() }),
            };
        }
        Ok((self.respond)(command))
    }
}

/// Cloud-side calls, in order, as short strings such as `delete_cluster p/c@us-east1`.
#[derive(Default)]
pub struct MockInfrastructure {
    pub calls: Mutex<Vec<String>>,
    /// Location `locate_cluster` reports; `None` means "not found".
    pub located: Option<Location>,
    pub fail_cluster_deletion: bool,
    /// `(subnet, region)` whose creation fails with a quota error.
    pub fail_subnet: Option<(String, String)>,
}

impl MockInfrastructure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl Infrastructure for MockInfrastructure {
    async fn prepare_project(&self, project: &str) -> Result<(), ProvisionError> {
        self.record(format!("prepare_project {}", project));
        Ok(())
    }

    async fn create_network(&self, topology: &Topology) -> Result<(), ProvisionError> {
        self.record(format!("create_network {}", topology.host_project()));
        Ok(())
    }

    async fn setup_network(&self, topology: &Topology) -> Result<(), ProvisionError> {
        self.record(format!("setup_network {}", topology.host_project()));
        Ok(())
    }

    async fn create_subnets(
        &self,
        topology: &Topology,
        region: &str,
        ledger: &AttemptLedger,
    ) -> Result<(), ProvisionError> {
        self.record(format!("create_subnets {}", region));
        if !topology.is_multi_project() {
            return Ok(());
        }
        for project in topology.projects() {
            let name = format!("net-{}", project);
            if self.fail_subnet.as_ref() == Some(&(name.clone(), region.to_string())) {
                return Err(ProvisionError::Tool(ToolError::Failed {
                    command: format!("gcloud compute networks subnets create {}", name),
                    status: Some(1),
                    output: "ERROR: QUOTA_EXCEEDED: subnetworks".to_string(),
                }));
            }
            ledger.record_subnet(CreatedSubnet {
                project: topology.host_project().to_string(),
                name,
                region: region.to_string(),
            });
        }
        Ok(())
    }

    async fn delete_subnet(&self, subnet: &CreatedSubnet) -> Result<(), ProvisionError> {
        self.record(format!("delete_subnet {}@{}", subnet.name, subnet.region));
        Ok(())
    }

    async fn delete_cluster(&self, cluster: &CreatedCluster) -> Result<(), ProvisionError> {
        self.record(format!(
            "delete_cluster {}/{}@{}",
            cluster.project, cluster.name, cluster.location.region
        ));
        if self.fail_cluster_deletion {
            return Err(ProvisionError::Tool(ToolError::Failed {
                command: format!("gcloud container clusters delete {}", cluster.name),
                status: Some(1),
                output: "still provisioning".to_string(),
            }));
        }
        Ok(())
    }

    async fn delete_network(&self, topology: &Topology) -> Result<(), ProvisionError> {
        self.record(format!("delete_network {}", topology.host_project()));
        Ok(())
    }

    async fn locate_cluster(
        &self,
        project: &str,
        cluster: &str,
    ) -> Result<Option<Location>, ProvisionError> {
        self.record(format!("locate_cluster {}/{}", project, cluster));
        Ok(self.located.clone())
    }

    async fn instance_groups(
        &self,
        project: &str,
        _location: &Location,
        cluster: &str,
    ) -> Result<Vec<String>, ProvisionError> {
        self.record(format!("instance_groups {}/{}", project, cluster));
        Ok(vec![format!("https://compute/{}/{}-pool", project, cluster)])
    }

    async fn ensure_firewall_rule(
        &self,
        _topology: &Topology,
        project: &str,
        _location: &Location,
        cluster: &str,
    ) -> Result<(), ProvisionError> {
        self.record(format!("ensure_firewall_rule {}/{}", project, cluster));
        Ok(())
    }
}

/// Minimal valid config: one project, explicit clusters and regions, fixed run id.
pub fn config(clusters: &[&str], regions: &[&str]) -> ProvisionerConfig {
    let mut config = ProvisionerConfig::default();
    config.deployer.projects = vec!["proj".to_string()];
    config.deployer.clusters = clusters.iter().map(|s| s.to_string()).collect();
    config.deployer.regions = regions.iter().map(|s| s.to_string()).collect();
    config.deployer.run_id = Some("run-1".to_string());
    config.deployer.version = "1.30".to_string();
    config
}
