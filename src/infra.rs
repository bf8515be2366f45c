//! Cloud-side collaborators around cluster creation: project preparation,
//! shared networks, subnets, cluster deletion, instance groups and firewall
//! rules. Each is a plain gcloud call with success/failure semantics.

use crate::cluster::args::subnet_name;
use crate::error::ProvisionError;
use crate::exec::{run_checked, CommandOutput, CommandRunner, ToolCommand};
use crate::fanout::{AttemptLedger, CreatedCluster, CreatedSubnet};
use crate::retry::Location;
use crate::topology::Topology;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Port range opened to test workloads on every cluster's nodes.
pub const FIREWALL_ALLOW: &str = "tcp:30000-32767,udp:30000-32767";

/// Cloud operations the provisioning flow depends on.
#[async_trait]
pub trait Infrastructure: Send + Sync {
    /// One-time gcloud setup for `project`.
    async fn prepare_project(&self, project: &str) -> Result<(), ProvisionError>;

    /// Create the network if it does not exist yet.
    async fn create_network(&self, topology: &Topology) -> Result<(), ProvisionError>;

    /// Shared VPC wiring between the host project and the others.
    async fn setup_network(&self, topology: &Topology) -> Result<(), ProvisionError>;

    /// Create the per-project subnets an attempt in `region` needs. Each
    /// subnet is recorded in `ledger` as soon as it exists, so a failure
    /// part-way still leaves the earlier ones to roll back.
    async fn create_subnets(
        &self,
        topology: &Topology,
        region: &str,
        ledger: &AttemptLedger,
    ) -> Result<(), ProvisionError>;

    async fn delete_subnet(&self, subnet: &CreatedSubnet) -> Result<(), ProvisionError>;

    async fn delete_cluster(&self, cluster: &CreatedCluster) -> Result<(), ProvisionError>;

    /// Delete the network created by `create_network`, if any.
    async fn delete_network(&self, topology: &Topology) -> Result<(), ProvisionError>;

    /// Where an existing cluster lives, if it exists.
    async fn locate_cluster(
        &self,
        project: &str,
        cluster: &str,
    ) -> Result<Option<Location>, ProvisionError>;

    /// Instance group URLs backing the cluster's node pools.
    async fn instance_groups(
        &self,
        project: &str,
        location: &Location,
        cluster: &str,
    ) -> Result<Vec<String>, ProvisionError>;

    /// Open the test port range to the cluster's nodes.
    async fn ensure_firewall_rule(
        &self,
        topology: &Topology,
        project: &str,
        location: &Location,
        cluster: &str,
    ) -> Result<(), ProvisionError>;
}

/// [`Infrastructure`] backed by the gcloud CLI.
pub struct GcloudInfrastructure {
    runner: Arc<dyn CommandRunner>,
    gcloud: String,
    network: String,
    autopilot: bool,
    service_account_key_file: Option<PathBuf>,
    prepared: OnceCell<()>,
}

impl GcloudInfrastructure {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        gcloud: impl Into<String>,
        network: impl Into<String>,
        autopilot: bool,
        service_account_key_file: Option<PathBuf>,
    ) -> Self {
        Self {
            runner,
            gcloud: gcloud.into(),
            network: network.into(),
            autopilot,
            service_account_key_file,
            prepared: OnceCell::new(),
        }
    }

    fn gcloud(&self) -> ToolCommand {
        ToolCommand::new(self.gcloud.clone())
    }

    async fn run(&self, command: ToolCommand) -> Result<CommandOutput, ProvisionError> {
        Ok(run_checked(self.runner.as_ref(), &command, &CancellationToken::new()).await?)
    }

    /// Run without failing on a non-zero exit.
    async fn probe(&self, command: ToolCommand) -> Result<CommandOutput, ProvisionError> {
        Ok(self.runner.run(&command, &CancellationToken::new()).await?)
    }

    fn is_default_network(&self) -> bool {
        self.network == "default"
    }
}

/// Secondary ranges for the subnet of the project at `index`.
fn subnet_ranges(index: usize) -> (String, String, String) {
    (
        format!("10.0.{}.0/22", index * 4),
        format!("10.{}.0.0/16", 100 + index),
        format!("10.{}.0.0/20", 200 + index),
    )
}

/// Firewall rule name for a cluster, within GCE's 63 character limit.
pub fn firewall_rule_name(project: &str, cluster: &str) -> String {
    let name: String = format!("e2e-ports-{}-{}", cluster, project)
        .chars()
        .take(63)
        .collect();
    name.trim_end_matches('-').to_string()
}

#[async_trait]
impl Infrastructure for GcloudInfrastructure {
    async fn prepare_project(&self, project: &str) -> Result<(), ProvisionError> {
        self.prepared
            .get_or_try_init(|| async {
                if let Some(ref key_file) = self.service_account_key_file {
                    info!(key_file = %key_file.display(), "Activating service account");
                    self.run(
                        self.gcloud()
                            .args(["auth", "activate-service-account"])
                            .arg(format!("--key-file={}", key_file.display())),
                    )
                    .await?;
                }
                self.run(self.gcloud().args(["config", "set", "project", project]))
                    .await?;
                info!(project = %project, "Prepared gcloud");
                Ok::<(), ProvisionError>(())
            })
            .await?;
        Ok(())
    }

    async fn create_network(&self, topology: &Topology) -> Result<(), ProvisionError> {
        if self.is_default_network() {
            return Ok(());
        }
        let host = topology.host_project();
        let exists = self
            .probe(
                self.gcloud()
                    .args(["compute", "networks", "describe", self.network.as_str()])
                    .arg(format!("--project={}", host))
                    .arg("--format=value(name)"),
            )
            .await?
            .is_success();
        if exists {
            debug!(network = %self.network, "Network already exists");
            return Ok(());
        }
        let mode = if topology.is_multi_project() { "custom" } else { "auto" };
        info!(network = %self.network, project = %host, "Creating network");
        self.run(
            self.gcloud()
                .args(["compute", "networks", "create", self.network.as_str()])
                .arg(format!("--project={}", host))
                .arg(format!("--subnet-mode={}", mode)),
        )
        .await?;
        Ok(())
    }

    async fn setup_network(&self, topology: &Topology) -> Result<(), ProvisionError> {
        if !topology.is_multi_project() {
            return Ok(());
        }
        let host = topology.host_project();
        self.run(
            self.gcloud()
                .args(["compute", "shared-vpc", "enable", host]),
        )
        .await?;
        for project in &topology.projects()[1..] {
            info!(project = %project, host = %host, "Associating service project");
            self.run(
                self.gcloud()
                    .args(["compute", "shared-vpc", "associated-projects", "add", project.as_str()])
                    .arg(format!("--host-project={}", host)),
            )
            .await?;
        }
        Ok(())
    }

    async fn create_subnets(
        &self,
        topology: &Topology,
        region: &str,
        ledger: &AttemptLedger,
    ) -> Result<(), ProvisionError> {
        if !topology.is_multi_project() {
            return Ok(());
        }
        let host = topology.host_project();
        for index in 0..topology.projects().len() {
            let name = subnet_name(&self.network, topology.projects(), index);
            let (primary, pods, services) = subnet_ranges(index);
            let mut command = self
                .gcloud()
                .args(["compute", "networks", "subnets", "create", name.as_str()])
                .arg(format!("--project={}", host))
                .arg(format!("--region={}", region))
                .arg(format!("--network={}", self.network))
                .arg(format!("--range={}", primary));
            if !self.autopilot {
                command = command.arg(format!(
                    "--secondary-range={}-pods={},{}-services={}",
                    name, pods, name, services
                ));
            }
            info!(subnet = %name, region = %region, "Creating subnet");
            self.run(command).await?;
            ledger.record_subnet(CreatedSubnet {
                project: host.to_string(),
                name,
                region: region.to_string(),
            });
        }
        Ok(())
    }

    async fn delete_subnet(&self, subnet: &CreatedSubnet) -> Result<(), ProvisionError> {
        self.run(
            self.gcloud()
                .args(["compute", "networks", "subnets", "delete", subnet.name.as_str(), "--quiet"])
                .arg(format!("--project={}", subnet.project))
                .arg(format!("--region={}", subnet.region)),
        )
        .await?;
        Ok(())
    }

    async fn delete_cluster(&self, cluster: &CreatedCluster) -> Result<(), ProvisionError> {
        self.run(
            self.gcloud()
                .args(["container", "clusters", "delete", cluster.name.as_str(), "--quiet"])
                .arg(format!("--project={}", cluster.project))
                .arg(cluster.location.flag()),
        )
        .await?;
        Ok(())
    }

    async fn delete_network(&self, topology: &Topology) -> Result<(), ProvisionError> {
        if self.is_default_network() {
            return Ok(());
        }
        self.run(
            self.gcloud()
                .args(["compute", "networks", "delete", self.network.as_str(), "--quiet"])
                .arg(format!("--project={}", topology.host_project())),
        )
        .await?;
        Ok(())
    }

    async fn locate_cluster(
        &self,
        project: &str,
        cluster: &str,
    ) -> Result<Option<Location>, ProvisionError> {
        let output = self
            .run(
                self.gcloud()
                    .args(["container", "clusters", "list"])
                    .arg(format!("--project={}", project))
                    .arg(format!("--filter=name={}", cluster))
                    .arg("--format=value(location)"),
            )
            .await?;
        Ok(output.lines().first().map(|l| Location::parse(l)))
    }

    async fn instance_groups(
        &self,
        project: &str,
        location: &Location,
        cluster: &str,
    ) -> Result<Vec<String>, ProvisionError> {
        let output = self
            .run(
                self.gcloud()
                    .args(["container", "clusters", "describe", cluster])
                    .arg(format!("--project={}", project))
                    .arg(location.flag())
                    .arg("--format=value(instanceGroupUrls)"),
            )
            .await?;
        Ok(output
            .stdout
            .split(|c: char| c == ';' || c.is_whitespace())
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn ensure_firewall_rule(
        &self,
        topology: &Topology,
        project: &str,
        location: &Location,
        cluster: &str,
    ) -> Result<(), ProvisionError> {
        // Autopilot manages node firewalls itself.
        if self.autopilot {
            return Ok(());
        }
        let network_project = topology.host_project();
        let rule = firewall_rule_name(project, cluster);
        let exists = self
            .probe(
                self.gcloud()
                    .args(["compute", "firewall-rules", "describe", rule.as_str()])
                    .arg(format!("--project={}", network_project))
                    .arg("--format=value(name)"),
            )
            .await?
            .is_success();
        if exists {
            debug!(rule = %rule, "Firewall rule already exists");
            return Ok(());
        }

        let tag_output = self
            .run(
                self.gcloud()
                    .args(["compute", "instances", "list"])
                    .arg(format!("--project={}", project))
                    .arg(format!("--filter=name~^gke-{}-", cluster))
                    .arg("--format=value(tags.items[0])")
                    .arg("--limit=1"),
            )
            .await?;
        let node_tag = tag_output.lines().into_iter().next().ok_or_else(|| {
            ProvisionError::Validation(format!(
                "no node instances found for cluster {} in {} ({})",
                cluster, project, location
            ))
        })?;

        info!(rule = %rule, node_tag = %node_tag, "Creating firewall rule");
        self.run(
            self.gcloud()
                .args(["compute", "firewall-rules", "create", rule.as_str()])
                .arg(format!("--project={}", network_project))
                .arg(format!("--network={}", self.network))
                .arg(format!("--allow={}", FIREWALL_ALLOW))
                .arg(format!("--target-tags={}", node_tag)),
        )
        .await?;
        Ok(())
    }
}
