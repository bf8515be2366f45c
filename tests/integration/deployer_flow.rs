//! Up / IsUp / Down flows against scripted tools and a recording infrastructure.

use super::test_utils::{config, MockInfrastructure, ScriptedRunner};
use gke_provisioner::config::ProvisionerConfig;
use gke_provisioner::deployer::Deployer;
use gke_provisioner::error::ProvisionError;
use gke_provisioner::exec::{CommandOutput, CommandRunner, ToolCommand};
use gke_provisioner::infra::Infrastructure;
use gke_provisioner::kubeconfig::KUBECONFIG_ENV;
use gke_provisioner::retry::Location;
use std::sync::Arc;

fn deployer(
    config: &ProvisionerConfig,
    runner: ScriptedRunner,
    infra: MockInfrastructure,
) -> (Deployer, Arc<ScriptedRunner>, Arc<MockInfrastructure>) {
    let runner = Arc::new(runner);
    let infra = Arc::new(infra);
    let deployer = Deployer::with_collaborators(
        config,
        Arc::clone(&runner) as Arc<dyn CommandRunner>,
        Arc::clone(&infra) as Arc<dyn Infrastructure>,
    )
    .unwrap();
    (deployer, runner, infra)
}

fn ok_runner() -> ScriptedRunner {
    ScriptedRunner::new(|command: &ToolCommand| {
        if command.program == "kubectl" {
            CommandOutput::success("node/gke-a-1\nnode/gke-a-2\n")
        } else {
            CommandOutput::success("")
        }
    })
}

#[tokio::test]
async fn up_sequences_preparation_creation_and_test_setup() {
    let config = config(&["a", "b"], &["us-central1"]);
    let (mut deployer, runner, infra) = deployer(&config, ok_runner(), MockInfrastructure::new());

    let report = deployer.up().await.unwrap();
    assert_eq!(report.run_id, "run-1");
    assert_eq!(report.attempts, 1);
    assert_eq!(report.location, Location::regional("us-central1"));
    assert!(report.rolled_back_attempts.is_empty());

    let calls = infra.calls();
    assert_eq!(calls[0], "prepare_project proj");
    assert_eq!(calls[1], "create_network proj");
    assert_eq!(calls[2], "setup_network proj");
    assert_eq!(calls[3], "create_subnets us-central1");
    assert_eq!(infra.calls_starting_with("instance_groups").len(), 2);
    assert_eq!(infra.calls_starting_with("ensure_firewall_rule").len(), 2);
    assert_eq!(deployer.instance_groups().len(), 2);

    // One kubeconfig file per cluster, each fetched with KUBECONFIG pointing at it.
    assert!(report.kubeconfig.contains("kubecfg-proj-a"));
    assert!(report.kubeconfig.contains("kubecfg-proj-b"));
    let fetches: Vec<ToolCommand> = runner
        .calls
        .lock()
        .iter()
        .filter(|c| c.has_arg("get-credentials"))
        .cloned()
        .collect();
    assert_eq!(fetches.len(), 2);
    for fetch in &fetches {
        let cluster = fetch.args[3].clone();
        let (key, value) = fetch.env.iter().find(|(k, _)| k == KUBECONFIG_ENV).unwrap();
        assert_eq!(key, KUBECONFIG_ENV);
        assert!(value.ends_with(&format!("kubecfg-proj-{}", cluster)));
    }
}

#[tokio::test]
async fn test_setup_runs_once() {
    let config = config(&["a"], &["us-central1"]);
    let (mut deployer, _runner, infra) = deployer(&config, ok_runner(), MockInfrastructure::new());
    let location = Location::regional("us-central1");

    deployer.test_setup(&location).await.unwrap();
    deployer.test_setup(&location).await.unwrap();
    assert_eq!(infra.calls_starting_with("instance_groups").len(), 1);
    assert_eq!(infra.calls_starting_with("ensure_firewall_rule").len(), 1);
}

#[tokio::test]
async fn failed_up_still_dumps_logs_and_returns_the_creation_error() {
    let mut config = config(&["a"], &["us-central1"]);
    config.deployer.repo_root = Some("/src/k8s".into());
    config.deployer.artifacts_dir = "/tmp/artifacts".into();
    let runner = ScriptedRunner::new(|command: &ToolCommand| {
        if command.has_arg("create") {
            CommandOutput::failure(1, "PERMISSION_DENIED")
        } else {
            CommandOutput::success("")
        }
    });
    let (mut deployer, runner, infra) = deployer(&config, runner, MockInfrastructure::new());

    let err = deployer.up().await.unwrap_err();
    assert!(matches!(err, ProvisionError::CreationFatal { .. }), "got {err}");
    assert!(infra.calls_starting_with("instance_groups").is_empty());

    let calls = runner.calls.lock();
    let dump = calls.last().unwrap();
    assert!(dump.program.ends_with("cluster/log-dump/log-dump.sh"));
    assert_eq!(dump.args, vec!["/tmp/artifacts"]);
}

#[tokio::test]
async fn log_dump_failure_does_not_mask_success() {
    let mut config = config(&["a"], &["us-central1"]);
    config.deployer.repo_root = Some("/src/k8s".into());
    let runner = ScriptedRunner::new(|command: &ToolCommand| {
        if command.program.ends_with("log-dump.sh") {
            CommandOutput::failure(2, "no such cluster")
        } else {
            CommandOutput::success("")
        }
    });
    let (mut deployer, _runner, _infra) = deployer(&config, runner, MockInfrastructure::new());
    assert!(deployer.up().await.is_ok());
}

#[tokio::test]
async fn is_up_reports_node_counts_at_the_located_location() {
    let config = config(&["a"], &["us-central1"]);
    let infra = MockInfrastructure {
        located: Some(Location::zonal("us-east1-b")),
        ..MockInfrastructure::default()
    };
    let (deployer, runner, _infra) = deployer(&config, ok_runner(), infra);

    let statuses = deployer.is_up().await.unwrap();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].nodes, 2);
    assert!(runner
        .calls
        .lock()
        .iter()
        .any(|c| c.has_arg("get-credentials") && c.has_arg("--zone=us-east1-b")));
}

#[tokio::test]
async fn is_up_fails_when_a_cluster_has_no_nodes() {
    let config = config(&["a"], &["us-central1"]);
    let runner = ScriptedRunner::new(|_: &ToolCommand| CommandOutput::success(""));
    let (deployer, _runner, _infra) = deployer(&config, runner, MockInfrastructure::new());

    let err = deployer.is_up().await.unwrap_err();
    assert!(matches!(err, ProvisionError::Verification(_)));
    assert!(err.to_string().contains("no nodes active: proj"));
}

#[tokio::test]
async fn down_deletes_located_clusters_then_the_network() {
    let config = config(&["a", "b"], &["us-central1"]);
    let infra = MockInfrastructure {
        located: Some(Location::regional("us-central1")),
        ..MockInfrastructure::default()
    };
    let (deployer, _runner, infra) = deployer(&config, ok_runner(), infra);

    deployer.down().await.unwrap();
    let mut deletions = infra.calls_starting_with("delete_cluster");
    deletions.sort();
    assert_eq!(
        deletions,
        vec![
            "delete_cluster proj/a@us-central1",
            "delete_cluster proj/b@us-central1"
        ]
    );
    assert_eq!(infra.calls().last().unwrap(), "delete_network proj");
}

#[tokio::test]
async fn down_keeps_going_after_a_failed_deletion() {
    let config = config(&["a"], &["us-central1"]);
    let infra = MockInfrastructure {
        located: Some(Location::regional("us-central1")),
        fail_cluster_deletion: true,
        ..MockInfrastructure::default()
    };
    let (deployer, _runner, infra) = deployer(&config, ok_runner(), infra);

    assert!(deployer.down().await.is_err());
    assert_eq!(infra.calls().last().unwrap(), "delete_network proj");
}

#[test]
fn invalid_flags_fail_before_any_cloud_work() {
    let mut config = config(&["a"], &[]);
    config.deployer.zones.clear();
    let infra = Arc::new(MockInfrastructure::new());
    let result = Deployer::with_collaborators(
        &config,
        Arc::new(ok_runner()) as Arc<dyn CommandRunner>,
        Arc::clone(&infra) as Arc<dyn Infrastructure>,
    );
    assert!(matches!(result, Err(ProvisionError::Validation(_))));
    assert!(infra.calls().is_empty());
}
