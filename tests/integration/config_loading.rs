//! Integration tests for the layered configuration and its hand-off to validation

use gke_provisioner::config::ConfigLoader;
use gke_provisioner::validate::verify_up_flags;
use std::sync::Mutex;
use tempfile::TempDir;

/// Serializes tests that touch GKE_PROVISIONER__* variables.
static ENV_MUTEX: Mutex<()> = Mutex::new(());

const WORKSPACE_FILE: &str = r#"
[deployer]
projects = ["proj-a"]
clusters = ["alpha", "beta"]
regions = ["us-central1", "us-east1"]
machine_type = "e2-standard-4"

[retry]
retryable_error_patterns = ["ZONE_RESOURCE_POOL_EXHAUSTED", "does not have enough resources"]
"#;

#[test]
fn test_workspace_file_builds_a_run_plan() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("gke-provisioner.toml"), WORKSPACE_FILE).unwrap();

    let config = ConfigLoader::load(temp_dir.path()).unwrap();
    let plan = verify_up_flags(&config).unwrap();

    assert_eq!(plan.topology.cluster_count(), 2);
    assert_eq!(plan.candidates.total_attempts(), 2);
    assert!(plan.classifier.is_retryable("ZONE_RESOURCE_POOL_EXHAUSTED in us-central1-a"));
    assert!(!plan.classifier.is_retryable("PERMISSION_DENIED"));
    assert_eq!(plan.topology.clusters("proj-a")[0].machine_type, "e2-standard-4");
}

#[test]
fn test_environment_overrides_workspace_file() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("gke-provisioner.toml"), WORKSPACE_FILE).unwrap();

    std::env::set_var("GKE_PROVISIONER__DEPLOYER__REGIONS", "europe-west4,europe-west1");
    std::env::set_var("GKE_PROVISIONER__DEPLOYER__NUM_NODES", "1");
    let loaded = ConfigLoader::load(temp_dir.path());
    std::env::remove_var("GKE_PROVISIONER__DEPLOYER__REGIONS");
    std::env::remove_var("GKE_PROVISIONER__DEPLOYER__NUM_NODES");

    let config = loaded.unwrap();
    assert_eq!(config.deployer.regions, vec!["europe-west4", "europe-west1"]);
    assert_eq!(config.deployer.num_nodes, 1);
    assert_eq!(config.deployer.projects, vec!["proj-a"]);
}

#[test]
fn test_explicit_file_replaces_workspace_lookup() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("ci.toml");
    std::fs::write(
        &config_file,
        r#"
[deployer]
projects = ["ci-project"]
zones = ["us-west1-a"]
autopilot = false

[logging]
level = "debug"
format = "json"
"#,
    )
    .unwrap();

    let config = ConfigLoader::load_from_file(&config_file).unwrap();
    assert_eq!(config.deployer.projects, vec!["ci-project"]);
    assert_eq!(config.deployer.network, "default");
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, "json");

    let plan = verify_up_flags(&config).unwrap();
    // Generated names when no clusters are listed.
    assert_eq!(plan.topology.cluster_count(), 1);
    assert!(plan.topology.clusters("ci-project")[0].name.starts_with("kt2-"));
}

#[test]
fn test_invalid_pattern_is_rejected_before_provisioning() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join("gke-provisioner.toml"),
        r#"
[deployer]
projects = ["p"]
regions = ["us-central1"]

[retry]
retryable_error_patterns = ["(unclosed"]
"#,
    )
    .unwrap();

    let config = ConfigLoader::load(temp_dir.path()).unwrap();
    assert!(verify_up_flags(&config).is_err());
}
