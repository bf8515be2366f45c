//! GKE Provisioner: Multi-Project Cluster Provisioning
//!
//! Creates a set of GKE clusters across one or more projects for a test run,
//! retrying retryable failures in the next candidate location after rolling
//! back whatever the failed attempt left behind.

pub mod cli;
pub mod cluster;
pub mod config;
pub mod coordinator;
pub mod deployer;
pub mod error;
pub mod exec;
pub mod fanout;
pub mod infra;
pub mod kubeconfig;
pub mod logging;
pub mod retry;
pub mod topology;
pub mod validate;
pub mod verify;
