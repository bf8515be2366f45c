//! Integration tests for the GKE provisioner

mod config_loading;
mod deployer_flow;
mod test_utils;
