//! Workspace config file source: gke-provisioner.toml in the working directory.

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::File;
use std::path::Path;

pub const WORKSPACE_CONFIG_FILE: &str = "gke-provisioner.toml";

/// Add the workspace config file to the builder when present.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    workspace_root: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let path = workspace_root.join(WORKSPACE_CONFIG_FILE);
    if path.exists() {
        Ok(builder.add_source(File::from(path).required(false)))
    } else {
        Ok(builder)
    }
}
