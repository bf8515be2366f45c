//! Config loader facade: one entry point for every layer.

use super::merge::merge_policy;
use super::sources::{environment, global_file, workspace_file};
use super::ProvisionerConfig;
use crate::error::ProvisionError;
use config::File;
use std::path::Path;

/// Loads [`ProvisionerConfig`] from the layered sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults, then global file, then `<workspace_root>/gke-provisioner.toml`, then environment.
    pub fn load(workspace_root: &Path) -> Result<ProvisionerConfig, ProvisionError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = environment::add_to_builder(builder);
        Ok(builder.build()?.try_deserialize()?)
    }

    /// Defaults, then the explicit file (required), then environment.
    pub fn load_from_file(path: &Path) -> Result<ProvisionerConfig, ProvisionError> {
        if !path.exists() {
            return Err(ProvisionError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let builder = merge_policy::builder_with_defaults()?
            .add_source(File::from(path).required(true));
        let builder = environment::add_to_builder(builder);
        Ok(builder.build()?.try_deserialize()?)
    }
}
