//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
///
/// Only scalar defaults that every layer may override are set here; list and
/// optional fields fall back to serde defaults.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("deployer.network", "default")?
        .set_default("deployer.num_clusters", 1)?
        .set_default("deployer.num_nodes", 3)?
        .set_default("deployer.version", "latest")?
        .set_default("logging.level", "info")
}
