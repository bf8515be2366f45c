//! Environment source: GKE_PROVISIONER__DEPLOYER__PROJECTS=p1,p2 and friends.

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::Environment;

pub const ENV_PREFIX: &str = "GKE_PROVISIONER";

/// Keys parsed as comma-separated lists.
const LIST_KEYS: &[&str] = &[
    "deployer.projects",
    "deployer.clusters",
    "deployer.regions",
    "deployer.zones",
    "deployer.private_cluster_master_ip_ranges",
    "retry.retryable_error_patterns",
];

pub fn add_to_builder(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    let mut env = Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .list_separator(",")
        .try_parsing(true);
    for key in LIST_KEYS {
        env = env.with_list_parse_key(key);
    }
    builder.add_source(env)
}
