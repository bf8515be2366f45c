//! CLI help and command-name contract for logging and routing.

use crate::cli::parse::{Commands, DeployArgs};

/// Command name string for log spans (e.g. "up", "is-up").
pub fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Up { .. } => "up",
        Commands::IsUp { .. } => "is-up",
        Commands::Down { .. } => "down",
        Commands::Kubeconfig { .. } => "kubeconfig",
        Commands::Config { .. } => "config",
    }
}

/// Run overrides carried by every command.
pub fn deploy_args(command: &Commands) -> &DeployArgs {
    match command {
        Commands::Up { deploy, .. }
        | Commands::IsUp { deploy, .. }
        | Commands::Down { deploy }
        | Commands::Kubeconfig { deploy }
        | Commands::Config { deploy } => deploy,
    }
}
