//! CLI domain: parse, route, help, output, and presentation only.
//! No provisioning logic; a single route table dispatches to the deployer.

mod help;
mod output;
mod parse;
mod presentation;
mod route;

pub use help::{command_name, deploy_args};
pub use output::map_error;
pub use parse::{Cli, Commands, DeployArgs};
pub use presentation::{
    format_is_up_json, format_is_up_text, format_up_report_json, format_up_report_text,
};
pub use route::{apply_deploy_args, RunContext};
