//! CLI presentation: text and json formatters per command.

mod status;
mod up;

pub use status::{format_is_up_json, format_is_up_text};
pub use up::{format_up_report_json, format_up_report_text};
