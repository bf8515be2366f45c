//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::ProvisionError;

/// Map a domain error to the text printed on stderr. Error messages already
/// embed their causes; verification failures also carry captured tool output.
pub fn map_error(e: &ProvisionError) -> String {
    let mut out = format!("Error: {}", e);
    if let ProvisionError::Verification(failure) = e {
        if let Some(ref output) = failure.output {
            out.push_str("\n\n");
            out.push_str(output.trim_end());
        }
    }
    out
}
