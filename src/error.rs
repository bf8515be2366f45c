//! Error types for GKE cluster provisioning.

use thiserror::Error;

/// Failures invoking an external tool (`gcloud`, `kubectl`, log dump scripts).
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {}: {output}", describe_status(.status))]
    Failed {
        command: String,
        status: Option<i32>,
        output: String,
    },

    #[error("`{command}` was cancelled")]
    Cancelled { command: String },
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit status {}", code),
        None => "no exit status (terminated by signal)".to_string(),
    }
}

impl ToolError {
    /// Captured combined output, when the tool got far enough to produce any.
    pub fn output(&self) -> Option<&str> {
        match self {
            ToolError::Failed { output, .. } => Some(output.as_str()),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ToolError::Cancelled { .. })
    }

    /// What the tool said went wrong, without the command line.
    pub fn failure_message(&self) -> String {
        match self {
            ToolError::Spawn { source, .. } => source.to_string(),
            ToolError::Failed { output, .. } => output.clone(),
            ToolError::Cancelled { .. } => "cancelled".to_string(),
        }
    }
}

/// Cluster readiness check failure with the payload downstream test reporting consumes.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct VerificationFailure {
    pub message: String,
    /// Raw tool output, if the failure came from a tool invocation.
    pub output: Option<String>,
}

/// Provisioning errors surfaced to the top-level flow.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("error creating cluster {project}/{cluster}: {source}")]
    ClusterCreation {
        project: String,
        cluster: String,
        #[source]
        source: ToolError,
    },

    #[error("error creating clusters (attempt {attempt}, {location}): {source}")]
    CreationFatal {
        attempt: usize,
        location: String,
        #[source]
        source: Box<ProvisionError>,
    },

    #[error("error creating clusters: retryable failures persisted through {attempts} location(s): {source}")]
    RetriesExhausted {
        attempts: usize,
        #[source]
        source: Box<ProvisionError>,
    },

    #[error("Verification failed: {0}")]
    Verification(#[from] VerificationFailure),

    #[error("error running setup for the tests: {0}")]
    TestSetup(#[source] Box<ProvisionError>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProvisionError {
    /// Failure text reported by the underlying tool, looking through wrapping
    /// errors. Command lines, project and cluster names are left out so they
    /// cannot influence retry classification.
    pub fn failure_message(&self) -> String {
        match self {
            ProvisionError::Tool(source) | ProvisionError::ClusterCreation { source, .. } => {
                source.failure_message()
            }
            ProvisionError::CreationFatal { source, .. }
            | ProvisionError::RetriesExhausted { source, .. }
            | ProvisionError::TestSetup(source) => source.failure_message(),
            ProvisionError::Verification(failure) => failure
                .output
                .clone()
                .unwrap_or_else(|| failure.message.clone()),
            other => other.to_string(),
        }
    }
}

impl From<config::ConfigError> for ProvisionError {
    fn from(err: config::ConfigError) -> Self {
        ProvisionError::Config(err.to_string())
    }
}

impl From<regex::Error> for ProvisionError {
    fn from(err: regex::Error) -> Self {
        ProvisionError::Validation(format!("invalid retryable error pattern: {}", err))
    }
}
