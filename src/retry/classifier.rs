//! Retryable-error classification.

use crate::error::ProvisionError;
use regex::Regex;

/// Ordered, immutable set of patterns marking a failure as retryable.
///
/// The default set is empty, so every failure is fatal unless patterns are
/// configured explicitly.
#[derive(Debug, Clone, Default)]
pub struct ErrorClassifier {
    patterns: Vec<Regex>,
}

impl ErrorClassifier {
    /// Compile `patterns` in order. Any invalid pattern is a validation error.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ProvisionError> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn patterns(&self) -> &[Regex] {
        &self.patterns
    }

    /// True iff some pattern matches anywhere in `message`.
    pub fn is_retryable(&self, message: &str) -> bool {
        classify(message, &self.patterns)
    }

    /// Classify by the tool's failure text only; the command line is not part of it.
    pub fn is_retryable_error(&self, error: &ProvisionError) -> bool {
        self.is_retryable(&error.failure_message())
    }
}

/// Pure classification over an explicit pattern slice.
pub fn classify(message: &str, patterns: &[Regex]) -> bool {
    patterns.iter().any(|p| p.is_match(message))
}
