//! Retry policy inputs: which failures are retryable and where to retry.

pub mod classifier;
pub mod location;

pub use classifier::ErrorClassifier;
pub use location::{select, Location, LocationCandidates};
