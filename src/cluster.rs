//! Cluster creation: argument assembly and the single-cluster operation.

pub mod args;
pub mod operation;

pub use args::{ClusterSettings, PrivateClusterAccess};
pub use operation::ClusterOperation;
