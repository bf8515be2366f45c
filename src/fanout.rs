//! Concurrent dispatch of one attempt's cluster operations.
//!
//! All operations of an attempt share one cancellation token. The first
//! failure cancels it; the executor still drains every operation to a terminal
//! state before returning, so nothing is still mutating the attempt's ledger
//! once the caller looks at it.

use crate::cluster::ClusterOperation;
use crate::error::ProvisionError;
use crate::exec::CommandRunner;
use crate::retry::Location;
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A cluster whose creation was launched during an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedCluster {
    pub project: String,
    pub name: String,
    pub location: Location,
}

/// A subnet created for an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedSubnet {
    pub project: String,
    pub name: String,
    pub region: String,
}

/// Resources created during one attempt, appended to concurrently.
#[derive(Debug, Default)]
pub struct AttemptLedger {
    clusters: Mutex<Vec<CreatedCluster>>,
    subnets: Mutex<Vec<CreatedSubnet>>,
}

/// Immutable view of a ledger once its attempt has finished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttemptResources {
    pub clusters: Vec<CreatedCluster>,
    pub subnets: Vec<CreatedSubnet>,
}

impl AttemptResources {
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty() && self.subnets.is_empty()
    }
}

impl AttemptLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cluster(&self, cluster: CreatedCluster) {
        self.clusters.lock().push(cluster);
    }

    pub fn record_subnet(&self, subnet: CreatedSubnet) {
        self.subnets.lock().push(subnet);
    }

    /// Take everything recorded so far.
    pub fn into_resources(self) -> AttemptResources {
        AttemptResources {
            clusters: self.clusters.into_inner(),
            subnets: self.subnets.into_inner(),
        }
    }
}

/// Runs a batch of cluster operations concurrently.
#[derive(Debug, Clone, Default)]
pub struct FanOutExecutor {
    max_in_flight: Option<usize>,
}

impl FanOutExecutor {
    /// Unbounded fan-out: every operation starts immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// At most `max_in_flight` creations run at once; `None` is unbounded.
    pub fn with_max_in_flight(max_in_flight: Option<usize>) -> Self {
        Self {
            max_in_flight: max_in_flight.filter(|n| *n > 0),
        }
    }

    pub fn max_in_flight(&self) -> Option<usize> {
        self.max_in_flight
    }

    /// Run every operation; return the first error, if any.
    ///
    /// A cluster is recorded in `ledger` when its creation is launched, since
    /// a failed or interrupted creation may leave a partial cluster behind.
    /// Operations that see `cancel` already triggered are not launched.
    pub async fn run(
        &self,
        operations: &[ClusterOperation],
        runner: &dyn CommandRunner,
        ledger: &AttemptLedger,
        cancel: &CancellationToken,
    ) -> Result<(), ProvisionError> {
        let permits = self.max_in_flight.map(|n| Arc::new(Semaphore::new(n)));
        let mut in_flight = FuturesUnordered::new();

        for operation in operations {
            let permits = permits.clone();
            in_flight.push(async move {
                let _permit = match permits {
                    Some(ref semaphore) => tokio::select! {
                        permit = semaphore.acquire() => permit.ok(),
                        _ = cancel.cancelled() => None,
                    },
                    None => None,
                };
                if cancel.is_cancelled() {
                    debug!(cluster = %operation.label(), "Skipping launch, attempt cancelled");
                    return (operation, Err(cancelled_before_launch(operation)));
                }
                ledger.record_cluster(CreatedCluster {
                    project: operation.project.clone(),
                    name: operation.cluster.name.clone(),
                    location: operation.location.clone(),
                });
                let outcome = operation.execute(runner, cancel).await;
                (operation, outcome)
            });
        }

        let mut first_error = None;
        while let Some((operation, outcome)) = in_flight.next().await {
            if let Err(err) = outcome {
                if first_error.is_none() {
                    warn!(cluster = %operation.label(), error = %err, "Cluster creation failed, cancelling siblings");
                    cancel.cancel();
                    first_error = Some(err);
                } else {
                    debug!(cluster = %operation.label(), error = %err, "Sibling finished after cancellation");
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn cancelled_before_launch(operation: &ClusterOperation) -> ProvisionError {
    ProvisionError::ClusterCreation {
        project: operation.project.clone(),
        cluster: operation.cluster.name.clone(),
        source: crate::error::ToolError::Cancelled {
            command: format!("create {}", operation.label()),
        },
    }
}
