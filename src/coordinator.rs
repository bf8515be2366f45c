//! Retry state machine around the per-attempt fan-out.
//!
//! ```text
//! Attempting(0) ──ok──────────────────────────────▶ Succeeded
//!      │ err, not retryable ──────────────────────▶ FailedFatal
//!      │ err, retryable, no location left ─────────▶ FailedRetryableExhausted
//!      └ err, retryable ── rollback(attempt 0) ──▶ Attempting(1) ...
//! ```
//!
//! Each attempt gets a fresh cancellation token and ledger. Rollback of a
//! failed attempt runs as a tracked background task, except when the next
//! attempt lands in the same region: the subnets it would recreate are the
//! ones being deleted, so that rollback is awaited first.

use crate::cluster::{ClusterOperation, ClusterSettings};
use crate::error::ProvisionError;
use crate::exec::CommandRunner;
use crate::fanout::{AttemptLedger, AttemptResources, FanOutExecutor};
use crate::infra::Infrastructure;
use crate::retry::{ErrorClassifier, Location, LocationCandidates};
use crate::topology::Topology;
use futures::future::join_all;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Coordinator states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Attempting(usize),
    Succeeded,
    FailedFatal,
    FailedRetryableExhausted,
}

impl AttemptState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AttemptState::Attempting(_))
    }
}

/// Transition out of `Attempting(attempt)` given the attempt's outcome.
pub fn next_state(
    attempt: usize,
    total_attempts: usize,
    outcome: &Result<(), ProvisionError>,
    classifier: &ErrorClassifier,
) -> AttemptState {
    match outcome {
        Ok(()) => AttemptState::Succeeded,
        Err(err) if !classifier.is_retryable_error(err) => AttemptState::FailedFatal,
        Err(_) if attempt + 1 < total_attempts => AttemptState::Attempting(attempt + 1),
        Err(_) => AttemptState::FailedRetryableExhausted,
    }
}

/// Successful coordinator run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned {
    /// Location every cluster was created in.
    pub location: Location,
    /// Attempts made, including the successful one.
    pub attempts: usize,
}

/// What one rollback did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackReport {
    pub attempt: usize,
    pub resources: AttemptResources,
    pub failures: Vec<String>,
}

/// Tracks rollbacks so they can be awaited before the process exits and inspected in tests.
#[derive(Debug, Default)]
pub struct RollbackTracker {
    pending: Mutex<Vec<JoinHandle<RollbackReport>>>,
    finished: Mutex<Vec<RollbackReport>>,
}

impl RollbackTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn track(&self, handle: JoinHandle<RollbackReport>) {
        self.pending.lock().push(handle);
    }

    fn finish(&self, report: RollbackReport) {
        self.finished.lock().push(report);
    }

    /// Rollbacks started so far, finished or not.
    pub fn started(&self) -> usize {
        self.pending.lock().len() + self.finished.lock().len()
    }

    /// Wait for every started rollback and return all reports, by attempt.
    pub async fn wait_all(&self) -> Vec<RollbackReport> {
        let pending: Vec<_> = self.pending.lock().drain(..).collect();
        for handle in pending {
            match handle.await {
                Ok(report) => self.finish(report),
                Err(e) => error!(error = %e, "Rollback task panicked"),
            }
        }
        let mut reports = self.finished.lock().clone();
        reports.sort_by_key(|r| r.attempt);
        reports
    }
}

/// Runs attempts over the location candidates until success, a fatal error,
/// or no locations remain.
pub struct RetryCoordinator {
    runner: Arc<dyn CommandRunner>,
    infra: Arc<dyn Infrastructure>,
    settings: Arc<ClusterSettings>,
    classifier: ErrorClassifier,
    candidates: LocationCandidates,
    executor: FanOutExecutor,
    rollbacks: Arc<RollbackTracker>,
}

impl RetryCoordinator {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        infra: Arc<dyn Infrastructure>,
        settings: Arc<ClusterSettings>,
        classifier: ErrorClassifier,
        candidates: LocationCandidates,
        executor: FanOutExecutor,
    ) -> Self {
        Self {
            runner,
            infra,
            settings,
            classifier,
            candidates,
            executor,
            rollbacks: Arc::new(RollbackTracker::new()),
        }
    }

    pub fn rollbacks(&self) -> Arc<RollbackTracker> {
        Arc::clone(&self.rollbacks)
    }

    fn location(&self, attempt: usize) -> Result<Location, ProvisionError> {
        self.candidates.select(attempt).ok_or_else(|| {
            ProvisionError::Validation("at least one region or zone is required".to_string())
        })
    }

    pub async fn run(&self, topology: &Topology) -> Result<Provisioned, ProvisionError> {
        let total_attempts = self.candidates.total_attempts();
        let mut state = AttemptState::Attempting(0);
        let mut location = self.location(0)?;

        loop {
            let attempt = match state {
                AttemptState::Attempting(attempt) => attempt,
                _ => unreachable!("terminal states return from the loop"),
            };

            info!(attempt, total_attempts, location = %location, "Starting cluster creation attempt");
            let (outcome, resources) = self.attempt(topology, &location).await;
            state = next_state(attempt, total_attempts, &outcome, &self.classifier);

            match (state, outcome) {
                (AttemptState::Succeeded, _) => {
                    info!(attempt, location = %location, "All clusters created");
                    return Ok(Provisioned {
                        location,
                        attempts: attempt + 1,
                    });
                }
                (AttemptState::FailedFatal, Err(err)) => {
                    error!(attempt, error = %err, "Cluster creation failed with a non-retryable error");
                    return Err(ProvisionError::CreationFatal {
                        attempt,
                        location: location.to_string(),
                        source: Box::new(err),
                    });
                }
                (AttemptState::FailedRetryableExhausted, Err(err)) => {
                    error!(attempt, error = %err, "Retryable failure with no locations left");
                    return Err(ProvisionError::RetriesExhausted {
                        attempts: attempt + 1,
                        source: Box::new(err),
                    });
                }
                (AttemptState::Attempting(next), Err(err)) => {
                    let next_location = self.location(next)?;
                    warn!(
                        attempt,
                        error = %err,
                        next_location = %next_location,
                        "Retryable cluster creation failure, rolling back and retrying"
                    );
                    let reuses_region = next_location.region == location.region;
                    self.rollback(attempt, resources, reuses_region).await;
                    location = next_location;
                }
                (state, Ok(())) => unreachable!("successful attempt mapped to {:?}", state),
            }
        }
    }

    /// One attempt with its own cancellation scope and ledger.
    async fn attempt(
        &self,
        topology: &Topology,
        location: &Location,
    ) -> (Result<(), ProvisionError>, AttemptResources) {
        let cancel = CancellationToken::new();
        let ledger = AttemptLedger::new();
        let outcome = async {
            self.infra
                .create_subnets(topology, &location.region, &ledger)
                .await?;
            let operations = ClusterOperation::for_topology(&self.settings, topology, location)?;
            self.executor
                .run(&operations, self.runner.as_ref(), &ledger, &cancel)
                .await
        }
        .await;
        (outcome, ledger.into_resources())
    }

    /// Delete what `attempt` created. Failures are logged, never returned.
    async fn rollback(&self, attempt: usize, resources: AttemptResources, wait: bool) {
        if resources.is_empty() {
            self.rollbacks.finish(RollbackReport {
                attempt,
                ..RollbackReport::default()
            });
            return;
        }
        let infra = Arc::clone(&self.infra);
        let handle = tokio::spawn(roll_back(infra, attempt, resources));
        if wait {
            info!(attempt, "Next attempt reuses the region, waiting for rollback");
            match handle.await {
                Ok(report) => self.rollbacks.finish(report),
                Err(e) => error!(attempt, error = %e, "Rollback task panicked"),
            }
        } else {
            self.rollbacks.track(handle);
        }
    }
}

/// Clusters first (they use the subnets), then subnets.
async fn roll_back(
    infra: Arc<dyn Infrastructure>,
    attempt: usize,
    resources: AttemptResources,
) -> RollbackReport {
    let mut failures = Vec::new();

    let deletions = resources.clusters.iter().map(|cluster| {
        let infra = Arc::clone(&infra);
        async move { (cluster, infra.delete_cluster(cluster).await) }
    });
    for (cluster, result) in join_all(deletions).await {
        match result {
            Ok(()) => info!(attempt, project = %cluster.project, cluster = %cluster.name, "Rolled back cluster"),
            Err(e) => {
                warn!(attempt, project = %cluster.project, cluster = %cluster.name, error = %e, "Failed to roll back cluster");
                failures.push(format!("cluster {}/{}: {}", cluster.project, cluster.name, e));
            }
        }
    }

    for subnet in &resources.subnets {
        if let Err(e) = infra.delete_subnet(subnet).await {
            warn!(attempt, subnet = %subnet.name, error = %e, "Failed to roll back subnet");
            failures.push(format!("subnet {}: {}", subnet.name, e));
        }
    }

    RollbackReport {
        attempt,
        resources,
        failures,
    }
}
