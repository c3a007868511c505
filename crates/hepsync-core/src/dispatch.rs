//! Fan-out execution of synchronization units
//!
//! One unit of work per identifier, each in its own failure domain. Async
//! mode spawns a task per unit with bounded concurrency; sync mode runs
//! units sequentially in the caller's context for deterministic tests and
//! small batches. No retry or backoff lives here: the execution substrate
//! owns redelivery, and every unit is safe to re-submit.

use futures::stream::{self, StreamExt};
use hepsync_common::ids::InspireId;
use std::sync::Arc;
use tracing::{error, info};

use crate::sync::synchronizer::{RecordSynchronizer, SyncError, SyncOptions, UnitOutcome};

/// How units of a batch are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Sequential, in the caller's execution context
    Sync,
    /// One spawned task per identifier, bounded concurrency
    Async,
}

/// Result of one unit of work.
#[derive(Debug)]
pub struct UnitReport {
    pub inspire_id: InspireId,
    pub result: Result<UnitOutcome, SyncError>,
}

/// Per-identifier outcomes of one batch, in submission order.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub units: Vec<UnitReport>,
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.units.iter().filter(|u| u.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.units.len() - self.succeeded()
    }

    /// True when every identifier synchronized successfully.
    pub fn is_clean(&self) -> bool {
        self.failed() == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &UnitReport> {
        self.units.iter().filter(|u| u.result.is_err())
    }
}

/// Schedules one unit of work per identifier.
pub struct JobDispatcher {
    mode: DispatchMode,
    concurrency: usize,
}

impl JobDispatcher {
    pub fn new(mode: DispatchMode, concurrency: usize) -> Self {
        Self {
            mode,
            concurrency: concurrency.max(1),
        }
    }

    /// Run one unit per identifier and collect per-unit outcomes.
    pub async fn submit(
        &self,
        synchronizer: Arc<RecordSynchronizer>,
        ids: Vec<InspireId>,
        opts: SyncOptions,
    ) -> BatchSummary {
        let total = ids.len();
        info!("Dispatching {} synchronization units ({:?})", total, self.mode);

        let summary = match self.mode {
            DispatchMode::Sync => self.run_sequential(synchronizer, ids, opts).await,
            DispatchMode::Async => self.run_fanned_out(synchronizer, ids, opts).await,
        };

        for unit in summary.failures() {
            if let Err(ref e) = unit.result {
                error!(inspire_id = %unit.inspire_id, "Synchronization unit failed: {}", e);
            }
        }
        info!(
            "Batch completed: {} succeeded, {} failed",
            summary.succeeded(),
            summary.failed()
        );
        summary
    }

    async fn run_sequential(
        &self,
        synchronizer: Arc<RecordSynchronizer>,
        ids: Vec<InspireId>,
        opts: SyncOptions,
    ) -> BatchSummary {
        let mut units = Vec::with_capacity(ids.len());
        for id in ids {
            let result = synchronizer.sync_record(&id, opts).await;
            units.push(UnitReport {
                inspire_id: id,
                result,
            });
        }
        BatchSummary { units }
    }

    async fn run_fanned_out(
        &self,
        synchronizer: Arc<RecordSynchronizer>,
        ids: Vec<InspireId>,
        opts: SyncOptions,
    ) -> BatchSummary {
        let mut indexed: Vec<(usize, UnitReport)> = stream::iter(ids.into_iter().enumerate())
            .map(|(index, id)| {
                let synchronizer = Arc::clone(&synchronizer);
                async move {
                    let task_id = id.clone();
                    let handle = tokio::spawn(async move {
                        synchronizer.sync_record(&task_id, opts).await
                    });
                    // A panicked or cancelled task fails only its own unit.
                    let result = match handle.await {
                        Ok(result) => result,
                        Err(e) => Err(SyncError::Aborted(e.to_string())),
                    };
                    (
                        index,
                        UnitReport {
                            inspire_id: id,
                            result,
                        },
                    )
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        indexed.sort_by_key(|(index, _)| *index);
        BatchSummary {
            units: indexed.into_iter().map(|(_, unit)| unit).collect(),
        }
    }
}
