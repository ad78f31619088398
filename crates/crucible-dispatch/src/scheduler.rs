//! The dispatcher: one scheduling pass gluing priority selection,
//! admission control, and the resource-lock overlay.

use std::sync::Arc;

use crucible_core::branch::BranchPolicy;
use crucible_core::request::BuildRequest;
use crucible_core::worker::{Worker, WorkerPool};
use tokio::sync::OwnedSemaphorePermit;
use tracing::{debug, info};

use crate::admission::can_start_build;
use crate::locks::{LockExemptions, LockTable};
use crate::priority::next_build;
use crate::registry::DispatchConfig;

/// One successful dispatch decision. Holds the worker claim and any host
/// lock permits for the lifetime of the build; completing (or dropping
/// after a failure path) releases the permits, completing releases the
/// claim.
#[derive(Debug)]
pub struct Dispatch {
    pub builder: String,
    pub request: BuildRequest,
    pub worker: Arc<Worker>,
    _permits: Vec<OwnedSemaphorePermit>,
}

/// Scheduling facade constructed once at startup. The pool, lock table,
/// and policies are read-only after load; only worker busy maps and
/// semaphore counts mutate, under their own synchronization.
pub struct Dispatcher {
    pool: Arc<WorkerPool>,
    locks: LockTable,
    exemptions: LockExemptions,
    policy: BranchPolicy,
}

impl Dispatcher {
    pub fn new(
        pool: Arc<WorkerPool>,
        locks: LockTable,
        exemptions: LockExemptions,
        policy: BranchPolicy,
    ) -> Self {
        Self {
            pool,
            locks,
            exemptions,
            policy,
        }
    }

    pub fn policy(&self) -> &BranchPolicy {
        &self.policy
    }

    /// One dispatch attempt for `builder`: select the highest-priority
    /// pending request, then find the first eligible worker that admits the
    /// weight and whose host locks are free. On success the chosen request
    /// is removed from `pending` and the claim is recorded; on contention
    /// nothing changes and the caller simply retries on a later pass.
    pub fn try_dispatch(
        &self,
        builder: &DispatchConfig,
        pending: &mut Vec<BuildRequest>,
    ) -> Option<Dispatch> {
        let request = next_build(builder, &self.policy, pending)?.clone();

        for worker_name in &builder.eligible_workers {
            let Some(worker) = self.pool.get(worker_name) else {
                continue;
            };
            if !can_start_build(builder, &worker, &request) {
                continue;
            }
            let Some(permits) = self.acquire_locks(builder, worker_name, &request) else {
                debug!(
                    builder = %builder.name,
                    worker = %worker_name,
                    "host locks contended, requeueing"
                );
                continue;
            };

            worker.claim(&builder.name, builder.job_weight);
            pending.retain(|r| r.id != request.id);
            info!(
                builder = %builder.name,
                worker = %worker.name,
                branch = %request.branch,
                "dispatched build"
            );
            return Some(Dispatch {
                builder: builder.name.clone(),
                request,
                worker,
                _permits: permits,
            });
        }
        None
    }

    /// Release the worker claim a dispatch holds. Lock permits drop with
    /// the dispatch value itself.
    pub fn complete(&self, dispatch: Dispatch) {
        dispatch.worker.release(&dispatch.builder);
        debug!(
            builder = %dispatch.builder,
            worker = %dispatch.worker.name,
            "released dispatch claim"
        );
    }

    /// All-or-nothing acquisition of the host locks a worker requires.
    /// Partially acquired permits drop on failure, releasing them.
    fn acquire_locks(
        &self,
        builder: &DispatchConfig,
        worker_name: &str,
        request: &BuildRequest,
    ) -> Option<Vec<OwnedSemaphorePermit>> {
        if self
            .exemptions
            .is_exempt(&builder.name, &request.branch, &self.policy)
        {
            return Some(Vec::new());
        }

        let required = self.locks.locks_for(worker_name);
        let mut permits = Vec::with_capacity(required.len());
        for lock in required {
            match lock.try_acquire() {
                Some(permit) => permits.push(permit),
                None => return None,
            }
        }
        Some(permits)
    }
}
