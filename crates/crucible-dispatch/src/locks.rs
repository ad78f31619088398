//! Host-scoped resource locks layered on top of admission control.
//!
//! Several workers can share one physical host; a fixed table of counting
//! semaphores, each bound to a worker-name prefix, caps concurrency per
//! host independently of job-weight math.

use std::sync::Arc;

use crucible_core::branch::BranchPolicy;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// A counting semaphore guarding one shared physical host.
#[derive(Debug)]
pub struct HostLock {
    pub name: String,
    /// Worker-name fragment selecting this lock, e.g. `hz-bbw1-docker`.
    pub prefix: String,
    max_count: usize,
    semaphore: Arc<Semaphore>,
}

impl HostLock {
    pub fn new(name: impl Into<String>, prefix: impl Into<String>, max_count: usize) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
            max_count,
            semaphore: Arc::new(Semaphore::new(max_count)),
        }
    }

    pub fn max_count(&self) -> usize {
        self.max_count
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Claim one slot without waiting; contention is not an error, the
    /// dispatcher just tries again on a later pass.
    pub fn try_acquire(&self) -> Option<OwnedSemaphorePermit> {
        self.semaphore.clone().try_acquire_owned().ok()
    }
}

/// The fixed, config-time table of host locks. Constructed once at startup
/// and passed by reference into the dispatcher; read-only after load.
#[derive(Debug, Default)]
pub struct LockTable {
    locks: Vec<Arc<HostLock>>,
}

impl LockTable {
    pub fn new(locks: Vec<HostLock>) -> Self {
        Self {
            locks: locks.into_iter().map(Arc::new).collect(),
        }
    }

    /// Locks a worker must hold, by name-prefix match.
    pub fn locks_for(&self, worker_name: &str) -> Vec<Arc<HostLock>> {
        self.locks
            .iter()
            .filter(|lock| worker_name.contains(&lock.prefix))
            .cloned()
            .collect()
    }
}

/// Builder classes that bypass host locks entirely.
#[derive(Debug, Clone, Default)]
pub struct LockExemptions {
    /// Builders that only report status.
    pub status_builders: Vec<String>,
    pub install_builders: Vec<String>,
    pub upgrade_builders: Vec<String>,
    /// Autobake builders; exempt only when dispatched on a release branch.
    pub autobake_builders: Vec<String>,
}

impl LockExemptions {
    pub fn is_exempt(&self, builder: &str, branch: &str, policy: &BranchPolicy) -> bool {
        let named = |list: &[String]| list.iter().any(|name| name == builder);
        if named(&self.status_builders)
            || named(&self.install_builders)
            || named(&self.upgrade_builders)
        {
            return true;
        }
        if named(&self.autobake_builders) && policy.is_release(branch) {
            debug!(builder, branch, "autobake release build bypasses host locks");
            return true;
        }
        false
    }
}
