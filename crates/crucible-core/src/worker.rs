//! Workers and the architecture-keyed worker pool.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Os {
    Linux,
    Macos,
    Windows,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arch {
    Amd64,
    Aarch64,
    Ppc64le,
    S390x,
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Arch::Amd64 => "amd64",
            Arch::Aarch64 => "aarch64",
            Arch::Ppc64le => "ppc64le",
            Arch::S390x => "s390x",
        };
        write!(f, "{}", s)
    }
}

/// A connected build worker.
///
/// Two counters live here with different meanings: `running` is the live
/// map of job weights claimed by builders currently executing (the figure
/// admission control reads), while `assigned` is the config-time sum of all
/// registered builders' weights, kept for observability only and free to
/// exceed capacity.
#[derive(Debug)]
pub struct Worker {
    pub name: String,
    pub arch: Arch,
    pub os: Os,
    total_capacity: u32,
    running: Mutex<HashMap<String, u32>>,
    assigned: AtomicU64,
}

impl Worker {
    pub fn new(name: impl Into<String>, arch: Arch, os: Os, total_capacity: u32) -> Self {
        Self {
            name: name.into(),
            arch,
            os,
            total_capacity,
            running: Mutex::new(HashMap::new()),
            assigned: AtomicU64::new(0),
        }
    }

    pub fn total_capacity(&self) -> u32 {
        self.total_capacity
    }

    /// Sum of job weights claimed by builders currently running here,
    /// read live at admission-decision time.
    pub fn reserved(&self) -> u32 {
        self.running.lock().values().sum()
    }

    pub fn is_busy(&self) -> bool {
        !self.running.lock().is_empty()
    }

    /// Record that `builder` started running here with `weight` claimed.
    pub fn claim(&self, builder: &str, weight: u32) {
        self.running.lock().insert(builder.to_string(), weight);
    }

    /// Release the claim `builder` holds, if any.
    pub fn release(&self, builder: &str) {
        self.running.lock().remove(builder);
    }

    /// Snapshot of the live {builder -> claimed weight} map.
    pub fn running_claims(&self) -> HashMap<String, u32> {
        self.running.lock().clone()
    }

    /// Bump the config-time assigned total. Observability only; never read
    /// by admission control.
    pub fn record_assignment(&self, weight: u32) {
        self.assigned.fetch_add(u64::from(weight), Ordering::Relaxed);
    }

    pub fn assigned_total(&self) -> u64 {
        self.assigned.load(Ordering::Relaxed)
    }
}

/// Registry of workers keyed by architecture.
#[derive(Debug, Default)]
pub struct WorkerPool {
    workers: HashMap<Arch, Vec<Arc<Worker>>>,
}

impl WorkerPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, worker: Arc<Worker>) {
        self.workers.entry(worker.arch).or_default().push(worker);
    }

    /// Eligible workers for an architecture. An empty result is a fatal
    /// configuration error at builder-registration time, not a runtime
    /// condition.
    pub fn workers_for_arch(&self, arch: Arch) -> Result<Vec<Arc<Worker>>> {
        self.workers_for_arch_where(arch, |_| true)
    }

    /// Like [`workers_for_arch`](Self::workers_for_arch), restricted by a
    /// filter over the worker.
    pub fn workers_for_arch_where(
        &self,
        arch: Arch,
        filter: impl Fn(&Worker) -> bool,
    ) -> Result<Vec<Arc<Worker>>> {
        let result: Vec<Arc<Worker>> = self
            .workers
            .get(&arch)
            .into_iter()
            .flatten()
            .filter(|w| filter(w))
            .cloned()
            .collect();
        if result.is_empty() {
            return Err(Error::NoWorkersForArch(arch.to_string()));
        }
        Ok(result)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Worker>> {
        self.workers
            .values()
            .flatten()
            .find(|w| w.name == name)
            .cloned()
    }

    pub fn all(&self) -> impl Iterator<Item = &Arc<Worker>> {
        self.workers.values().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn worker(name: &str, arch: Arch, capacity: u32) -> Arc<Worker> {
        Arc::new(Worker::new(name, arch, Os::Linux, capacity))
    }

    #[test]
    fn test_reserved_tracks_claims() {
        let w = worker("hz-bbw1-docker", Arch::Amd64, 10);
        assert_eq!(w.reserved(), 0);
        assert!(!w.is_busy());
        w.claim("amd64-debian-12", 6);
        w.claim("amd64-fedora-40", 3);
        assert_eq!(w.reserved(), 9);
        assert!(w.is_busy());
        assert_eq!(w.running_claims().get("amd64-fedora-40"), Some(&3));
        w.release("amd64-debian-12");
        assert_eq!(w.reserved(), 3);
    }

    #[test]
    fn test_assigned_may_exceed_capacity() {
        let w = worker("hz-bbw1-docker", Arch::Amd64, 10);
        w.record_assignment(7);
        w.record_assignment(7);
        assert_eq!(w.assigned_total(), 14);
        // Assigned totals never feed admission math.
        assert_eq!(w.reserved(), 0);
    }

    #[test]
    fn test_pool_lookup_by_arch() {
        let mut pool = WorkerPool::new();
        pool.add(worker("hz-bbw1-docker", Arch::Amd64, 10));
        pool.add(worker("aarch64-bbw1-docker", Arch::Aarch64, 4));

        let amd = pool.workers_for_arch(Arch::Amd64).unwrap();
        assert_eq!(amd.len(), 1);
        assert_eq!(amd[0].name, "hz-bbw1-docker");
    }

    #[test]
    fn test_empty_lookup_is_fatal() {
        let pool = WorkerPool::new();
        assert!(matches!(
            pool.workers_for_arch(Arch::S390x),
            Err(Error::NoWorkersForArch(_))
        ));
    }

    #[test]
    fn test_filtered_lookup() {
        let mut pool = WorkerPool::new();
        pool.add(worker("hz-bbw1-docker", Arch::Amd64, 10));
        pool.add(worker("hz-bbw2-docker", Arch::Amd64, 2));

        let big = pool
            .workers_for_arch_where(Arch::Amd64, |w| w.total_capacity() >= 8)
            .unwrap();
        assert_eq!(big.len(), 1);
        assert!(
            pool.workers_for_arch_where(Arch::Amd64, |w| w.total_capacity() > 100)
                .is_err()
        );
    }
}
