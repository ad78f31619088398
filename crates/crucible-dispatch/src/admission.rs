//! The per-dispatch admission test.

use crucible_core::request::BuildRequest;
use crucible_core::worker::Worker;
use tracing::debug;

use crate::registry::DispatchConfig;

/// Whether `builder` may start on `worker` right now.
///
/// The static weight-vs-capacity reject is load-independent; the live check
/// reads the worker's busy map at decision time. This is a greedy
/// per-attempt test, not a transactional reservation: two checks evaluated
/// near-simultaneously can both pass, and the resulting transient
/// over-subscription corrects on the next scheduling pass.
pub fn can_start_build(
    builder: &DispatchConfig,
    worker: &Worker,
    _request: &BuildRequest,
) -> bool {
    let weight = builder.job_weight;
    let capacity = worker.total_capacity();

    if weight > capacity {
        return false;
    }

    let reserved = worker.reserved();
    let admitted = weight <= capacity - reserved;
    debug!(
        builder = %builder.name,
        worker = %worker.name,
        weight,
        capacity,
        reserved,
        admitted,
        "admission check"
    );
    admitted
}
