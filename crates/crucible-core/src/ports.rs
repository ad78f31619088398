//! Port traits toward external collaborators.
//!
//! The core never talks to a container runtime or a worker directly; it
//! orders registry operations inside plans and hands rendered steps to a
//! transport. These traits are the seams adapters implement.

use async_trait::async_trait;

use crate::Result;
use crate::plan::PlanStep;

/// Outcome of one remotely executed action.
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub exit_code: i32,
}

impl ActionOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Transport used by the coordinator to run one action on a worker.
///
/// `execute` resolves when the worker reports completion; only the
/// controlling task suspends, never the coordinator as a whole.
#[async_trait]
pub trait ActionTransport: Send + Sync {
    /// Run one rendered step on the named worker and wait for its outcome.
    async fn execute(&self, worker: &str, step: &PlanStep) -> Result<ActionOutcome>;

    /// Send `signal` to the step currently executing on the named worker.
    async fn interrupt(&self, worker: &str, step: &PlanStep, signal: &str) -> Result<()>;
}
