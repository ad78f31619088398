//! Sequential plan execution over the action transport.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use crucible_core::builder::BuildProperties;
use crucible_core::plan::{ExecutionPlan, PlanStep};
use crucible_core::ports::ActionTransport;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Terminal state of one executed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Succeeded,
    Failed { exit_code: i32 },
    /// Not attempted: condition false, or the plan halted earlier.
    Skipped { reason: String },
    Cancelled,
}

/// What happened to one step of a plan.
#[derive(Debug, Clone)]
pub struct StepReport {
    pub name: String,
    pub status: StepStatus,
}

/// Outcome of one full plan execution.
#[derive(Debug, Clone)]
pub struct PlanReport {
    pub worker: String,
    pub steps: Vec<StepReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl PlanReport {
    /// A plan succeeds when nothing failed and nothing was cancelled.
    pub fn success(&self) -> bool {
        self.steps.iter().all(|step| {
            matches!(
                step.status,
                StepStatus::Succeeded | StepStatus::Skipped { .. }
            )
        })
    }
}

/// Executes one build's plan, strictly sequentially, on one worker slot.
///
/// The executor suspends only its own task while an action runs remotely;
/// concurrent builds each drive their own executor. A halt-on-failure
/// failure aborts the remaining actions, but always-run actions (the
/// cleanup bookends) still execute. Cancellation interrupts the in-flight
/// action with the action's configured signal and falls through to the
/// always-run tail.
pub struct PlanExecutor {
    transport: Arc<dyn ActionTransport>,
}

impl PlanExecutor {
    pub fn new(transport: Arc<dyn ActionTransport>) -> Self {
        Self { transport }
    }

    pub async fn run(
        &self,
        worker: &str,
        plan: &ExecutionPlan,
        properties: &BuildProperties,
        cancel: CancellationToken,
    ) -> PlanReport {
        let started_at = Utc::now();
        let mut steps = Vec::with_capacity(plan.len());
        let mut halted = false;

        for step in plan.steps() {
            let status = if (halted || cancel.is_cancelled()) && !step.options.always_run {
                StepStatus::Skipped {
                    reason: "plan halted".to_string(),
                }
            } else if !condition_holds(step, properties) {
                StepStatus::Skipped {
                    reason: "condition false".to_string(),
                }
            } else {
                self.execute_step(worker, step, &cancel).await
            };

            match &status {
                StepStatus::Failed { exit_code } => {
                    warn!(worker, step = %step.name, exit_code, "action failed");
                    if step.options.halt_on_failure {
                        halted = true;
                    }
                }
                StepStatus::Cancelled => {
                    halted = true;
                }
                _ => {}
            }

            steps.push(StepReport {
                name: step.name.clone(),
                status,
            });
        }

        let report = PlanReport {
            worker: worker.to_string(),
            steps,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            worker,
            success = report.success(),
            steps = report.steps.len(),
            "plan finished"
        );
        report
    }

    /// One awaitable task per action. Always-run steps are not raced
    /// against cancellation: cleanup must complete even mid-abort.
    async fn execute_step(
        &self,
        worker: &str,
        step: &PlanStep,
        cancel: &CancellationToken,
    ) -> StepStatus {
        if step.options.always_run {
            return self.await_outcome(worker, step).await;
        }

        tokio::select! {
            status = self.await_outcome(worker, step) => status,
            _ = cancel.cancelled() => {
                if let Err(err) = self
                    .transport
                    .interrupt(worker, step, &step.interrupt_signal)
                    .await
                {
                    warn!(worker, step = %step.name, error = %err, "interrupt failed");
                }
                StepStatus::Cancelled
            }
        }
    }

    async fn await_outcome(&self, worker: &str, step: &PlanStep) -> StepStatus {
        match self.transport.execute(worker, step).await {
            Ok(outcome) if outcome.success() => StepStatus::Succeeded,
            Ok(outcome) => StepStatus::Failed {
                exit_code: outcome.exit_code,
            },
            Err(err) => {
                warn!(worker, step = %step.name, error = %err, "transport error");
                StepStatus::Failed { exit_code: -1 }
            }
        }
    }
}

fn condition_holds(step: &PlanStep, properties: &BuildProperties) -> bool {
    match &step.options.condition {
        Some(condition) => condition(properties),
        None => true,
    }
}
