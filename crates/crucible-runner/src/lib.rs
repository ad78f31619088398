//! Crucible Runner
//!
//! Drives one materialized execution plan against an [`ActionTransport`]:
//! one awaitable task per action, halt-on-failure aborts with always-run
//! survivors, and structured cancellation of the plan's task tree.
//!
//! [`ActionTransport`]: crucible_core::ports::ActionTransport

pub mod executor;

pub use executor::{PlanExecutor, PlanReport, StepReport, StepStatus};
