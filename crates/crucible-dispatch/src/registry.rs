//! Builder registration: fatal configuration checks, identity stamping,
//! and production of the plan template plus dispatch configuration.

use crucible_assembler::{assemble, render};
use crucible_core::builder::Builder;
use crucible_core::plan::{ExecutionPlan, RawAction};
use crucible_core::worker::WorkerPool;
use crucible_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Which runtime environment the master is serving. Dev masters prefix
/// container identities so they never collide with production state on a
/// shared host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeEnv {
    Prod,
    Dev,
}

/// Everything the dispatcher needs to know about a registered builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    pub name: String,
    pub job_weight: u32,
    pub eligible_workers: Vec<String>,
    pub tags: Vec<String>,
}

/// Register a builder: validate its configuration, stamp the per-builder
/// container identity, assemble the reusable plan template, and record the
/// assignment on each eligible worker.
///
/// All failures here are configuration errors surfaced before the
/// coordinator accepts traffic; dispatch never sees a half-registered
/// builder.
pub fn register(
    mut builder: Builder,
    pool: &WorkerPool,
    runtime_env: RuntimeEnv,
) -> Result<(ExecutionPlan, DispatchConfig)> {
    if builder.job_weight < 1 {
        return Err(Error::InvalidJobWeight {
            builder: builder.name,
            weight: builder.job_weight,
        });
    }
    if builder.eligible_workers.is_empty() {
        return Err(Error::NoEligibleWorkers {
            builder: builder.name,
        });
    }

    let mut workers = Vec::with_capacity(builder.eligible_workers.len());
    for name in &builder.eligible_workers {
        let worker = pool
            .get(name)
            .ok_or_else(|| Error::UnknownWorker(name.clone()))?;
        workers.push(worker);
    }
    if !workers
        .iter()
        .any(|w| builder.job_weight <= w.total_capacity())
    {
        return Err(Error::WeightExceedsCapacity {
            builder: builder.name,
            weight: builder.job_weight,
        });
    }

    stamp_identity(&mut builder, runtime_env);

    let template = render(&assemble(&builder.sequences)?)?;

    // Observability only; the live busy map is what admission reads.
    for worker in &workers {
        worker.record_assignment(builder.job_weight);
    }

    info!(
        builder = %builder.name,
        weight = builder.job_weight,
        workers = builder.eligible_workers.len(),
        steps = template.len(),
        "registered builder"
    );

    let config = DispatchConfig {
        name: builder.name,
        job_weight: builder.job_weight,
        eligible_workers: builder.eligible_workers,
        tags: builder.tags,
    };
    Ok((template, config))
}

/// The container identity is the builder name, so one builder-slot maps to
/// exactly one container/volume/tag on a worker, stable across the plan.
fn stamp_identity(builder: &mut Builder, runtime_env: RuntimeEnv) {
    let identity = match runtime_env {
        RuntimeEnv::Prod => builder.name.clone(),
        RuntimeEnv::Dev => format!("dev_{}", builder.name),
    };
    let stamp = |actions: &mut [RawAction]| {
        for action in actions {
            if let RawAction::InContainer(ica) = action {
                ica.environment.set_identity(identity.clone());
            }
        }
    };
    for sequence in &mut builder.sequences {
        stamp(sequence.actions_mut());
        stamp(sequence.cleanup_mut());
    }
}
