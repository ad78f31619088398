//! Rendering plan-builder values into execution plans and stamping
//! per-build properties.
//!
//! Registration renders once into a reusable template whose argv still
//! carries `${{ }}` placeholders; each triggered build materializes the
//! template with that build's properties.

use std::path::{Path, PathBuf};

use crucible_core::Result;
use crucible_core::builder::BuildProperties;
use crucible_core::plan::{ExecutionPlan, PlanStep, RawAction};

use crate::passes::PlanBuilder;

/// Directory on the worker that relative workdirs resolve against.
pub const BUILD_ROOT: &str = "build";

/// Render the assembled plan-builder into the execution-plan template.
/// In-container actions gain their container-run argv prefix here.
pub fn render(plan: &PlanBuilder) -> Result<ExecutionPlan> {
    Ok(ExecutionPlan {
        prepare: render_actions(&plan.prepare)?,
        active: render_actions(&plan.active)?,
        cleanup: render_actions(&plan.cleanup)?,
    })
}

/// Stamp a template with one triggered build's properties, resolving
/// placeholders in argv and env values.
pub fn materialize(template: &ExecutionPlan, properties: &BuildProperties) -> ExecutionPlan {
    ExecutionPlan {
        prepare: stamp_steps(&template.prepare, properties),
        active: stamp_steps(&template.active, properties),
        cleanup: stamp_steps(&template.cleanup, properties),
    }
}

fn render_actions(actions: &[RawAction]) -> Result<Vec<PlanStep>> {
    actions.iter().map(render_action).collect()
}

fn render_action(action: &RawAction) -> Result<PlanStep> {
    match action {
        RawAction::Plain(plain) => Ok(PlanStep {
            name: plain.name().to_string(),
            argv: plain.as_argv(),
            workdir: worker_workdir(plain.workdir()),
            options: plain.options().clone(),
            env: plain.env().to_vec(),
            interrupt_signal: plain.interrupt_signal().to_string(),
        }),
        RawAction::InContainer(ica) => Ok(PlanStep {
            name: ica.action.name().to_string(),
            argv: ica.render_argv()?,
            // The container-run command itself starts from the build root;
            // the in-container workdir is baked into the argv.
            workdir: PathBuf::from(BUILD_ROOT),
            options: ica.action.options().clone(),
            env: Vec::new(),
            interrupt_signal: ica.action.interrupt_signal().to_string(),
        }),
    }
}

fn worker_workdir(workdir: &Path) -> PathBuf {
    if workdir.is_absolute() {
        workdir.to_path_buf()
    } else if workdir == Path::new(".") {
        PathBuf::from(BUILD_ROOT)
    } else {
        Path::new(BUILD_ROOT).join(workdir)
    }
}

fn stamp_steps(steps: &[PlanStep], properties: &BuildProperties) -> Vec<PlanStep> {
    steps
        .iter()
        .map(|step| {
            let mut stamped = step.clone();
            stamped.argv = step
                .argv
                .iter()
                .map(|arg| properties.interpolate(arg))
                .collect();
            stamped.env = step
                .env
                .iter()
                .map(|(k, v)| (k.clone(), properties.interpolate(v)))
                .collect();
            stamped
        })
        .collect()
}
