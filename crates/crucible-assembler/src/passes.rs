//! The ordered pass pipeline.
//!
//! Each pass is an independent, pure transformation over a
//! (prepare, active, cleanup) plan-builder value. Passes consume the value
//! and return a new one; only [`assemble`] fixes their order.

use crucible_core::Result;
use crucible_core::container::{ContainerEnvironment, is_relative_workdir};
use crucible_core::plan::{BuildSequence, RawAction};
use tracing::debug;

use crate::infra;

/// Plan under assembly: the three ordered action lists the passes transform.
#[derive(Debug, Clone, Default)]
pub struct PlanBuilder {
    pub prepare: Vec<RawAction>,
    pub active: Vec<RawAction>,
    pub cleanup: Vec<RawAction>,
}

/// One assembly pass.
pub type Pass = fn(PlanBuilder) -> Result<PlanBuilder>;

/// The fixed pass order. Worker cleanup first so every later prepare
/// insertion lands after the workspace purge; commit last so it sees the
/// tag-adjusted active list.
pub const PASSES: &[Pass] = &[
    worker_cleanup_pass,
    container_cleanup_pass,
    container_fetch_pass,
    container_workdir_pass,
    container_tag_pass,
    container_commit_pass,
];

/// Compose a builder's sequences and run the pass pipeline over them.
///
/// Active actions keep sequence order; declared sequence cleanups compose
/// LIFO, so the first sequence's cleanup runs last.
pub fn assemble(sequences: &[BuildSequence]) -> Result<PlanBuilder> {
    let mut plan = PlanBuilder::default();
    for sequence in sequences {
        plan.active.extend(sequence.actions().iter().cloned());
    }
    for sequence in sequences.iter().rev() {
        plan.cleanup.extend(sequence.cleanup().iter().cloned());
    }

    for pass in PASSES {
        plan = pass(plan)?;
    }
    debug!(
        prepare = plan.prepare.len(),
        active = plan.active.len(),
        cleanup = plan.cleanup.len(),
        "assembled plan"
    );
    Ok(plan)
}

/// Bookend the plan with workspace purges: previous run's leftovers before
/// anything else, the current run's workspace after everything else.
pub fn worker_cleanup_pass(mut plan: PlanBuilder) -> Result<PlanBuilder> {
    plan.prepare
        .insert(0, infra::worker_cleanup_action("previous-run").into());
    plan.cleanup
        .push(infra::worker_cleanup_action("current-run").into());
    Ok(plan)
}

/// One container-resource purge pair per plan, keyed to the first
/// in-container action's environment, however many environments follow.
/// The cleanup-side purge lands ahead of the worker purge so the plan still
/// ends on the workspace cleanup.
pub fn container_cleanup_pass(mut plan: PlanBuilder) -> Result<PlanBuilder> {
    let Some(ica) = plan.active.iter().find_map(RawAction::as_in_container) else {
        return Ok(plan);
    };

    let prepare = infra::container_cleanup_action("previous-run", &ica.environment)?;
    let cleanup = infra::container_cleanup_action("current-run", &ica.environment)?;

    plan.prepare.push(prepare.into());
    let at = plan.cleanup.len().saturating_sub(1);
    plan.cleanup.insert(at, cleanup.into());
    Ok(plan)
}

/// One image pull per consecutive-distinct environment transition in the
/// active list. Re-entering an environment seen earlier fetches again; only
/// transitions matter, not global novelty.
pub fn container_fetch_pass(mut plan: PlanBuilder) -> Result<PlanBuilder> {
    let mut current: Option<ContainerEnvironment> = None;
    for action in &plan.active {
        let Some(ica) = action.as_in_container() else {
            continue;
        };
        let transition = match &current {
            Some(env) => !env.same_image(&ica.environment),
            None => true,
        };
        if transition {
            plan.prepare
                .push(infra::fetch_image_action(&ica.environment).into());
            current = Some(ica.environment.clone());
        }
    }
    Ok(plan)
}

/// One workdir-creation step covering the set-union of relative workdirs
/// referenced by in-container actions, keyed to the first environment
/// encountered while collecting. Absolute workdirs need no creation.
pub fn container_workdir_pass(mut plan: PlanBuilder) -> Result<PlanBuilder> {
    let mut workdirs: Vec<String> = Vec::new();
    let mut keyed_env: Option<ContainerEnvironment> = None;

    for action in &plan.active {
        let Some(ica) = action.as_in_container() else {
            continue;
        };
        let workdir = ica.action.workdir();
        if !is_relative_workdir(workdir) {
            continue;
        }
        let workdir = workdir.display().to_string();
        if !workdirs.contains(&workdir) {
            workdirs.push(workdir);
            if keyed_env.is_none() {
                keyed_env = Some(ica.environment.clone());
            }
        }
    }

    if let Some(env) = keyed_env {
        plan.prepare
            .push(infra::create_workdirs_action(&env, workdirs)?.into());
    }
    Ok(plan)
}

/// Insert a runtime-tag refresh in place before each action whose
/// environment differs from the tracked one. Insertions shift later
/// positions; traversal continues relative to the post-insertion list.
pub fn container_tag_pass(mut plan: PlanBuilder) -> Result<PlanBuilder> {
    let mut current: Option<ContainerEnvironment> = None;
    let mut i = 0;
    while i < plan.active.len() {
        if let Some(ica) = plan.active[i].as_in_container() {
            let transition = match &current {
                Some(env) => !env.same_image(&ica.environment),
                None => true,
            };
            if transition {
                let tag = infra::tag_image_action(&ica.environment)?;
                current = Some(ica.environment.clone());
                plan.active.insert(i, tag.into());
                i += 1;
            }
        }
        i += 1;
    }
    Ok(plan)
}

/// Insert a checkpoint commit immediately after every checkpoint-flagged
/// action of the (tag-adjusted) active list.
pub fn container_commit_pass(mut plan: PlanBuilder) -> Result<PlanBuilder> {
    let mut i = 0;
    while i < plan.active.len() {
        if let Some(ica) = plan.active[i].as_in_container()
            && ica.checkpoint
        {
            let commit = infra::commit_action(ica)?;
            plan.active.insert(i + 1, commit.into());
            i += 1;
        }
        i += 1;
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crucible_core::action::{Action, ShellCommand};
    use crucible_core::container::InContainerAction;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn env(tag: &str) -> ContainerEnvironment {
        ContainerEnvironment::new("quay.io/org/", tag, "/home/builder")
            .with_identity("amd64-debian-12")
    }

    fn plain(name: &str) -> Action {
        Action::new(Arc::new(ShellCommand::new(name, ".", vec!["true".into()])))
    }

    fn contained(name: &str, workdir: &str, tag: &str) -> InContainerAction {
        InContainerAction::new(
            Action::new(Arc::new(ShellCommand::new(
                name,
                workdir,
                vec!["make".into()],
            ))),
            env(tag),
        )
    }

    fn sequence(actions: Vec<RawAction>) -> BuildSequence {
        let mut seq = BuildSequence::new("test");
        for action in actions {
            seq.push(action);
        }
        seq
    }

    fn names(actions: &[RawAction]) -> Vec<&str> {
        actions.iter().map(RawAction::name).collect()
    }

    #[test]
    fn test_plain_plan_degenerates_to_worker_cleanup_bookends() {
        let plan = assemble(&[sequence(vec![plain("compile").into(), plain("test").into()])])
            .unwrap();
        assert_eq!(
            names(&plan.prepare),
            vec!["Cleanup worker directory - previous-run"]
        );
        assert_eq!(names(&plan.active), vec!["compile", "test"]);
        assert_eq!(
            names(&plan.cleanup),
            vec!["Cleanup worker directory - current-run"]
        );
    }

    #[test]
    fn test_container_cleanup_pair_is_unique() {
        let plan = assemble(&[sequence(vec![
            contained("build", "build", "debian-12").into(),
            contained("test", "build", "fedora-40").into(),
        ])])
        .unwrap();

        let cleanup_prepares = plan
            .prepare
            .iter()
            .filter(|a| a.name().starts_with("Cleanup container resources"))
            .count();
        let cleanup_cleanups = plan
            .cleanup
            .iter()
            .filter(|a| a.name().starts_with("Cleanup container resources"))
            .count();
        assert_eq!(cleanup_prepares, 1);
        assert_eq!(cleanup_cleanups, 1);
        // The plan still ends on the workspace purge.
        assert_eq!(
            plan.cleanup.last().map(RawAction::name),
            Some("Cleanup worker directory - current-run")
        );
    }

    #[test]
    fn test_fetch_per_transition_not_per_unique_environment() {
        let plan = assemble(&[sequence(vec![
            contained("a", "build", "debian-12").into(),
            contained("b", "build", "fedora-40").into(),
            contained("c", "build", "debian-12").into(),
        ])])
        .unwrap();

        let fetches: Vec<&RawAction> = plan
            .prepare
            .iter()
            .filter(|a| a.name() == "Fetch container image")
            .collect();
        // E1, E2, E1 is three transitions: re-entry re-fetches.
        assert_eq!(fetches.len(), 3);
    }

    #[test]
    fn test_consecutive_same_environment_fetches_once() {
        let plan = assemble(&[sequence(vec![
            contained("a", "build", "debian-12").into(),
            contained("b", "build", "debian-12").into(),
        ])])
        .unwrap();
        let fetches = plan
            .prepare
            .iter()
            .filter(|a| a.name() == "Fetch container image")
            .count();
        assert_eq!(fetches, 1);
    }

    #[test]
    fn test_workdir_union_created_once() {
        let plan = assemble(&[sequence(vec![
            contained("a", "build", "debian-12").into(),
            contained("b", "build/logs", "debian-12").into(),
            contained("c", "build", "debian-12").into(),
            contained("d", "/abs/path", "debian-12").into(),
        ])])
        .unwrap();

        let creates: Vec<&RawAction> = plan
            .prepare
            .iter()
            .filter(|a| a.name() == "Create container workdirs")
            .collect();
        assert_eq!(creates.len(), 1);
        // The union covers each relative dir once; absolute dirs are out.
        let argv = match creates[0] {
            RawAction::Plain(action) => action.as_argv(),
            RawAction::InContainer(_) => unreachable!(),
        };
        assert_eq!(argv.last().unwrap(), "mkdir -p . build build/logs");
    }

    #[test]
    fn test_no_workdir_step_without_relative_workdirs() {
        let plan = assemble(&[sequence(vec![
            contained("a", "/abs/path", "debian-12").into(),
        ])])
        .unwrap();
        assert!(
            !plan
                .prepare
                .iter()
                .any(|a| a.name() == "Create container workdirs")
        );
    }

    #[test]
    fn test_tag_reentry_retriggers() {
        let plan = assemble(&[sequence(vec![
            contained("a", "build", "debian-12").into(),
            contained("b", "build", "fedora-40").into(),
            contained("c", "build", "debian-12").into(),
        ])])
        .unwrap();

        assert_eq!(
            names(&plan.active),
            vec![
                "Prepare runtime image tag",
                "a",
                "Prepare runtime image tag",
                "b",
                "Prepare runtime image tag",
                "c",
            ]
        );
    }

    #[test]
    fn test_commit_lands_immediately_after_checkpoint() {
        let mut seq = BuildSequence::new("test");
        seq.push(contained("build", "build", "debian-12"));
        seq.push(RawAction::from(
            contained("install", "build", "debian-12").with_checkpoint(),
        ));
        seq.push(contained("verify", "build", "debian-12"));
        let plan = assemble(&[seq]).unwrap();

        assert_eq!(
            names(&plan.active),
            vec![
                "Prepare runtime image tag",
                "build",
                "install",
                "Checkpoint install",
                "verify",
            ]
        );
    }

    #[test]
    fn test_checkpoint_commit_precedes_environment_reuse() {
        let mut seq = BuildSequence::new("test");
        seq.push(RawAction::from(
            contained("prime", "build", "debian-12").with_checkpoint(),
        ));
        seq.push(contained("other", "build", "fedora-40"));
        seq.push(contained("reuse", "build", "debian-12"));
        let plan = assemble(&[seq]).unwrap();

        let names = names(&plan.active);
        let commit = names
            .iter()
            .position(|n| *n == "Checkpoint prime")
            .unwrap();
        let reuse = names.iter().position(|n| *n == "reuse").unwrap();
        assert!(commit < reuse);
        // The commit sits directly behind its source action.
        assert_eq!(names[commit - 1], "prime");
    }

    #[test]
    fn test_sequence_cleanup_composes_lifo() {
        let first = BuildSequence::new("first")
            .with_action(plain("a"))
            .with_cleanup(plain("drop-a"));
        let second = BuildSequence::new("second")
            .with_action(plain("b"))
            .with_cleanup(plain("drop-b"));
        let plan = assemble(&[first, second]).unwrap();

        assert_eq!(
            names(&plan.cleanup),
            vec![
                "drop-b",
                "drop-a",
                "Cleanup worker directory - current-run",
            ]
        );
    }

    #[test]
    fn test_unset_identity_fails_assembly() {
        let unidentified = InContainerAction::new(
            plain("build"),
            ContainerEnvironment::new("quay.io/org/", "debian-12", "/home/builder"),
        );
        assert!(assemble(&[sequence(vec![unidentified.into()])]).is_err());
    }
}
