//! Raw actions, build sequences, and the assembled execution plan.

use std::path::PathBuf;

use crate::action::{Action, ActionOptions};
use crate::container::InContainerAction;

/// A logical action before provisioning: either plain on the worker or
/// bound to a container environment.
#[derive(Debug, Clone)]
pub enum RawAction {
    Plain(Action),
    InContainer(InContainerAction),
}

impl RawAction {
    pub fn name(&self) -> &str {
        match self {
            RawAction::Plain(action) => action.name(),
            RawAction::InContainer(ica) => ica.action.name(),
        }
    }

    pub fn options(&self) -> &ActionOptions {
        match self {
            RawAction::Plain(action) => action.options(),
            RawAction::InContainer(ica) => ica.action.options(),
        }
    }

    pub fn as_in_container(&self) -> Option<&InContainerAction> {
        match self {
            RawAction::InContainer(ica) => Some(ica),
            RawAction::Plain(_) => None,
        }
    }
}

impl From<Action> for RawAction {
    fn from(action: Action) -> Self {
        RawAction::Plain(action)
    }
}

impl From<InContainerAction> for RawAction {
    fn from(ica: InContainerAction) -> Self {
        RawAction::InContainer(ica)
    }
}

/// A named ordered run of raw actions, optionally declaring its own cleanup
/// actions. Builders compose one or more sequences into a single plan;
/// composed cleanup ordering is LIFO (the first sequence's cleanup runs
/// last).
#[derive(Debug, Clone, Default)]
pub struct BuildSequence {
    pub name: String,
    actions: Vec<RawAction>,
    cleanup: Vec<RawAction>,
}

impl BuildSequence {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actions: Vec::new(),
            cleanup: Vec::new(),
        }
    }

    pub fn push(&mut self, action: impl Into<RawAction>) {
        self.actions.push(action.into());
    }

    pub fn push_cleanup(&mut self, action: impl Into<RawAction>) {
        self.cleanup.push(action.into());
    }

    pub fn with_action(mut self, action: impl Into<RawAction>) -> Self {
        self.push(action);
        self
    }

    pub fn with_cleanup(mut self, action: impl Into<RawAction>) -> Self {
        self.push_cleanup(action);
        self
    }

    pub fn actions(&self) -> &[RawAction] {
        &self.actions
    }

    pub fn actions_mut(&mut self) -> &mut [RawAction] {
        &mut self.actions
    }

    pub fn cleanup(&self) -> &[RawAction] {
        &self.cleanup
    }

    pub fn cleanup_mut(&mut self) -> &mut [RawAction] {
        &mut self.cleanup
    }
}

/// One fully rendered low-level action of an execution plan.
#[derive(Debug, Clone)]
pub struct PlanStep {
    pub name: String,
    pub argv: Vec<String>,
    pub workdir: PathBuf,
    pub options: ActionOptions,
    pub env: Vec<(String, String)>,
    pub interrupt_signal: String,
}

/// The assembled prepare/active/cleanup lists for one build.
/// Concatenation order is execution order.
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    pub prepare: Vec<PlanStep>,
    pub active: Vec<PlanStep>,
    pub cleanup: Vec<PlanStep>,
}

impl ExecutionPlan {
    /// All steps in execution order.
    pub fn steps(&self) -> impl Iterator<Item = &PlanStep> {
        self.prepare
            .iter()
            .chain(self.active.iter())
            .chain(self.cleanup.iter())
    }

    pub fn len(&self) -> usize {
        self.prepare.len() + self.active.len() + self.cleanup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ShellCommand;
    use std::sync::Arc;

    fn action(name: &str) -> Action {
        Action::new(Arc::new(ShellCommand::new(name, ".", vec!["true".into()])))
    }

    #[test]
    fn test_sequence_keeps_order() {
        let seq = BuildSequence::new("compile")
            .with_action(action("configure"))
            .with_action(action("make"));
        let names: Vec<_> = seq.actions().iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["configure", "make"]);
    }

    #[test]
    fn test_plan_steps_concatenation_order() {
        let step = |name: &str| PlanStep {
            name: name.to_string(),
            argv: vec![],
            workdir: PathBuf::from("build"),
            options: ActionOptions::default(),
            env: vec![],
            interrupt_signal: "TERM".to_string(),
        };
        let plan = ExecutionPlan {
            prepare: vec![step("p")],
            active: vec![step("a")],
            cleanup: vec![step("c")],
        };
        let names: Vec<_> = plan.steps().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["p", "a", "c"]);
        assert_eq!(plan.len(), 3);
    }
}
