//! Actions and the command contract consumed from step producers.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::builder::BuildProperties;

/// Signal sent to an in-flight action when it is interrupted.
pub const DEFAULT_INTERRUPT_SIGNAL: &str = "TERM";

/// Unix user commands run as inside a container unless overridden.
pub const DEFAULT_COMMAND_USER: &str = "builder";

/// The argv-producing command contract.
///
/// Step producers (compile, package, test command builders) implement this
/// outside the core; the assembler implements it for provisioning commands.
pub trait Command: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Working directory, relative to the build root. An absolute path opts
    /// out of build-root resolution.
    fn workdir(&self) -> &Path;

    fn as_argv(&self) -> Vec<String>;

    fn user(&self) -> &str {
        DEFAULT_COMMAND_USER
    }
}

/// Predicate deciding at execution time whether an action runs.
pub type Condition = Arc<dyn Fn(&BuildProperties) -> bool + Send + Sync>;

/// Options shared by every action kind.
#[derive(Clone)]
pub struct ActionOptions {
    /// Execute even after an earlier halt-on-failure abort.
    pub always_run: bool,
    /// A failure aborts the remaining non-always-run actions of the plan.
    pub halt_on_failure: bool,
    /// Optional predicate over build properties; a false result skips the
    /// action without affecting the rest of the plan.
    pub condition: Option<Condition>,
}

impl Default for ActionOptions {
    fn default() -> Self {
        // Safety first: failures halt, nothing survives an abort.
        Self {
            always_run: false,
            halt_on_failure: true,
            condition: None,
        }
    }
}

impl ActionOptions {
    pub fn always_run() -> Self {
        Self {
            always_run: true,
            halt_on_failure: false,
            ..Self::default()
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }
}

impl fmt::Debug for ActionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionOptions")
            .field("always_run", &self.always_run)
            .field("halt_on_failure", &self.halt_on_failure)
            .field("condition", &self.condition.as_ref().map(|_| "<predicate>"))
            .finish()
    }
}

/// One unit of build work: a command plus execution options, declared env
/// vars, and an interrupt signal. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct Action {
    command: Arc<dyn Command>,
    options: ActionOptions,
    env: Vec<(String, String)>,
    interrupt_signal: String,
}

impl Action {
    pub fn new(command: Arc<dyn Command>) -> Self {
        Self {
            command,
            options: ActionOptions::default(),
            env: Vec::new(),
            interrupt_signal: DEFAULT_INTERRUPT_SIGNAL.to_string(),
        }
    }

    pub fn with_options(mut self, options: ActionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }

    pub fn with_interrupt_signal(mut self, signal: impl Into<String>) -> Self {
        self.interrupt_signal = signal.into();
        self
    }

    pub fn name(&self) -> &str {
        self.command.name()
    }

    pub fn workdir(&self) -> &Path {
        self.command.workdir()
    }

    pub fn user(&self) -> &str {
        self.command.user()
    }

    pub fn as_argv(&self) -> Vec<String> {
        self.command.as_argv()
    }

    pub fn options(&self) -> &ActionOptions {
        &self.options
    }

    pub fn env(&self) -> &[(String, String)] {
        &self.env
    }

    pub fn interrupt_signal(&self) -> &str {
        &self.interrupt_signal
    }
}

/// A plain shell command; the simplest [`Command`] implementation.
#[derive(Debug, Clone)]
pub struct ShellCommand {
    name: String,
    workdir: PathBuf,
    argv: Vec<String>,
    user: String,
}

impl ShellCommand {
    pub fn new(
        name: impl Into<String>,
        workdir: impl Into<PathBuf>,
        argv: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            workdir: workdir.into(),
            argv,
            user: DEFAULT_COMMAND_USER.to_string(),
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }
}

impl Command for ShellCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn as_argv(&self) -> Vec<String> {
        self.argv.clone()
    }

    fn user(&self) -> &str {
        &self.user
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_options_halt_on_failure() {
        let opts = ActionOptions::default();
        assert!(opts.halt_on_failure);
        assert!(!opts.always_run);
        assert!(opts.condition.is_none());
    }

    #[test]
    fn test_always_run_does_not_halt() {
        let opts = ActionOptions::always_run();
        assert!(opts.always_run);
        assert!(!opts.halt_on_failure);
    }

    #[test]
    fn test_action_delegates_to_command() {
        let cmd = ShellCommand::new(
            "list",
            ".",
            vec!["ls".to_string(), "-la".to_string()],
        );
        let action = Action::new(Arc::new(cmd)).with_interrupt_signal("KILL");
        assert_eq!(action.name(), "list");
        assert_eq!(action.as_argv(), vec!["ls", "-la"]);
        assert_eq!(action.interrupt_signal(), "KILL");
        assert_eq!(action.user(), DEFAULT_COMMAND_USER);
    }
}
