//! End-to-end: assemble a containerized build, materialize it for one
//! triggered build, and drive it through the executor.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use crucible_assembler::{assemble, materialize, render};
use crucible_core::Result;
use crucible_core::action::{Action, ShellCommand};
use crucible_core::builder::BuildProperties;
use crucible_core::container::{ContainerEnvironment, InContainerAction};
use crucible_core::plan::{BuildSequence, PlanStep, RawAction};
use crucible_core::ports::{ActionOutcome, ActionTransport};
use crucible_runner::PlanExecutor;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

struct RecordingTransport {
    argv_log: Mutex<Vec<(String, Vec<String>)>>,
}

#[async_trait]
impl ActionTransport for RecordingTransport {
    async fn execute(&self, _worker: &str, step: &PlanStep) -> Result<ActionOutcome> {
        self.argv_log
            .lock()
            .push((step.name.clone(), step.argv.clone()));
        Ok(ActionOutcome { exit_code: 0 })
    }

    async fn interrupt(&self, _worker: &str, _step: &PlanStep, _signal: &str) -> Result<()> {
        Ok(())
    }
}

fn environment() -> ContainerEnvironment {
    ContainerEnvironment::new("quay.io/org/", "debian-12", "/home/builder")
        .with_identity("amd64-debian-12")
}

fn in_container(name: &str, argv: Vec<&str>) -> InContainerAction {
    InContainerAction::new(
        Action::new(Arc::new(ShellCommand::new(
            name,
            PathBuf::from("build"),
            argv.into_iter().map(String::from).collect(),
        ))),
        environment(),
    )
}

#[tokio::test]
async fn test_full_build_runs_provisioning_then_actions_then_cleanup() {
    let mut sequence = BuildSequence::new("compile-and-test");
    sequence.push(in_container(
        "fetch-source",
        vec!["git", "clone", "--branch", "${{ branch }}", "."],
    ));
    sequence.push(RawAction::from(
        in_container("compile", vec!["make", "-j8"]).with_checkpoint(),
    ));
    sequence.push(in_container("test", vec!["make", "test"]));

    let template = render(&assemble(&[sequence]).expect("assembly")).expect("render");
    let properties = BuildProperties::new().with("branch", "preview-12.3");
    let plan = materialize(&template, &properties);

    let transport = Arc::new(RecordingTransport {
        argv_log: Mutex::new(Vec::new()),
    });
    let executor = PlanExecutor::new(transport.clone());
    let report = executor
        .run(
            "hz-bbw1-docker",
            &plan,
            &properties,
            CancellationToken::new(),
        )
        .await;

    assert!(report.success());

    let log = transport.argv_log.lock();
    let names: Vec<&str> = log.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "Cleanup worker directory - previous-run",
            "Cleanup container resources - previous-run",
            "Fetch container image",
            "Create container workdirs",
            "Prepare runtime image tag",
            "fetch-source",
            "compile",
            "Checkpoint compile",
            "test",
            "Cleanup container resources - current-run",
            "Cleanup worker directory - current-run",
        ]
    );

    // The branch placeholder was stamped before execution.
    let (_, fetch_argv) = log
        .iter()
        .find(|(name, _)| name == "fetch-source")
        .expect("fetch step");
    assert!(fetch_argv.contains(&"preview-12.3".to_string()));

    // The checkpointed action keeps its container for the commit.
    let (_, compile_argv) = log
        .iter()
        .find(|(name, _)| name == "compile")
        .expect("compile step");
    assert!(!compile_argv.contains(&"--rm".to_string()));
}
