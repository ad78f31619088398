//! Provisioning commands and their action constructors.
//!
//! These are the low-level steps the passes weave around a builder's active
//! actions. Container registry operations are emitted as argv for the
//! transport to run on a worker; nothing here talks to a runtime directly.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crucible_core::Result;
use crucible_core::action::{Action, ActionOptions, Command};
use crucible_core::container::{ContainerEnvironment, InContainerAction};

/// Purge the worker's build directory, hidden files included.
#[derive(Debug)]
pub struct CleanupWorkerDir {
    name: String,
    workdir: PathBuf,
}

impl CleanupWorkerDir {
    pub fn new(phase: &str) -> Self {
        Self {
            name: format!("Cleanup worker directory - {phase}"),
            workdir: PathBuf::from("."),
        }
    }
}

impl Command for CleanupWorkerDir {
    fn name(&self) -> &str {
        &self.name
    }

    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn as_argv(&self) -> Vec<String> {
        vec![
            "bash".into(),
            "-exc".into(),
            "rm -r * .* 2> /dev/null || true".into(),
        ]
    }
}

/// Remove a run's container, its state volume, and its runtime image.
#[derive(Debug)]
pub struct CleanupContainerResources {
    name: String,
    workdir: PathBuf,
    container_name: String,
    runtime_tag: String,
}

impl CleanupContainerResources {
    pub fn new(phase: &str, container_name: String, runtime_tag: String) -> Self {
        Self {
            name: format!("Cleanup container resources - {phase}"),
            workdir: PathBuf::from("."),
            container_name,
            runtime_tag,
        }
    }
}

impl Command for CleanupContainerResources {
    fn name(&self) -> &str {
        &self.name
    }

    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn as_argv(&self) -> Vec<String> {
        vec![
            "bash".into(),
            "-exc".into(),
            format!(
                "(docker rm --force {c}; docker volume rm {c}; docker image rm {t};) || true",
                c = self.container_name,
                t = self.runtime_tag
            ),
        ]
    }
}

/// Pull an environment's image from the registry.
#[derive(Debug)]
pub struct FetchContainerImage {
    name: String,
    workdir: PathBuf,
    image_url: String,
}

impl FetchContainerImage {
    pub fn new(image_url: String) -> Self {
        Self {
            name: "Fetch container image".to_string(),
            workdir: PathBuf::from("."),
            image_url,
        }
    }
}

impl Command for FetchContainerImage {
    fn name(&self) -> &str {
        &self.name
    }

    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn as_argv(&self) -> Vec<String> {
        vec!["docker".into(), "pull".into(), self.image_url.clone()]
    }
}

/// Drop the old runtime tag and alias the fetched image to it.
#[derive(Debug)]
pub struct TagContainerImage {
    name: String,
    workdir: PathBuf,
    image_url: String,
    runtime_tag: String,
}

impl TagContainerImage {
    pub fn new(image_url: String, runtime_tag: String) -> Self {
        Self {
            name: "Prepare runtime image tag".to_string(),
            workdir: PathBuf::from("."),
            image_url,
            runtime_tag,
        }
    }
}

impl Command for TagContainerImage {
    fn name(&self) -> &str {
        &self.name
    }

    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn as_argv(&self) -> Vec<String> {
        vec![
            "bash".into(),
            "-exc".into(),
            format!(
                "docker image rm -f {t} && docker tag {i} {t}",
                t = self.runtime_tag,
                i = self.image_url
            ),
        ]
    }
}

/// Commit a container's filesystem state to the runtime tag, then remove
/// the container. The only operation allowed to overwrite the tag's state.
#[derive(Debug)]
pub struct ContainerCommit {
    name: String,
    workdir: PathBuf,
    container_name: String,
    runtime_tag: String,
    action_name: String,
}

impl ContainerCommit {
    pub fn new(container_name: String, runtime_tag: String, action_name: &str) -> Self {
        Self {
            name: format!("Checkpoint {action_name}"),
            workdir: PathBuf::from("."),
            container_name,
            runtime_tag,
            action_name: action_name.to_string(),
        }
    }
}

impl Command for ContainerCommit {
    fn name(&self) -> &str {
        &self.name
    }

    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn as_argv(&self) -> Vec<String> {
        vec![
            "bash".into(),
            "-exc".into(),
            format!(
                "docker container commit --message \"{m}\" {c} {t} && docker rm {c}",
                m = self.action_name,
                c = self.container_name,
                t = self.runtime_tag
            ),
        ]
    }
}

/// Create the union of relative workdirs inside the mounted state volume.
#[derive(Debug)]
pub struct CreateContainerWorkdirs {
    name: String,
    workdir: PathBuf,
    volume_mount: String,
    image_url: String,
    workdirs: Vec<String>,
}

impl CreateContainerWorkdirs {
    pub fn new(volume_mount: String, image_url: String, workdirs: Vec<String>) -> Self {
        Self {
            name: "Create container workdirs".to_string(),
            workdir: PathBuf::from("."),
            volume_mount,
            image_url,
            workdirs,
        }
    }
}

impl Command for CreateContainerWorkdirs {
    fn name(&self) -> &str {
        &self.name
    }

    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn as_argv(&self) -> Vec<String> {
        vec![
            "docker".into(),
            "run".into(),
            "--rm".into(),
            "--mount".into(),
            self.volume_mount.clone(),
            self.image_url.clone(),
            "bash".into(),
            "-exc".into(),
            format!("mkdir -p . {}", self.workdirs.join(" ")),
        ]
    }
}

/// Worker-directory purge; always runs, even after an aborted plan.
pub fn worker_cleanup_action(phase: &str) -> Action {
    Action::new(Arc::new(CleanupWorkerDir::new(phase)))
        .with_options(ActionOptions::always_run())
}

/// Container/volume/runtime-image removal; always runs.
pub fn container_cleanup_action(phase: &str, env: &ContainerEnvironment) -> Result<Action> {
    let command = CleanupContainerResources::new(
        phase,
        env.container_name()?.to_string(),
        env.runtime_tag()?,
    );
    Ok(Action::new(Arc::new(command)).with_options(ActionOptions::always_run()))
}

/// Image pull; a failed fetch halts the plan.
pub fn fetch_image_action(env: &ContainerEnvironment) -> Action {
    Action::new(Arc::new(FetchContainerImage::new(env.image_url())))
}

/// Runtime-tag refresh; a failed tag halts the plan.
pub fn tag_image_action(env: &ContainerEnvironment) -> Result<Action> {
    let command = TagContainerImage::new(env.image_url(), env.runtime_tag()?);
    Ok(Action::new(Arc::new(command)))
}

/// Checkpoint commit for one in-container action, carrying the source
/// action's option set.
pub fn commit_action(source: &InContainerAction) -> Result<Action> {
    let env = &source.environment;
    let command = ContainerCommit::new(
        env.container_name()?.to_string(),
        env.runtime_tag()?,
        source.action.name(),
    );
    Ok(Action::new(Arc::new(command)).with_options(source.action.options().clone()))
}

/// Workdir creation inside the state volume; a failure halts the plan.
pub fn create_workdirs_action(
    env: &ContainerEnvironment,
    workdirs: Vec<String>,
) -> Result<Action> {
    let command = CreateContainerWorkdirs::new(env.volume_mount()?, env.image_url(), workdirs);
    Ok(Action::new(Arc::new(command)))
}
