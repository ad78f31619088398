//! Container environments and actions bound to them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::{Error, Result};

/// Default shared-memory size granted to build containers.
pub const DEFAULT_SHM_SIZE: &str = "15g";

/// Default memory-lock limit (bytes) for build containers.
pub const DEFAULT_MEMLOCK_LIMIT: u64 = 51_200_000;

/// Value description of an isolated execution environment.
///
/// Two environments sharing an image reference count as the same environment
/// for fetch/tag purposes even when their mounts or env vars differ; change
/// detection goes through [`ContainerEnvironment::same_image`], never through
/// structural equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerEnvironment {
    /// Registry prefix, e.g. `quay.io/org/`.
    pub repository: String,
    /// Image tag appended to the repository to form the full reference.
    pub image_tag: String,
    /// (host path, container path) bind mounts.
    pub bind_mounts: Vec<(PathBuf, PathBuf)>,
    /// Environment vars forming the base set; action vars override these.
    pub env_vars: Vec<(String, String)>,
    pub shm_size: String,
    pub memlock_limit: u64,
    /// Root that relative action workdirs resolve against inside the
    /// container; also the destination of the state volume.
    pub workdir: PathBuf,
    /// Per-builder-run identity. Set at registration; required before any
    /// in-container use.
    identity: Option<String>,
}

impl ContainerEnvironment {
    pub fn new(
        repository: impl Into<String>,
        image_tag: impl Into<String>,
        workdir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            repository: repository.into(),
            image_tag: image_tag.into(),
            bind_mounts: Vec::new(),
            env_vars: Vec::new(),
            shm_size: DEFAULT_SHM_SIZE.to_string(),
            memlock_limit: DEFAULT_MEMLOCK_LIMIT,
            workdir: workdir.into(),
            identity: None,
        }
    }

    pub fn with_bind_mounts(mut self, mounts: Vec<(PathBuf, PathBuf)>) -> Self {
        self.bind_mounts = mounts;
        self
    }

    pub fn with_env_vars(mut self, env_vars: Vec<(String, String)>) -> Self {
        self.env_vars = env_vars;
        self
    }

    pub fn with_shm_size(mut self, shm_size: impl Into<String>) -> Self {
        self.shm_size = shm_size.into();
        self
    }

    pub fn with_memlock_limit(mut self, limit: u64) -> Self {
        self.memlock_limit = limit;
        self
    }

    /// Full image reference: repository + tag.
    pub fn image_url(&self) -> String {
        format!("{}{}", self.repository, self.image_tag)
    }

    /// Environment identity for change detection, scoped to the image
    /// reference only.
    pub fn same_image(&self, other: &ContainerEnvironment) -> bool {
        self.image_url() == other.image_url()
    }

    /// Stamp the per-builder-run identity. The identity names the container,
    /// its state volume, and the runtime tag, and must stay stable across
    /// the whole plan.
    pub fn set_identity(&mut self, identity: impl Into<String>) {
        self.identity = Some(identity.into());
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.set_identity(identity);
        self
    }

    pub fn container_name(&self) -> Result<&str> {
        self.identity.as_deref().ok_or_else(|| Error::IdentityUnset {
            image: self.image_url(),
        })
    }

    /// Local tag the fetched image is aliased to for this builder run.
    /// Only a checkpoint commit may overwrite its filesystem state.
    pub fn runtime_tag(&self) -> Result<String> {
        Ok(format!("crucible:{}", self.container_name()?))
    }

    /// Mount spec of the state volume shared by every in-container action
    /// of one plan.
    pub fn volume_mount(&self) -> Result<String> {
        Ok(format!(
            "type=volume,src={},dst={}",
            self.container_name()?,
            self.workdir.display()
        ))
    }
}

/// An [`Action`] bound to a [`ContainerEnvironment`].
#[derive(Debug, Clone)]
pub struct InContainerAction {
    pub action: Action,
    pub environment: ContainerEnvironment,
    /// Commit the container filesystem into the runtime tag right after
    /// this action.
    pub checkpoint: bool,
}

impl InContainerAction {
    pub fn new(action: Action, environment: ContainerEnvironment) -> Self {
        Self {
            action,
            environment,
            checkpoint: false,
        }
    }

    pub fn with_checkpoint(mut self) -> Self {
        self.checkpoint = true;
        self
    }

    /// Environment-relative working directory: the environment root joined
    /// with the action's relative workdir; an absolute action workdir wins.
    pub fn effective_workdir(&self) -> PathBuf {
        let workdir = self.action.workdir();
        if workdir.is_absolute() {
            workdir.to_path_buf()
        } else {
            self.environment.workdir.join(workdir)
        }
    }

    /// Render the full container-run argv: the run prefix followed by the
    /// wrapped command's argv.
    pub fn render_argv(&self) -> Result<Vec<String>> {
        let container_name = self.environment.container_name()?.to_string();
        let mut argv: Vec<String> = vec![
            "docker".into(),
            "run".into(),
            "--init".into(),
            "--name".into(),
            container_name,
            "-u".into(),
            self.action.user().into(),
        ];

        // Mandatory volume mount for state sharing between actions.
        argv.push("--mount".into());
        argv.push(self.environment.volume_mount()?);

        // A checkpointed container must survive until its commit removes it.
        if !self.checkpoint {
            argv.push("--rm".into());
        }

        for (src, dst) in &self.environment.bind_mounts {
            argv.push("--mount".into());
            argv.push(format!(
                "type=bind,src={},dst={}",
                src.display(),
                dst.display()
            ));
        }

        for (key, value) in merge_env(self.environment.env_vars.clone(), self.action.env()) {
            argv.push("-e".into());
            argv.push(format!("{}={}", key, value));
        }

        argv.push(format!("--shm-size={}", self.environment.shm_size));

        argv.push("-w".into());
        argv.push(self.effective_workdir().display().to_string());

        argv.push(self.environment.runtime_tag()?);

        argv.extend(self.action.as_argv());
        Ok(argv)
    }
}

/// Environment vars form the base; action vars override matching keys and
/// append otherwise, preserving declaration order.
fn merge_env(base: Vec<(String, String)>, overrides: &[(String, String)]) -> Vec<(String, String)> {
    let mut merged = base;
    for (key, value) in overrides {
        match merged.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.clone(),
            None => merged.push((key.clone(), value.clone())),
        }
    }
    merged
}

/// Helper for absolute-vs-relative checks on environment workdirs.
pub fn is_relative_workdir(path: &Path) -> bool {
    !path.is_absolute()
}
