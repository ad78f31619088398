//! Error types for Crucible.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Configuration errors: fatal at registration or assembly time,
    // before the coordinator accepts traffic.
    #[error("Builder '{builder}' declares job weight {weight}; weight must be at least 1")]
    InvalidJobWeight { builder: String, weight: u32 },

    #[error("Builder '{builder}' has an empty eligible-worker set")]
    NoEligibleWorkers { builder: String },

    #[error("No workers found for architecture: {0}")]
    NoWorkersForArch(String),

    #[error("Worker not registered in pool: {0}")]
    UnknownWorker(String),

    #[error(
        "Builder '{builder}' job weight {weight} exceeds every eligible worker's capacity"
    )]
    WeightExceedsCapacity { builder: String, weight: u32 },

    #[error("Container identity is not set for image '{image}'")]
    IdentityUnset { image: String },

    #[error("Duplicate flag '{name}': already set to {existing:?}, redeclared as {new:?}")]
    DuplicateFlag {
        name: String,
        existing: Option<String>,
        new: Option<String>,
    },

    // Runtime errors: local to one build, never fatal to the coordinator.
    #[error("Action '{action}' failed with exit code {exit_code}")]
    ActionFailed { action: String, exit_code: i32 },

    #[error("Plan cancelled during '{action}'")]
    Cancelled { action: String },

    #[error("Transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, Error>;
