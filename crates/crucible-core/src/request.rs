//! Build requests awaiting dispatch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::RequestId;

/// One triggered build awaiting dispatch. Created per trigger, destroyed
/// once dispatched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRequest {
    pub id: RequestId,
    pub branch: String,
    pub submitted_at: DateTime<Utc>,
}

impl BuildRequest {
    pub fn new(branch: impl Into<String>) -> Self {
        Self {
            id: RequestId::new(),
            branch: branch.into(),
            submitted_at: Utc::now(),
        }
    }

    pub fn with_submitted_at(mut self, submitted_at: DateTime<Utc>) -> Self {
        self.submitted_at = submitted_at;
        self
    }
}
