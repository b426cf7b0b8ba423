use crate::domain::jobs::JobRecord;
use serde::{Deserialize, Serialize};

pub mod hub;

/// Lifecycle events published by workers in this process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    /// The job reached SUCCESS or FAILURE
    Terminal { record: JobRecord },
}

impl JobEvent {
    pub fn job_id(&self) -> &str {
        match self {
            JobEvent::Terminal { record } => &record.id,
        }
    }
}
