//! In-memory shape of a Task (§3 "Lifecycles", §4.6). Reconstructible
//! either from a fresh `TaskSubmission` or by parsing a log file on
//! restart, so its fields are a superset of both sources.

use std::collections::BTreeMap;

use chrono::{DateTime, Local};
use uuid::Uuid;
use vaultkeeper_core::{TaskKind, TaskStatus, TaskSubmission};

#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub id: Uuid,
    pub kind: TaskKind,
    pub username: String,
    pub system: Option<String>,
    pub data: serde_json::Value,
    pub status: TaskStatus,
    pub started_at: Option<DateTime<Local>>,
    pub terminal_at: Option<DateTime<Local>>,
    pub progress_percentage: Option<u8>,
    pub current_step: Option<u64>,
    pub total_steps: Option<u64>,
    pub stats: BTreeMap<String, i64>,
    pub last_message: Option<String>,
}

impl TaskRecord {
    pub fn from_submission(submission: &TaskSubmission) -> Self {
        Self {
            id: submission.id,
            kind: submission.kind,
            username: submission.username.clone(),
            system: submission.system.clone(),
            data: submission.data.clone(),
            status: TaskStatus::Queued,
            started_at: None,
            terminal_at: None,
            progress_percentage: None,
            current_step: None,
            total_steps: None,
            stats: BTreeMap::new(),
            last_message: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
