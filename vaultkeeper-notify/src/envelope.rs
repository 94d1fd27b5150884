//! Wire shape of the three event kinds the fabric carries (§4.8
//! "Events"). These are broadcast payloads only; nothing here is ever
//! persisted.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemAction {
    GamelistUpdated,
    GamesDeleted,
    GameUpdated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Envelope {
    SystemUpdated {
        system: String,
        action: SystemAction,
        data: serde_json::Value,
        ts: DateTime<Utc>,
    },
    TaskProgress {
        task_id: Uuid,
        message: String,
        progress_percentage: Option<u8>,
        current_step: Option<u64>,
        total_steps: Option<u64>,
        stats: BTreeMap<String, i64>,
    },
    TaskCompleted {
        task_id: Uuid,
        success: bool,
        system: Option<String>,
    },
}

impl Envelope {
    /// The room this event belongs in, or `None` for fabric-wide events
    /// that callers route explicitly (a `TaskCompleted` with no system is
    /// still published to the room the caller names, since the Task's
    /// system isn't always known to the fabric itself).
    pub fn room_hint(&self) -> Option<&str> {
        match self {
            Envelope::SystemUpdated { system, .. } => Some(system.as_str()),
            Envelope::TaskCompleted { system: Some(system), .. } => Some(system.as_str()),
            _ => None,
        }
    }
}
