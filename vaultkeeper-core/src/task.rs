//! Task identity and the closed set of task kinds (§4.6).
//!
//! Shared between `vaultkeeper-orchestrator` (which owns Task lifecycle)
//! and `vaultkeeper-worker` (which deserializes submissions over the IPC
//! channel), so both sides agree on the wire shape without duplicating it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The closed set of task kinds the orchestrator knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Scraping,
    ImageDownload,
    MediaScan,
    RomScan,
    YoutubeDownload,
    ManualCrop,
    Box2dGeneration,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scraping => "scraping",
            Self::ImageDownload => "image_download",
            Self::MediaScan => "media_scan",
            Self::RomScan => "rom_scan",
            Self::YoutubeDownload => "youtube_download",
            Self::ManualCrop => "manual_crop",
            Self::Box2dGeneration => "2d_box_generation",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        Some(match s {
            "scraping" => Self::Scraping,
            "image_download" => Self::ImageDownload,
            "media_scan" => Self::MediaScan,
            "rom_scan" => Self::RomScan,
            "youtube_download" => Self::YoutubeDownload,
            "manual_crop" => Self::ManualCrop,
            "2d_box_generation" => Self::Box2dGeneration,
            _ => return None,
        })
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal and in-flight statuses a Task can be in (§3 "Lifecycles").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Idle,
    Queued,
    Running,
    Completed,
    Error,
    Stopped,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Stopped)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Stopped => "stopped",
        };
        write!(f, "{s}")
    }
}

/// A submission handed to the orchestrator (`Enqueue`-equivalent input).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSubmission {
    pub id: Uuid,
    pub kind: TaskKind,
    pub username: String,
    pub system: Option<String>,
    /// Opaque payload captured verbatim in the task log header and passed
    /// through to the worker (e.g. selected game paths, field mapping).
    pub data: serde_json::Value,
}

/// A single progress event as emitted by a running task (§4.6 "Progress
/// update contract").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub task_id: Uuid,
    pub message: String,
    pub progress_percentage: Option<u8>,
    pub current_step: Option<u64>,
    pub total_steps: Option<u64>,
    pub stats_delta: std::collections::BTreeMap<String, i64>,
}
