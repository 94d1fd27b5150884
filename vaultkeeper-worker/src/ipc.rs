//! Newline-delimited JSON over the parent↔child pipes (§4.7
//! "Deployment"): one `TaskQueue` message per submitted Task, one or more
//! `ResultQueue` messages per Task in reply. Grounded on
//! `retro-junk-import::scraper_import`'s per-release synchronous loop,
//! generalized to a framed async message pair since the loop now runs in
//! a separate process instead of inline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt};
use uuid::Uuid;
use vaultkeeper_core::TextField;

use crate::error::WorkerError;

/// Parent -> child.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskQueueMessage {
    Submit(WorkerSubmission),
    Stop {
        task_id: Uuid,
    },
    /// Applies a partial-match candidate the user picked out of band
    /// (§4.7 "Partial-match review") to the `task_id` submission's own
    /// catalog/corpus, using the same field semantics it was submitted
    /// with.
    ApplyCandidate {
        task_id: Uuid,
        game_path: String,
        database_id: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSubmission {
    pub task_id: Uuid,
    pub corpus_path: std::path::PathBuf,
    pub platform: String,
    pub catalog_path: std::path::PathBuf,
    pub selected_paths: Option<Vec<String>>,
    pub partial_match_review: bool,
    pub region_priority: Vec<String>,
    /// When `true`, a matched field overwrites whatever the catalog
    /// already has. When `false` (default), only empty fields are
    /// filled in. Independent of `selected_fields` (§9(iii) "force flags
    /// must stay independent").
    pub overwrite_text_fields: bool,
    /// Restricts which text fields a match is allowed to touch. `None`
    /// means all of [`TextField::ALL`] are in scope.
    pub selected_fields: Option<Vec<TextField>>,
}

/// Child -> parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultQueueMessage {
    Progress {
        task_id: Uuid,
        message: String,
        progress_percentage: Option<u8>,
        current_step: Option<u64>,
        total_steps: Option<u64>,
        stats_delta: BTreeMap<String, i64>,
    },
    PartialMatchRequest {
        task_id: Uuid,
        game_path: String,
        candidates: Vec<CandidateDto>,
    },
    Final {
        task_id: Uuid,
        success: bool,
        stats: BTreeMap<String, i64>,
        matched_paths: Vec<String>,
    },
    CandidateApplied {
        task_id: Uuid,
        game_path: String,
        success: bool,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateDto {
    pub database_id: String,
    pub name: String,
    pub score: f64,
}

pub async fn write_message<W, M>(writer: &mut W, message: &M) -> Result<(), WorkerError>
where
    W: AsyncWriteExt + Unpin,
    M: Serialize,
{
    let mut line = serde_json::to_string(message).map_err(|e| WorkerError::MalformedMessage(e.to_string()))?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Read the next message, or `None` on clean EOF (the far end closed its
/// write half).
pub async fn read_message<R, M>(reader: &mut R) -> Result<Option<M>, WorkerError>
where
    R: AsyncBufReadExt + Unpin,
    M: for<'de> Deserialize<'de>,
{
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Ok(None);
    }
    let trimmed = line.trim_end();
    if trimmed.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|e| WorkerError::MalformedMessage(format!("{e}: {trimmed}")))
}
