//! The long-lived download pipeline (§4.4): a bounded worker pool
//! draining a queue of media fetches, built on the shared
//! `WorkerPool` generalized for this crate's Enqueue-after-start need.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use vaultkeeper_core::config::DownloadConfig;
use vaultkeeper_core::{MediaField, WorkerPool};

use crate::client::build_client;
use crate::error::DownloadError;

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct DownloadTask {
    pub field: MediaField,
    pub url: String,
    pub dest: PathBuf,
}

#[derive(Debug, Clone)]
pub struct DownloadResult {
    pub field: MediaField,
    pub dest: PathBuf,
    pub error: Option<String>,
}

impl DownloadResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Whether a field should be fetched at all, applying §4.4's
/// "force vs. fill" rule before any network request is made.
pub fn should_download(existing_value: Option<&str>, force_download: bool) -> bool {
    force_download || existing_value.is_none_or(str::is_empty)
}

pub struct DownloadPipeline {
    pool: WorkerPool<DownloadTask, DownloadResult>,
}

impl DownloadPipeline {
    pub fn start(config: &DownloadConfig) -> Result<Self, DownloadError> {
        let client = build_client(config)?;
        let retry_attempts = config.retry_attempts;
        let capacity = config.max_connections.max(1);
        let pool = WorkerPool::start(capacity, capacity * 2, move |task: DownloadTask, cancel| {
            let client = client.clone();
            async move { run_download(&client, task, cancel, retry_attempts).await }
        });
        Ok(Self { pool })
    }

    pub async fn enqueue(&self, task: DownloadTask) -> Result<(), DownloadTask> {
        self.pool.enqueue(task).await
    }

    /// Drain `expected_count` results (§4.4 `WaitForCompletion`).
    pub async fn wait_for_completion(&mut self, expected_count: usize) -> Vec<DownloadResult> {
        self.pool.recv_n(expected_count).await
    }

    pub fn stop(&self) {
        self.pool.stop();
    }

    pub fn is_running(&self) -> bool {
        self.pool.is_running()
    }
}

async fn run_download(
    client: &reqwest::Client,
    task: DownloadTask,
    cancel: Arc<AtomicBool>,
    retry_attempts: u32,
) -> DownloadResult {
    let mut backoff = INITIAL_BACKOFF;
    let mut last_error = None;

    for attempt in 0..=retry_attempts {
        if cancel.load(Ordering::Acquire) {
            return DownloadResult {
                field: task.field,
                dest: task.dest,
                error: Some(DownloadError::Cancelled.to_string()),
            };
        }

        match fetch_once(client, &task.url, &task.dest, &cancel).await {
            Ok(()) => {
                return DownloadResult {
                    field: task.field,
                    dest: task.dest,
                    error: None,
                };
            }
            Err(e) => {
                let retryable = e.is_retryable();
                last_error = Some(e.to_string());
                if !retryable || attempt == retry_attempts {
                    break;
                }
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }
    }

    DownloadResult {
        field: task.field,
        dest: task.dest,
        error: last_error,
    }
}

async fn fetch_once(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    cancel: &Arc<AtomicBool>,
) -> Result<(), DownloadError> {
    let response = client.get(url).send().await?;
    let response = response.error_for_status()?;

    if cancel.load(Ordering::Acquire) {
        return Err(DownloadError::Cancelled);
    }

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut file = tokio::fs::File::create(dest).await?;
    let mut stream = response.bytes_stream();
    let mut total_written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        if cancel.load(Ordering::Acquire) {
            drop(file);
            let _ = tokio::fs::remove_file(dest).await;
            return Err(DownloadError::Cancelled);
        }
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        total_written += chunk.len() as u64;
    }
    file.flush().await?;
    drop(file);

    if total_written == 0 {
        let _ = tokio::fs::remove_file(dest).await;
        return Err(DownloadError::EmptyFile(dest.display().to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn force_download_always_fetches() {
        assert!(should_download(Some("./existing.png"), true));
    }

    #[test]
    fn fill_skips_when_already_set() {
        assert!(!should_download(Some("./existing.png"), false));
    }

    #[test]
    fn fill_fetches_when_empty() {
        assert!(should_download(None, false));
        assert!(should_download(Some(""), false));
    }
}
