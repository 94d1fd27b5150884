//! The single-writer Task scheduler (§4.6). At most one Task runs at a
//! time per process; everything else queues. Grounded on
//! `ScanControlPlane`'s split between a fast in-memory registry
//! (`active`/`history`) and a per-run broadcast channel for live
//! subscribers, generalized from "one scan can run per library" to "one
//! Task runs per process" and from scan-specific state to the Task log
//! file being the durable record instead of a database row.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Local;
use log::{info, warn};
use tokio::sync::{broadcast, Mutex, RwLock};
use uuid::Uuid;
use vaultkeeper_core::{ProgressUpdate, TaskStatus, TaskSubmission, VaultConfig};

use crate::error::OrchestratorError;
use crate::record::TaskRecord;
use crate::task_log::{self, Footer};

const STOP_GRACE: std::time::Duration = std::time::Duration::from_secs(5);
const STUCK_IDLE_THRESHOLD: chrono::Duration = chrono::Duration::minutes(5);

/// What a live log subscriber receives (§4.6 "Streaming").
#[derive(Debug, Clone)]
pub enum LogEvent {
    Line(String),
    Terminal(String),
}

struct Inner {
    config: VaultConfig,
    records: RwLock<HashMap<Uuid, TaskRecord>>,
    queue: Mutex<VecDeque<Uuid>>,
    running: RwLock<Option<Uuid>>,
    cancel_flags: RwLock<HashMap<Uuid, Arc<AtomicBool>>>,
    subscribers: RwLock<HashMap<Uuid, broadcast::Sender<LogEvent>>>,
}

#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(config: VaultConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                records: RwLock::new(HashMap::new()),
                queue: Mutex::new(VecDeque::new()),
                running: RwLock::new(None),
                cancel_flags: RwLock::new(HashMap::new()),
                subscribers: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Scan the log directory and reconstruct Task records (§4.6 "History
    /// reload"). Any log with no footer belonged to a Task that was
    /// `running` when the process exited; it's force-finalized as
    /// `stopped` both in memory and on disk, so a second reload sees a
    /// consistent terminal record.
    pub async fn reload_history(&self) -> Result<usize, OrchestratorError> {
        let dir = &self.inner.config.task_logs_directory;
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut loaded = 0;
        let mut records = self.inner.records.write().await;
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("log") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()).and_then(|s| Uuid::parse_str(s).ok()) else {
                continue;
            };

            let parsed = task_log::parse_log_file(&path, id)?;
            let Some(kind) = parsed.kind else {
                warn!("skipping unparseable task log {path:?}");
                continue;
            };

            let mut record = TaskRecord {
                id,
                kind,
                username: parsed.username.unwrap_or_default(),
                system: parsed.system.clone(),
                data: parsed.data.unwrap_or(serde_json::Value::Null),
                status: parsed.final_status.unwrap_or(TaskStatus::Stopped),
                started_at: parsed.started_at,
                terminal_at: parsed.terminal_at,
                progress_percentage: parsed.progress_percentage,
                current_step: parsed.current_step,
                total_steps: parsed.total_steps,
                stats: parsed.stats,
                last_message: None,
            };

            if !parsed.has_footer {
                record.status = TaskStatus::Stopped;
                let duration = record
                    .started_at
                    .map(|s| (Local::now() - s).num_seconds())
                    .unwrap_or(0);
                let footer = Footer {
                    stopped: true,
                    final_status: TaskStatus::Stopped,
                    duration_secs: duration,
                    progress_percentage: record.progress_percentage,
                    current_step: record.current_step,
                    total_steps: record.total_steps,
                    system: record.system.as_deref(),
                    stats: &record.stats,
                };
                if let Err(e) = task_log::write_footer(&path, &footer, Local::now()) {
                    warn!("failed to finalize dangling task log {path:?}: {e}");
                }
                record.terminal_at = Some(Local::now());
            }

            records.insert(id, record);
            loaded += 1;
        }
        Ok(loaded)
    }

    /// Submit a new Task. Starts immediately if nothing is running,
    /// otherwise appends to the FIFO queue (§4.6 "Scheduling model").
    pub async fn submit(&self, submission: TaskSubmission) -> Result<Uuid, OrchestratorError> {
        let id = submission.id;
        let record = TaskRecord::from_submission(&submission);
        self.inner.records.write().await.insert(id, record);

        let mut running = self.inner.running.write().await;
        if running.is_some() {
            self.inner.queue.lock().await.push_back(id);
            info!("task {id} queued ({} kind)", submission.kind);
            return Ok(id);
        }

        self.start_locked(&submission, &mut running).await?;
        Ok(id)
    }

    async fn start_locked(
        &self,
        submission: &TaskSubmission,
        running: &mut Option<Uuid>,
    ) -> Result<(), OrchestratorError> {
        let started_at = Local::now();
        let path = self.inner.config.task_log_path(submission.id);
        task_log::write_header(&path, submission, started_at)?;

        {
            let mut records = self.inner.records.write().await;
            if let Some(record) = records.get_mut(&submission.id) {
                record.status = TaskStatus::Running;
                record.started_at = Some(started_at);
            }
        }
        self.inner
            .cancel_flags
            .write()
            .await
            .insert(submission.id, Arc::new(AtomicBool::new(false)));
        *running = Some(submission.id);
        info!("task {} started ({})", submission.id, submission.kind);
        Ok(())
    }

    /// The process-wide cooperative cancel flag a worker or the Download
    /// Pipeline polls (§5 "Cancellation").
    pub async fn cancel_flag(&self, id: Uuid) -> Option<Arc<AtomicBool>> {
        self.inner.cancel_flags.read().await.get(&id).cloned()
    }

    /// Apply one progress event: append to the log, clamp percentage to
    /// monotonic non-decreasing, merge the stats delta, and fan out to
    /// live subscribers (§4.6 "Progress update contract").
    pub async fn record_progress(&self, update: ProgressUpdate) -> Result<(), OrchestratorError> {
        let path = self.inner.config.task_log_path(update.task_id);
        task_log::append_line(&path, &update.message)?;

        let mut records = self.inner.records.write().await;
        let record = records.get_mut(&update.task_id).ok_or(OrchestratorError::NotFound(update.task_id))?;
        if record.is_terminal() {
            return Err(OrchestratorError::AlreadyTerminal(update.task_id));
        }
        if let Some(pct) = update.progress_percentage {
            record.progress_percentage = Some(record.progress_percentage.map_or(pct, |old| old.max(pct)));
        }
        if update.current_step.is_some() {
            record.current_step = update.current_step;
        }
        if update.total_steps.is_some() {
            record.total_steps = update.total_steps;
        }
        for (key, delta) in &update.stats_delta {
            *record.stats.entry(key.clone()).or_insert(0) += delta;
        }
        record.last_message = Some(update.message.clone());
        drop(records);

        self.broadcast(update.task_id, LogEvent::Line(update.message)).await;
        Ok(())
    }

    /// Mark a running Task `idle`; the stuck-task sweeper force-errors it
    /// if it stays idle past the threshold (§4.6 "Stuck-task sweeper").
    pub async fn mark_idle(&self, id: Uuid) -> Result<(), OrchestratorError> {
        let mut records = self.inner.records.write().await;
        let record = records.get_mut(&id).ok_or(OrchestratorError::NotFound(id))?;
        if record.status == TaskStatus::Running {
            record.status = TaskStatus::Idle;
        }
        Ok(())
    }

    /// Transition a Task to a terminal status, write the footer, then
    /// promote the next queued Task if this one was running.
    pub async fn complete(&self, id: Uuid, mut final_status: TaskStatus) -> Result<(), OrchestratorError> {
        if !final_status.is_terminal() {
            final_status = TaskStatus::Error;
        }

        let snapshot = {
            let mut records = self.inner.records.write().await;
            let record = records.get_mut(&id).ok_or(OrchestratorError::NotFound(id))?;
            if record.is_terminal() {
                return Err(OrchestratorError::AlreadyTerminal(id));
            }
            if final_status == TaskStatus::Completed {
                record.progress_percentage = Some(100);
            }
            record.status = final_status;
            let terminal_at = Local::now();
            record.terminal_at = Some(terminal_at);

            let duration = record
                .started_at
                .map(|s| (terminal_at - s).num_seconds())
                .unwrap_or(0);

            let path = self.inner.config.task_log_path(id);
            let footer = Footer {
                stopped: final_status == TaskStatus::Stopped,
                final_status,
                duration_secs: duration,
                progress_percentage: record.progress_percentage,
                current_step: record.current_step,
                total_steps: record.total_steps,
                system: record.system.as_deref(),
                stats: &record.stats,
            };
            task_log::write_footer(&path, &footer, terminal_at)?;
            record.clone()
        };

        self.inner.cancel_flags.write().await.remove(&id);
        self.broadcast(id, LogEvent::Terminal(format!("{final_status}"))).await;
        info!("task {id} finished: {final_status}");

        {
            let mut running = self.inner.running.write().await;
            if *running == Some(id) {
                *running = None;
                self.promote_next(&mut running).await?;
            }
        }

        self.enforce_retention().await;
        let _ = snapshot;
        Ok(())
    }

    async fn promote_next(&self, running: &mut Option<Uuid>) -> Result<(), OrchestratorError> {
        let next_id = self.inner.queue.lock().await.pop_front();
        let Some(next_id) = next_id else { return Ok(()) };

        let submission = {
            let records = self.inner.records.read().await;
            let record = records.get(&next_id).ok_or(OrchestratorError::NotFound(next_id))?;
            TaskSubmission {
                id: record.id,
                kind: record.kind,
                username: record.username.clone(),
                system: record.system.clone(),
                data: record.data.clone(),
            }
        };
        self.start_locked(&submission, running).await
    }

    /// `StopTask(id)` (§4.6 "Stop protocol"). A queued Task is removed
    /// without side effects. A running Task gets its cancel flag set; the
    /// caller (worker/pipeline) is expected to call `complete(id,
    /// Stopped)` once it has flushed partial state. If it doesn't within
    /// the grace period, the orchestrator force-finalizes it.
    pub async fn stop(&self, id: Uuid) -> Result<(), OrchestratorError> {
        {
            let mut queue = self.inner.queue.lock().await;
            if let Some(pos) = queue.iter().position(|q| *q == id) {
                queue.remove(pos);
                let mut records = self.inner.records.write().await;
                if let Some(record) = records.get_mut(&id) {
                    record.status = TaskStatus::Stopped;
                    record.terminal_at = Some(Local::now());
                }
                return Ok(());
            }
        }

        let Some(flag) = self.cancel_flag(id).await else {
            return Err(OrchestratorError::NotFound(id));
        };
        flag.store(true, Ordering::SeqCst);

        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(STOP_GRACE).await;
            let still_running = this.inner.running.read().await.as_ref() == Some(&id);
            if still_running {
                warn!("task {id} did not acknowledge stop within grace period, forcing");
                let _ = this.complete(id, TaskStatus::Stopped).await;
            }
        });
        Ok(())
    }

    /// Background loop force-erroring Tasks stuck `idle` too long (§4.6
    /// "Stuck-task sweeper"). Call once at startup; it runs for the life
    /// of the process.
    pub fn spawn_sweeper(&self, interval: std::time::Duration) {
        let this = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                this.sweep_stuck_tasks().await;
            }
        });
    }

    async fn sweep_stuck_tasks(&self) {
        let now = Local::now();
        let stuck: Vec<Uuid> = {
            let records = self.inner.records.read().await;
            records
                .values()
                .filter(|r| {
                    r.status == TaskStatus::Idle
                        && r.started_at.is_some_and(|s| now - s > STUCK_IDLE_THRESHOLD)
                })
                .map(|r| r.id)
                .collect()
        };
        for id in stuck {
            warn!("task {id} stuck in idle, forcing error");
            if let Err(e) = self.force_error(id, "stuck in idle").await {
                warn!("failed to force-error stuck task {id}: {e}");
            }
        }
    }

    async fn force_error(&self, id: Uuid, message: &str) -> Result<(), OrchestratorError> {
        let path = self.inner.config.task_log_path(id);
        let _ = task_log::append_line(&path, message);
        self.complete(id, TaskStatus::Error).await
    }

    /// Evict oldest terminal Tasks from memory once the ceiling is
    /// exceeded, deleting their log files (§4.6 "Retention"). Non-terminal
    /// Tasks are never evicted.
    async fn enforce_retention(&self) {
        let ceiling = self.inner.config.max_tasks_to_keep;
        let mut records = self.inner.records.write().await;
        if records.len() <= ceiling {
            return;
        }

        let mut terminal: Vec<(Uuid, chrono::DateTime<Local>)> = records
            .values()
            .filter(|r| r.is_terminal())
            .map(|r| (r.id, r.terminal_at.unwrap_or(Local::now())))
            .collect();
        terminal.sort_by_key(|(_, at)| *at);

        let overflow = records.len() - ceiling;
        for (id, _) in terminal.into_iter().take(overflow) {
            records.remove(&id);
            let path = self.inner.config.task_log_path(id);
            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("failed to delete evicted task log {path:?}: {e}");
                }
            }
        }
    }

    async fn broadcast(&self, id: Uuid, event: LogEvent) {
        let subscribers = self.inner.subscribers.read().await;
        if let Some(tx) = subscribers.get(&id) {
            let _ = tx.send(event);
        }
    }

    /// Open a live stream for a running Task: the caller gets the file's
    /// current contents plus a receiver for subsequent deltas and the
    /// final snapshot (§4.6 "Streaming"). Throttling incremental delivery
    /// to 200ms windows is the subscriber's concern on the receiving end;
    /// this only guarantees in-order delivery.
    pub async fn subscribe(&self, id: Uuid) -> Result<(String, broadcast::Receiver<LogEvent>), OrchestratorError> {
        let path = self.inner.config.task_log_path(id);
        let initial = task_log::read_full(&path)?;

        let mut subscribers = self.inner.subscribers.write().await;
        let tx = subscribers.entry(id).or_insert_with(|| broadcast::channel(256).0);
        Ok((initial, tx.subscribe()))
    }

    pub async fn record(&self, id: Uuid) -> Option<TaskRecord> {
        self.inner.records.read().await.get(&id).cloned()
    }

    pub async fn records_snapshot(&self) -> Vec<TaskRecord> {
        self.inner.records.read().await.values().cloned().collect()
    }

    pub async fn queue_snapshot(&self) -> Vec<Uuid> {
        self.inner.queue.lock().await.iter().copied().collect()
    }

    pub async fn running_id(&self) -> Option<Uuid> {
        *self.inner.running.read().await
    }

    pub fn task_logs_directory(&self) -> PathBuf {
        self.inner.config.task_logs_directory.clone()
    }

    pub fn config(&self) -> &VaultConfig {
        &self.inner.config
    }
}

/// Aggregate stats helper: fold a worker's final result into the
/// `stats_delta` shape `record_progress` expects.
pub fn stats_from_counts(pairs: impl IntoIterator<Item = (&'static str, i64)>) -> BTreeMap<String, i64> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultkeeper_core::TaskKind;

    fn config(dir: &std::path::Path) -> VaultConfig {
        let mut cfg = VaultConfig::default();
        cfg.task_logs_directory = dir.to_path_buf();
        cfg.max_tasks_to_keep = 100;
        cfg
    }

    fn submission(id: Uuid) -> TaskSubmission {
        TaskSubmission {
            id,
            kind: TaskKind::RomScan,
            username: "alice".to_string(),
            system: Some("snes".to_string()),
            data: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn second_submission_queues_while_first_runs() {
        let dir = tempfile::tempdir().unwrap();
        let orch = Orchestrator::new(config(dir.path()));

        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        orch.submit(submission(first)).await.unwrap();
        orch.submit(submission(second)).await.unwrap();

        assert_eq!(orch.running_id().await, Some(first));
        assert_eq!(orch.queue_snapshot().await, vec![second]);

        orch.complete(first, TaskStatus::Completed).await.unwrap();
        assert_eq!(orch.running_id().await, Some(second));
        assert!(orch.queue_snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn progress_percentage_is_monotonic() {
        let dir = tempfile::tempdir().unwrap();
        let orch = Orchestrator::new(config(dir.path()));
        let id = Uuid::new_v4();
        orch.submit(submission(id)).await.unwrap();

        orch.record_progress(ProgressUpdate {
            task_id: id,
            message: "halfway".to_string(),
            progress_percentage: Some(50),
            current_step: None,
            total_steps: None,
            stats_delta: Default::default(),
        })
        .await
        .unwrap();

        orch.record_progress(ProgressUpdate {
            task_id: id,
            message: "regressed".to_string(),
            progress_percentage: Some(10),
            current_step: None,
            total_steps: None,
            stats_delta: Default::default(),
        })
        .await
        .unwrap();

        assert_eq!(orch.record(id).await.unwrap().progress_percentage, Some(50));
    }

    #[tokio::test]
    async fn completion_snaps_percentage_to_100() {
        let dir = tempfile::tempdir().unwrap();
        let orch = Orchestrator::new(config(dir.path()));
        let id = Uuid::new_v4();
        orch.submit(submission(id)).await.unwrap();
        orch.complete(id, TaskStatus::Completed).await.unwrap();
        assert_eq!(orch.record(id).await.unwrap().progress_percentage, Some(100));
    }

    #[tokio::test]
    async fn queued_stop_removes_without_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let orch = Orchestrator::new(config(dir.path()));
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        orch.submit(submission(first)).await.unwrap();
        orch.submit(submission(second)).await.unwrap();

        orch.stop(second).await.unwrap();
        assert!(orch.queue_snapshot().await.is_empty());
        assert_eq!(orch.record(second).await.unwrap().status, TaskStatus::Stopped);
        assert!(!dir.path().join(format!("{second}.log")).exists());
    }

    #[tokio::test]
    async fn reload_history_marks_dangling_task_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let id = Uuid::new_v4();
        let path = dir.path().join(format!("{id}.log"));
        task_log::write_header(&path, &submission(id), Local::now()).unwrap();
        task_log::append_line(&path, "midway").unwrap();

        let orch = Orchestrator::new(config(dir.path()));
        let loaded = orch.reload_history().await.unwrap();
        assert_eq!(loaded, 1);
        let record = orch.record(id).await.unwrap();
        assert_eq!(record.status, TaskStatus::Stopped);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("Task stopped"));
    }

    #[tokio::test]
    async fn retention_evicts_oldest_terminal_tasks_first() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.max_tasks_to_keep = 1;
        let orch = Orchestrator::new(cfg);

        let first = Uuid::new_v4();
        orch.submit(submission(first)).await.unwrap();
        orch.complete(first, TaskStatus::Completed).await.unwrap();

        let second = Uuid::new_v4();
        orch.submit(submission(second)).await.unwrap();
        orch.complete(second, TaskStatus::Completed).await.unwrap();

        assert!(orch.record(first).await.is_none());
        assert!(orch.record(second).await.is_some());
        assert!(!dir.path().join(format!("{first}.log")).exists());
    }
}
