//! `vaultkeeper scrape`: submit one Scraping Task, drive the scraping
//! worker child process to completion, and print its progress. This is
//! the one command that exercises the full Task Orchestrator / Scraping
//! Worker / Change Notification Fabric pipeline end to end; everything
//! else only reads Task logs after the fact.

use std::io::BufRead;
use std::path::PathBuf;

use uuid::Uuid;
use vaultkeeper_core::{TaskKind, TaskStatus, TaskSubmission, TextField, VaultConfig};
use vaultkeeper_notify::{Envelope, NotificationFabric, SystemAction};
use vaultkeeper_orchestrator::Orchestrator;
use vaultkeeper_worker::handle::WorkerHandle;
use vaultkeeper_worker::ipc::{CandidateDto, ResultQueueMessage, TaskQueueMessage, WorkerSubmission};

use crate::error::CliError;

fn worker_binary_path() -> Result<PathBuf, CliError> {
    let exe = std::env::current_exe()?;
    let dir = exe.parent().ok_or_else(|| CliError::other("couldn't determine the binary's own directory"))?;
    let name = if cfg!(windows) { "vaultkeeper-scrape-worker.exe" } else { "vaultkeeper-scrape-worker" };
    Ok(dir.join(name))
}

#[allow(clippy::too_many_arguments)]
pub(crate) async fn run_scrape(
    config: &VaultConfig,
    system: String,
    corpus: PathBuf,
    only: Option<Vec<String>>,
    review_partial: bool,
    overwrite_text_fields: bool,
    selected_fields: Option<Vec<TextField>>,
) -> Result<(), CliError> {
    let orchestrator = Orchestrator::new(config.clone());
    orchestrator.reload_history().await?;
    let fabric = NotificationFabric::new();

    let task_id = Uuid::new_v4();
    let submission = TaskSubmission {
        id: task_id,
        kind: TaskKind::Scraping,
        username: whoami(),
        system: Some(system.clone()),
        data: serde_json::json!({ "corpus": corpus, "only": only, "review_partial": review_partial }),
    };
    orchestrator.submit(submission).await?;

    let worker = WorkerHandle::spawn(&worker_binary_path()?)?;
    let region_priority = config
        .providers
        .values()
        .find(|p| !p.region_priority.is_empty())
        .map(|p| p.region_priority.clone())
        .unwrap_or_default();

    worker
        .submit(&TaskQueueMessage::Submit(WorkerSubmission {
            task_id,
            corpus_path: corpus,
            platform: system.clone(),
            catalog_path: config.gamelist_path(&system),
            selected_paths: only,
            partial_match_review: review_partial,
            region_priority,
            overwrite_text_fields,
            selected_fields: selected_fields.clone(),
        }))
        .await?;

    let outcome = loop {
        let Some(message) = worker.recv().await else {
            log::warn!("scraping worker exited without a final result for task {task_id}");
            break None;
        };
        match message {
            ResultQueueMessage::Progress { task_id, message, progress_percentage, current_step, total_steps, stats_delta } => {
                log::info!("{message}");
                fabric.publish_envelope(Envelope::TaskProgress {
                    task_id,
                    message: message.clone(),
                    progress_percentage,
                    current_step,
                    total_steps,
                    stats: stats_delta.clone(),
                });
                orchestrator
                    .record_progress(vaultkeeper_core::ProgressUpdate {
                        task_id,
                        message,
                        progress_percentage,
                        current_step,
                        total_steps,
                        stats_delta,
                    })
                    .await?;
            }
            ResultQueueMessage::PartialMatchRequest { task_id, game_path, candidates } => {
                if candidates.is_empty() {
                    log::info!("fuzzy match for {game_path}: no candidates, leaving as no-match");
                    continue;
                }
                if let Some(database_id) = prompt_for_candidate(&game_path, &candidates).await {
                    worker
                        .submit(&TaskQueueMessage::ApplyCandidate { task_id, game_path: game_path.clone(), database_id })
                        .await?;
                } else {
                    log::info!("leaving \"{game_path}\" as no-match");
                }
            }
            ResultQueueMessage::CandidateApplied { game_path, success, .. } => {
                if success {
                    log::info!("applied candidate to \"{game_path}\"");
                } else {
                    log::warn!("could not apply candidate to \"{game_path}\": game or corpus entry not found");
                }
            }
            ResultQueueMessage::Final { success, stats, matched_paths, .. } => {
                break Some((success, stats, matched_paths));
            }
        }
    };

    worker.shutdown().await?;

    let (success, matched_paths) = match outcome {
        Some((success, stats, matched_paths)) => {
            log::info!("matched {} of {} game(s)", matched_paths.len(), stats.values().sum::<i64>().max(matched_paths.len() as i64));
            (success, matched_paths)
        }
        None => (false, Vec::new()),
    };

    let final_status = if success { TaskStatus::Completed } else { TaskStatus::Error };
    orchestrator.complete(task_id, final_status).await?;

    // Only a normal completion hands matched entries off for art; a
    // stopped task leaves them for the next scrape to pick up (§4.7
    // step 6, scenario 4).
    if success && !matched_paths.is_empty() {
        orchestrator
            .submit(TaskSubmission {
                id: Uuid::new_v4(),
                kind: TaskKind::ImageDownload,
                username: whoami(),
                system: Some(system.clone()),
                data: serde_json::json!({ "paths": matched_paths, "scraped_from": task_id }),
            })
            .await?;
    }

    fabric.publish(
        &system,
        Envelope::SystemUpdated {
            system: system.clone(),
            action: SystemAction::GamelistUpdated,
            data: serde_json::Value::Null,
            ts: chrono::Utc::now(),
        },
    );
    fabric.publish(&system.clone(), Envelope::TaskCompleted { task_id, success, system: Some(system) });

    if !success {
        return Err(CliError::other(format!("task {task_id} did not complete successfully, see its log for details")));
    }
    Ok(())
}

/// Prints the top candidates and blocks on a stdin line picking one
/// (§4.7 "Partial-match review": "a subsequent API call from the user
/// applies a selected candidate"). Runs on a blocking thread so it
/// doesn't stall the progress-reading task.
async fn prompt_for_candidate(game_path: &str, candidates: &[CandidateDto]) -> Option<String> {
    let game_path = game_path.to_string();
    let candidates = candidates.to_vec();
    tokio::task::spawn_blocking(move || {
        println!("fuzzy match for \"{game_path}\":");
        for (i, c) in candidates.iter().enumerate() {
            println!("  [{}] {} (score {:.2}, id {})", i + 1, c.name, c.score, c.database_id);
        }
        println!("  [0] skip, leave as no-match");
        print!("choose> ");
        let _ = std::io::Write::flush(&mut std::io::stdout());

        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line).ok()?;
        let choice: usize = line.trim().parse().ok()?;
        if choice == 0 || choice > candidates.len() {
            return None;
        }
        Some(candidates[choice - 1].database_id.clone())
    })
    .await
    .ok()
    .flatten()
}

fn whoami() -> String {
    std::env::var("USER").or_else(|_| std::env::var("USERNAME")).unwrap_or_else(|_| "cli".to_string())
}
