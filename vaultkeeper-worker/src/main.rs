//! The scraping worker's child-process entry point (§4.7 "Deployment").
//! Reads `TaskQueueMessage`s from stdin, processes submissions one at a
//! time, and writes `ResultQueueMessage`s to stdout. A background reader
//! task keeps accepting `Stop` messages while a submission is running, so
//! cancellation lands as soon as the main loop polls it between games.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{stdin, stdout, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use vaultkeeper_worker::ipc::{read_message, write_message, ResultQueueMessage, TaskQueueMessage, WorkerSubmission};
use vaultkeeper_worker::process;

type CancelMap = Arc<Mutex<HashMap<Uuid, Arc<AtomicBool>>>>;
/// Submissions seen so far, kept around (not evicted on completion) so an
/// `ApplyCandidate` arriving after a submission's `Final` result still
/// knows which corpus/catalog/field settings to apply it with (§4.7
/// "Partial-match review").
type SubmissionMap = Arc<Mutex<HashMap<Uuid, WorkerSubmission>>>;

#[tokio::main]
async fn main() {
    env_logger::init();

    let cancel_map: CancelMap = Arc::new(Mutex::new(HashMap::new()));
    let submissions: SubmissionMap = Arc::new(Mutex::new(HashMap::new()));
    let (submit_tx, mut submit_rx) = mpsc::unbounded_channel();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ResultQueueMessage>();

    let reader_cancel_map = cancel_map.clone();
    let reader_submissions = submissions.clone();
    let apply_out_tx = out_tx.clone();
    tokio::spawn(async move {
        let mut reader = BufReader::new(stdin());
        loop {
            match read_message::<_, TaskQueueMessage>(&mut reader).await {
                Ok(Some(TaskQueueMessage::Submit(submission))) => {
                    reader_cancel_map
                        .lock()
                        .await
                        .insert(submission.task_id, Arc::new(AtomicBool::new(false)));
                    reader_submissions.lock().await.insert(submission.task_id, submission.clone());
                    if submit_tx.send(submission).is_err() {
                        break;
                    }
                }
                Ok(Some(TaskQueueMessage::Stop { task_id })) => {
                    if let Some(flag) = reader_cancel_map.lock().await.get(&task_id) {
                        flag.store(true, Ordering::SeqCst);
                    }
                }
                Ok(Some(TaskQueueMessage::ApplyCandidate { task_id, game_path, database_id })) => {
                    let Some(submission) = reader_submissions.lock().await.get(&task_id).cloned() else {
                        log::warn!("apply-candidate for unknown task {task_id}, ignoring");
                        continue;
                    };
                    let emit_tx = apply_out_tx.clone();
                    tokio::task::spawn_blocking(move || {
                        let result = process::apply_candidate(
                            &submission.corpus_path,
                            &submission.catalog_path,
                            &submission.platform,
                            &game_path,
                            &database_id,
                            submission.overwrite_text_fields,
                            submission.selected_fields.as_deref(),
                        );
                        let success = match result {
                            Ok(applied) => applied,
                            Err(e) => {
                                log::error!("apply-candidate for task {task_id} failed: {e}");
                                false
                            }
                        };
                        let _ = emit_tx.send(ResultQueueMessage::CandidateApplied { task_id, game_path, success });
                    });
                }
                Ok(None) => break,
                Err(e) => log::warn!("malformed message from parent: {e}"),
            }
        }
    });

    tokio::spawn(async move {
        let mut out = stdout();
        while let Some(message) = out_rx.recv().await {
            if write_message(&mut out, &message).await.is_err() {
                break;
            }
        }
    });

    while let Some(submission) = submit_rx.recv().await {
        let task_id = submission.task_id;
        let flag = cancel_map
            .lock()
            .await
            .get(&task_id)
            .cloned()
            .unwrap_or_else(|| Arc::new(AtomicBool::new(false)));

        let emit_tx = out_tx.clone();
        let cancel_flag = flag.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            process::run_submission(
                task_id,
                &submission,
                |message| {
                    let _ = emit_tx.send(message);
                },
                || cancel_flag.load(Ordering::SeqCst),
            )
        })
        .await;

        cancel_map.lock().await.remove(&task_id);

        let final_message = match outcome {
            Ok(Ok(result)) => ResultQueueMessage::Final {
                task_id,
                success: result.success,
                stats: result.stats,
                matched_paths: result.matched_paths,
            },
            Ok(Err(e)) => {
                log::error!("task {task_id} failed: {e}");
                ResultQueueMessage::Final {
                    task_id,
                    success: false,
                    stats: Default::default(),
                    matched_paths: Vec::new(),
                }
            }
            Err(e) => {
                log::error!("task {task_id} panicked: {e}");
                ResultQueueMessage::Final {
                    task_id,
                    success: false,
                    stats: Default::default(),
                    matched_paths: Vec::new(),
                }
            }
        };
        let _ = out_tx.send(final_message);
    }

    let mut out = stdout();
    let _ = out.flush().await;
}
