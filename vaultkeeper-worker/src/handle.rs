//! Parent-side control of the child scraping process (§4.7 "Deployment").
//! Started lazily on first scraping submission and kept alive afterward;
//! the orchestrator holds one `WorkerHandle` for the life of the process.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::error::WorkerError;
use crate::ipc::{read_message, write_message, ResultQueueMessage, TaskQueueMessage};

pub struct WorkerHandle {
    child: Mutex<Child>,
    stdin: Mutex<tokio::process::ChildStdin>,
    results: Mutex<mpsc::UnboundedReceiver<ResultQueueMessage>>,
}

impl WorkerHandle {
    /// Spawn the worker binary at `exe` and start a background task
    /// forwarding its stdout lines as decoded `ResultQueueMessage`s.
    pub fn spawn(exe: &std::path::Path) -> Result<Self, WorkerError> {
        let mut child = Command::new(exe)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        let stdin = child.stdin.take().expect("piped stdin");
        let stdout = child.stdout.take().expect("piped stdout");

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            loop {
                match read_message::<_, ResultQueueMessage>(&mut reader).await {
                    Ok(Some(message)) => {
                        if tx.send(message).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        log::warn!("scraping worker sent an unparseable message: {e}");
                    }
                }
            }
        });

        Ok(Self {
            child: Mutex::new(child),
            stdin: Mutex::new(stdin),
            results: Mutex::new(rx),
        })
    }

    pub async fn submit(&self, message: &TaskQueueMessage) -> Result<(), WorkerError> {
        let mut stdin = self.stdin.lock().await;
        write_message(&mut *stdin, message).await
    }

    pub async fn stop(&self, task_id: Uuid) -> Result<(), WorkerError> {
        self.submit(&TaskQueueMessage::Stop { task_id }).await
    }

    /// Await the next message from the child. Returns `None` once the
    /// child's stdout has closed (process exited).
    pub async fn recv(&self) -> Option<ResultQueueMessage> {
        self.results.lock().await.recv().await
    }

    pub async fn shutdown(&self) -> Result<(), WorkerError> {
        let mut child = self.child.lock().await;
        child.kill().await?;
        Ok(())
    }
}
