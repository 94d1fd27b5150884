//! `vaultkeeper task ...`: inspect and control Tasks from their log
//! files. Since this binary doesn't run as a background service, a
//! freshly constructed `Orchestrator` only knows about a Task as
//! `reload_history` reconstructs it from disk — there's no live
//! in-process record of a Task another invocation started, so `stop`
//! can only act on a Task still tracked by the process that started it.

use owo_colors::OwoColorize;
use uuid::Uuid;
use vaultkeeper_core::VaultConfig;
use vaultkeeper_orchestrator::{Orchestrator, OrchestratorError};

use crate::error::CliError;

pub(crate) async fn run_list(config: &VaultConfig) -> Result<(), CliError> {
    let orch = Orchestrator::new(config.clone());
    orch.reload_history().await?;

    let mut records = orch.records_snapshot().await;
    records.sort_by_key(|r| std::cmp::Reverse(r.started_at));

    if records.is_empty() {
        log::info!("no tasks recorded under {:?}", config.task_logs_directory);
        return Ok(());
    }

    for record in records {
        let status = record.status.to_string();
        let colored_status = if record.status.is_terminal() {
            status.if_supports_color(owo_colors::Stream::Stdout, |t| t.dimmed()).to_string()
        } else {
            status.if_supports_color(owo_colors::Stream::Stdout, |t| t.green()).to_string()
        };
        println!(
            "{}  {:<16} {:<10} {:<10} {}",
            record.id,
            record.kind.to_string(),
            colored_status,
            record.system.as_deref().unwrap_or("-"),
            record.progress_percentage.map(|p| format!("{p}%")).unwrap_or_default(),
        );
    }
    Ok(())
}

pub(crate) async fn run_show(config: &VaultConfig, id: Uuid) -> Result<(), CliError> {
    let path = config.task_log_path(id);
    let contents = std::fs::read_to_string(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            CliError::UnknownTask(id)
        } else {
            CliError::Io(e)
        }
    })?;
    print!("{contents}");
    Ok(())
}

pub(crate) async fn run_stop(config: &VaultConfig, id: Uuid) -> Result<(), CliError> {
    let orch = Orchestrator::new(config.clone());
    orch.reload_history().await?;

    match orch.stop(id).await {
        Ok(()) => {
            log::info!("stop requested for task {id}");
            Ok(())
        }
        Err(OrchestratorError::NotFound(_)) => {
            log::warn!(
                "task {id} isn't active in this process; send the stop request to the process that started it"
            );
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
