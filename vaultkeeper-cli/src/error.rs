use thiserror::Error;

/// Errors surfaced at the CLI boundary. Command handlers map whatever
/// the underlying crate returned into one of these before printing.
#[derive(Debug, Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("unknown task: {0}")]
    UnknownTask(uuid::Uuid),

    #[error("orchestrator error: {0}")]
    Orchestrator(#[from] vaultkeeper_orchestrator::OrchestratorError),

    #[error("catalog error: {0}")]
    Catalog(#[from] vaultkeeper_catalog::CatalogError),

    #[error("reconcile error: {0}")]
    Reconcile(#[from] vaultkeeper_reconcile::ReconcileError),

    #[error("worker error: {0}")]
    Worker(#[from] vaultkeeper_worker::WorkerError),

    #[error("{0}")]
    Other(String),
}

impl CliError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub(crate) fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}
