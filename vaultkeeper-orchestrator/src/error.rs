use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("task {0} not found")]
    NotFound(Uuid),

    #[error("task {0} is already terminal")]
    AlreadyTerminal(Uuid),
}
