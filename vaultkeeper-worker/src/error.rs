use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Corpus(#[from] vaultkeeper_corpus::CorpusError),

    #[error(transparent)]
    Catalog(#[from] vaultkeeper_catalog::CatalogError),

    #[error("malformed IPC line: {0}")]
    MalformedMessage(String),

    #[error("worker process exited unexpectedly")]
    ProcessExited,
}
