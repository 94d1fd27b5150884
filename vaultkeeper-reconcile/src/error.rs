use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Catalog(#[from] vaultkeeper_catalog::CatalogError),
}
