use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("catalog not found: {0}")]
    NotFound(String),

    #[error("malformed catalog at byte {offset:?}: {message}")]
    Malformed {
        message: String,
        offset: Option<usize>,
    },

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
}

impl CatalogError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
            offset: None,
        }
    }

    pub fn malformed_at(message: impl Into<String>, offset: usize) -> Self {
        Self::Malformed {
            message: message.into(),
            offset: Some(offset),
        }
    }
}
