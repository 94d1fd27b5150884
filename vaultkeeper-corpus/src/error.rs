use thiserror::Error;

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("corpus download failed: {0}")]
    Download(String),

    #[error("malformed corpus entry: {0}")]
    Malformed(String),

    #[error("unknown platform: {0}")]
    UnknownPlatform(String),
}

impl CorpusError {
    pub fn download(message: impl Into<String>) -> Self {
        Self::Download(message.into())
    }
}
