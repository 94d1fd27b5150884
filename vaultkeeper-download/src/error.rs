use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("downloaded file was empty: {0}")]
    EmptyFile(String),

    #[error("cancelled")]
    Cancelled,
}

impl DownloadError {
    /// §4.4 "Failures": 4xx other than 401/403/429 are terminal,
    /// everything else (connection errors, 429, 5xx) is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            DownloadError::Http(e) => match e.status() {
                Some(status) => {
                    status.as_u16() == 429 || status.is_server_error()
                }
                None => true,
            },
            DownloadError::Io(_) | DownloadError::EmptyFile(_) => true,
            DownloadError::Cancelled => false,
        }
    }
}
