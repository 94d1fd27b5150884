use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("no platform view available for matching")]
    EmptyView,
}
