//! The Parallel Media Downloader: a long-lived, bounded-concurrency
//! pipeline for fetching selected media images per catalog entry.

pub mod client;
pub mod error;
pub mod pipeline;
pub mod region;

pub use error::DownloadError;
pub use pipeline::{should_download, DownloadPipeline, DownloadResult, DownloadTask};
pub use region::{region_priority_for_game, select_best_media};
