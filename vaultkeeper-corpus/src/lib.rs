//! The Metadata Corpus Cache: loads the global game-metadata XML once
//! and exposes platform-scoped views for the Match Engine.

pub mod archive;
pub mod entry;
pub mod error;
pub mod index;
pub mod xml;

pub use archive::update_corpus_archive;
pub use entry::{CorpusEntry, ImageDescriptor};
pub use error::CorpusError;
pub use index::{build_platform_view_from_bytes, build_platform_view_from_file, CorpusCache, CorpusState, PlatformView};
