//! The Scraping Worker (§4.7): a lazily-spawned child process that runs
//! the per-game match loop out of the parent's address space.

pub mod error;
pub mod handle;
pub mod ipc;
pub mod process;

pub use error::WorkerError;
pub use handle::WorkerHandle;
