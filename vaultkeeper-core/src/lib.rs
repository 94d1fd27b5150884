pub mod config;
pub mod game;
pub mod task;
pub mod worker_pool;

pub use config::VaultConfig;
pub use game::{promote_name, region_token_in, Game, MediaField, TextField};
pub use task::{ProgressUpdate, TaskKind, TaskStatus, TaskSubmission};
pub use worker_pool::WorkerPool;
