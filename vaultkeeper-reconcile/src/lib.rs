//! The Media Reconciler: aligns catalog media fields with what's
//! actually present on disk.

pub mod error;
pub mod mapping;
pub mod reconcile;

pub use error::ReconcileError;
pub use mapping::{categories_from_config, MediaCategory};
pub use reconcile::{reconcile_system, ReconcileStats};
