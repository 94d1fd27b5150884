//! The Change Notification Fabric (§4.8): a room-per-system broadcaster.

pub mod envelope;
pub mod fabric;

pub use envelope::{Envelope, SystemAction};
pub use fabric::NotificationFabric;
