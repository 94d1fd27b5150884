//! The Change Notification Fabric (§4.8): one broadcast room per system
//! name. Grounded on `ConnectionManager`'s room registry, narrowed from
//! "track a `Vec<ConnectionId>` per room plus a side-channel broadcast
//! bus keyed by room code" to "a `broadcast::Sender` per room" directly —
//! `tokio::sync::broadcast::Sender::receiver_count()` already is the
//! tracked-subscriber count, so there's no separate bookkeeping list to
//! keep in sync with it.

use std::collections::HashMap;
use std::sync::Mutex;

use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::envelope::Envelope;

const ROOM_CAPACITY: usize = 256;

/// A pure broadcaster: it never persists an `Envelope`, so a client that
/// joins after a publish has already missed it (§4.8 "The fabric is a
/// pure broadcaster").
pub struct NotificationFabric {
    rooms: DashMap<String, broadcast::Sender<Envelope>>,
    /// Which room each client is currently tracked in. Guarded by a plain
    /// `Mutex` rather than `DashMap`'s sharded locking because §5 asks for
    /// a single process-wide lock with O(1) critical sections here.
    client_rooms: Mutex<HashMap<Uuid, String>>,
}

impl Default for NotificationFabric {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationFabric {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            client_rooms: Mutex::new(HashMap::new()),
        }
    }

    /// Join `system`'s room. If `client_id` was already tracked in a
    /// different room, that tracking is atomically replaced — the caller
    /// is expected to drop its old `Receiver` once it has the new one, at
    /// which point that room's `receiver_count()` reflects the move.
    pub fn join(&self, client_id: Uuid, system: &str) -> broadcast::Receiver<Envelope> {
        let sender = self
            .rooms
            .entry(system.to_string())
            .or_insert_with(|| broadcast::channel(ROOM_CAPACITY).0)
            .clone();

        let mut client_rooms = self.client_rooms.lock().unwrap();
        client_rooms.insert(client_id, system.to_string());
        sender.subscribe()
    }

    /// Stop tracking `client_id` in any room. Does not force-close its
    /// `Receiver`; dropping the receiver is what actually decrements
    /// `receiver_count()`.
    pub fn leave(&self, client_id: Uuid) {
        self.client_rooms.lock().unwrap().remove(&client_id);
    }

    pub fn current_room(&self, client_id: Uuid) -> Option<String> {
        self.client_rooms.lock().unwrap().get(&client_id).cloned()
    }

    /// Publish to `system`'s room. Silently a no-op if the room has no
    /// tracked subscribers or doesn't exist yet (§4.8 "Delivery").
    pub fn publish(&self, system: &str, envelope: Envelope) {
        if let Some(sender) = self.rooms.get(system) {
            let _ = sender.send(envelope);
        }
    }

    /// Convenience for events that already know their own room.
    pub fn publish_envelope(&self, envelope: Envelope) {
        if let Some(system) = envelope.room_hint().map(str::to_string) {
            self.publish(&system, envelope);
        } else {
            log::debug!("dropping envelope with no room hint and no explicit target");
        }
    }

    pub fn room_subscriber_count(&self, system: &str) -> usize {
        self.rooms.get(system).map(|s| s.receiver_count()).unwrap_or(0)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::SystemAction;

    #[test]
    fn publish_to_empty_room_is_a_silent_no_op() {
        let fabric = NotificationFabric::new();
        fabric.publish(
            "snes",
            Envelope::SystemUpdated {
                system: "snes".to_string(),
                action: SystemAction::GamelistUpdated,
                data: serde_json::Value::Null,
                ts: chrono::Utc::now(),
            },
        );
        assert_eq!(fabric.room_subscriber_count("snes"), 0);
    }

    #[test]
    fn rejoining_a_new_room_replaces_tracking_atomically() {
        let fabric = NotificationFabric::new();
        let client = Uuid::new_v4();
        let _rx_a = fabric.join(client, "snes");
        assert_eq!(fabric.current_room(client).as_deref(), Some("snes"));

        let _rx_b = fabric.join(client, "genesis");
        assert_eq!(fabric.current_room(client).as_deref(), Some("genesis"));
    }

    #[tokio::test]
    async fn delivers_to_all_subscribers_in_send_order() {
        let fabric = NotificationFabric::new();
        let client_a = Uuid::new_v4();
        let client_b = Uuid::new_v4();
        let mut rx_a = fabric.join(client_a, "snes");
        let mut rx_b = fabric.join(client_b, "snes");

        fabric.publish(
            "snes",
            Envelope::TaskCompleted { task_id: Uuid::new_v4(), success: true, system: Some("snes".to_string()) },
        );
        fabric.publish(
            "snes",
            Envelope::TaskCompleted { task_id: Uuid::new_v4(), success: false, system: Some("snes".to_string()) },
        );

        let first_a = rx_a.recv().await.unwrap();
        let second_a = rx_a.recv().await.unwrap();
        let first_b = rx_b.recv().await.unwrap();
        assert!(matches!(first_a, Envelope::TaskCompleted { success: true, .. }));
        assert!(matches!(second_a, Envelope::TaskCompleted { success: false, .. }));
        assert!(matches!(first_b, Envelope::TaskCompleted { success: true, .. }));
    }

    #[test]
    fn leave_stops_tracking_without_touching_the_room() {
        let fabric = NotificationFabric::new();
        let client = Uuid::new_v4();
        let _rx = fabric.join(client, "snes");
        fabric.leave(client);
        assert_eq!(fabric.current_room(client), None);
        assert_eq!(fabric.room_subscriber_count("snes"), 1);
    }
}
