//! Best-effort, at-most-once broadcast of courier positions.
//!
//! A courier sharing location publishes into a room keyed by order id; any number of subscribers
//! fan the updates out. Nothing is persisted: a subscriber joining after a publish misses the
//! prior positions, and a slow subscriber skips ahead to the newest ones. There is no
//! acknowledgment and no backpressure; only the latest position matters to the map on the other
//! end.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use log::*;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::db_types::OrderId;

/// The message contract carried by the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub order_id: OrderId,
    pub lat: f64,
    pub lng: f64,
    pub timestamp: DateTime<Utc>,
}

pub struct LocationRelay {
    rooms: Mutex<HashMap<OrderId, broadcast::Sender<PositionUpdate>>>,
    /// Per-room buffer. Small on purpose: lagging subscribers should skip stale positions.
    capacity: usize,
}

impl LocationRelay {
    pub fn new(capacity: usize) -> Self {
        Self { rooms: Mutex::new(HashMap::new()), capacity: capacity.max(1) }
    }

    /// Publishes a position to the order's room, returning the number of live subscribers it
    /// reached. A room with no subscribers is pruned on the spot; publishing into the void is
    /// fine and costs nothing.
    pub fn publish(&self, update: PositionUpdate) -> usize {
        let mut rooms = self.rooms.lock().expect("relay lock poisoned");
        let order_id = update.order_id.clone();
        match rooms.get(&order_id) {
            Some(tx) => match tx.send(update) {
                Ok(n) => {
                    trace!("📡️ Position for order {order_id} reached {n} subscriber(s)");
                    n
                },
                Err(_) => {
                    // The last subscriber left; drop the room.
                    rooms.remove(&order_id);
                    trace!("📡️ Room for order {order_id} pruned (no subscribers)");
                    0
                },
            },
            None => 0,
        }
    }

    /// Joins the room for an order, creating it on first use. The receiver sees only positions
    /// published after this call.
    pub fn subscribe(&self, order_id: &OrderId) -> broadcast::Receiver<PositionUpdate> {
        let mut rooms = self.rooms.lock().expect("relay lock poisoned");
        match rooms.get(order_id) {
            Some(tx) => tx.subscribe(),
            None => {
                let (tx, rx) = broadcast::channel(self.capacity);
                rooms.insert(order_id.clone(), tx);
                debug!("📡️ Opened location room for order {order_id}");
                rx
            },
        }
    }

    /// Number of currently open rooms. Mostly for diagnostics and tests.
    pub fn room_count(&self) -> usize {
        self.rooms.lock().expect("relay lock poisoned").len()
    }
}
