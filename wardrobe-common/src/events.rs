//! Event types and the event bus
//!
//! Services emit `PlannerEvent`s after each state change so a front end can
//! refresh without polling. Delivery is best-effort: events emitted while
//! nobody is subscribed are dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Wardrobe planner events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlannerEvent {
    /// New items stored
    ItemsAdded {
        item_ids: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// Item metadata changed
    ItemUpdated {
        item_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Items and their blobs removed
    ItemsDeleted {
        item_ids: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// Both wardrobe namespaces emptied
    WardrobeCleared { timestamp: DateTime<Utc> },

    /// Generation state went idle -> generating
    GenerationStarted {
        occasion: String,
        timestamp: DateTime<Utc>,
    },

    /// Generation state went generating -> idle with a new batch
    GenerationCompleted {
        candidates: usize,
        enriched: bool,
        timestamp: DateTime<Utc>,
    },

    /// Generation state went generating -> idle without a batch
    GenerationFailed {
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Ephemeral batch discarded
    GeneratedCleared { timestamp: DateTime<Utc> },

    /// Saved outfit collection persisted
    OutfitsChanged {
        total: usize,
        timestamp: DateTime<Utc>,
    },
}

impl PlannerEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            PlannerEvent::ItemsAdded { .. } => "ItemsAdded",
            PlannerEvent::ItemUpdated { .. } => "ItemUpdated",
            PlannerEvent::ItemsDeleted { .. } => "ItemsDeleted",
            PlannerEvent::WardrobeCleared { .. } => "WardrobeCleared",
            PlannerEvent::GenerationStarted { .. } => "GenerationStarted",
            PlannerEvent::GenerationCompleted { .. } => "GenerationCompleted",
            PlannerEvent::GenerationFailed { .. } => "GenerationFailed",
            PlannerEvent::GeneratedCleared { .. } => "GeneratedCleared",
            PlannerEvent::OutfitsChanged { .. } => "OutfitsChanged",
        }
    }
}

/// Broadcast bus shared by all services of one planner instance
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlannerEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow subscribers lose the oldest events once `capacity` is exceeded.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<PlannerEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: PlannerEvent,
    ) -> Result<usize, broadcast::error::SendError<PlannerEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: PlannerEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}
