//! Event: an immutable record of something that happened.
//!
//! Events are produced when entity state changes, entities are registered,
//! or an integration hears from a device it does not know yet.

use serde::{Deserialize, Serialize};

use crate::id::{EntityId, EventId};
use crate::time::Timestamp;

/// What kind of thing happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    StateChanged,
    EntityCreated,
    DeviceDetected,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StateChanged => f.write_str("state_changed"),
            Self::EntityCreated => f.write_str("entity_created"),
            Self::DeviceDetected => f.write_str("device_detected"),
        }
    }
}

/// An immutable event record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub event_type: EventType,
    /// The entity concerned, when there is one.
    pub entity_id: Option<EntityId>,
    pub data: serde_json::Value,
    pub timestamp: Timestamp,
}

impl Event {
    /// Create a new event stamped with the current time.
    #[must_use]
    pub fn new(
        event_type: EventType,
        entity_id: Option<EntityId>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            id: EventId::new(),
            event_type,
            entity_id,
            data,
            timestamp: crate::time::now(),
        }
    }
}
