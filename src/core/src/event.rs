//! Event publisher hook.
//!
//! The pipeline publishes progress events (acquisition started, layer read,
//! ...) to whatever [`EventPublisher`] the host installed. The default is
//! [`NoopPublisher`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Event key type
pub type EventKey = String;

/// Event payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventPayload {
    Empty,
    String(String),
    Map(HashMap<String, serde_json::Value>),
}

/// Image acquisition event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageEvent {
    /// Event key (e.g., "image.acquire.started", "image.layer.read")
    pub key: EventKey,

    /// Event payload
    pub payload: EventPayload,

    /// Timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ImageEvent {
    /// Create a new event
    pub fn new(key: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            key: key.into(),
            payload,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Create an event with no payload
    pub fn empty(key: impl Into<String>) -> Self {
        Self::new(key, EventPayload::Empty)
    }

    /// Create an event with a string payload
    pub fn with_string(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(key, EventPayload::String(message.into()))
    }

    /// Create an event with a map payload
    pub fn with_map(key: impl Into<String>, map: HashMap<String, serde_json::Value>) -> Self {
        Self::new(key, EventPayload::Map(map))
    }

    /// Look up a field of a map payload.
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        match &self.payload {
            EventPayload::Map(map) => map.get(name),
            _ => None,
        }
    }
}

/// Destination for acquisition events.
pub trait EventPublisher: Send + Sync {
    /// Publish an event. Delivery is best-effort.
    fn publish(&self, event: ImageEvent);
}

/// Publisher that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPublisher;

impl EventPublisher for NoopPublisher {
    fn publish(&self, _event: ImageEvent) {}
}

/// In-process publisher backed by a tokio broadcast channel.
#[derive(Clone)]
pub struct BroadcastPublisher {
    sender: Arc<broadcast::Sender<ImageEvent>>,
}

impl BroadcastPublisher {
    /// Create a new publisher buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<ImageEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventPublisher for BroadcastPublisher {
    fn publish(&self, event: ImageEvent) {
        // No subscribers is not an error.
        let _ = self.sender.send(event);
    }
}

/// Event catalog - predefined event keys
pub mod events {
    // Acquisition events
    pub const IMAGE_ACQUIRE_STARTED: &str = "image.acquire.started";
    pub const IMAGE_ACQUIRE_COMPLETED: &str = "image.acquire.completed";
    pub const IMAGE_ACQUIRE_FAILED: &str = "image.acquire.failed";

    // Read events
    pub const IMAGE_READ_STARTED: &str = "image.read.started";
    pub const IMAGE_READ_COMPLETED: &str = "image.read.completed";
    pub const IMAGE_LAYER_READ: &str = "image.layer.read";

    // Scratch space
    pub const SCRATCH_CLEANUP_FAILED: &str = "scratch.cleanup.failed";
}
