//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the fan-out hub for [`GenerationEvent`]s. It is shared
//! via `Arc<EventBus>` between the pipeline and any consumers (WebSocket
//! forwarders, progress persisters). Publishing with zero subscribers is
//! not an error: events are fire-and-forget.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// GenerationEvent
// ---------------------------------------------------------------------------

/// The closed set of notifications the pipeline emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenerationEventKind {
    /// The download batch for cloud-backed fields was dispatched.
    SourceDownloadingStarted { batch_id: Uuid },
    /// Pre-translated images were staged into the working folder.
    TranslatedImagesCopied,
    /// All packs for the generation were created.
    PacksInitialised { pack_uuids: Vec<Uuid> },
    /// The composition batch was dispatched.
    MergingStarted { batch_id: Uuid },
    /// One pack produced media for one image size.
    PackUpdated {
        pack_uuid: Uuid,
        /// How many media records this pack will carry once complete.
        expected_media: usize,
        media_url: String,
        is_cover: bool,
    },
    /// Generation-level progress changed.
    Progress { message: String, percent: f64 },
}

/// An event keyed by the owning user and generation, stamped at creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationEvent {
    pub user_id: i64,
    pub generation_uuid: Uuid,
    pub kind: GenerationEventKind,
    pub timestamp: DateTime<Utc>,
}

impl GenerationEvent {
    pub fn new(user_id: i64, generation_uuid: Uuid, kind: GenerationEventKind) -> Self {
        Self {
            user_id,
            generation_uuid,
            kind,
            timestamp: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`GenerationEvent`].
pub struct EventBus {
    sender: broadcast::Sender<GenerationEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are
    /// dropped and slow receivers observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: GenerationEvent) {
        // Ignore the SendError — it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<GenerationEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
