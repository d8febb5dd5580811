//! Progress/event emission shared by every pipeline stage.

use std::sync::Arc;

use adforge_core::types::DbId;
use adforge_events::{EventBus, GenerationEvent, GenerationEventKind};
use uuid::Uuid;

use crate::store::GenerationStore;

/// Couples the record store with the event bus so stages can report
/// progress in one call. Emission is fire-and-forget: a failed store
/// update is logged, never propagated, because a progress tick must not
/// fail the task that produced it.
#[derive(Clone)]
pub struct Notifier {
    store: Arc<GenerationStore>,
    bus: Arc<EventBus>,
}

impl Notifier {
    pub fn new(store: Arc<GenerationStore>, bus: Arc<EventBus>) -> Self {
        Self { store, bus }
    }

    /// Persist a progress update and broadcast the effective (monotonic)
    /// percentage.
    pub fn progress(
        &self,
        generation_id: DbId,
        user_id: DbId,
        generation_uuid: Uuid,
        message: &str,
        percent: f64,
    ) {
        match self.store.update_progress(generation_id, message, percent) {
            Ok(effective) => self.bus.publish(GenerationEvent::new(
                user_id,
                generation_uuid,
                GenerationEventKind::Progress {
                    message: message.to_string(),
                    percent: effective,
                },
            )),
            Err(e) => {
                tracing::warn!(generation_id, error = %e, "Progress update dropped");
            }
        }
    }

    /// Broadcast a non-progress event.
    pub fn publish(&self, user_id: DbId, generation_uuid: Uuid, kind: GenerationEventKind) {
        self.bus
            .publish(GenerationEvent::new(user_id, generation_uuid, kind));
    }
}
