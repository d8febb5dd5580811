//! Fire-and-forget notifications emitted by the generation pipeline.

pub mod bus;

pub use bus::{EventBus, GenerationEvent, GenerationEventKind};
