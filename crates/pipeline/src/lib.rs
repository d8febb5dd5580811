//! The generation pipeline: staged batch orchestration from source
//! download through variant enumeration to per-variant image composition.
//!
//! Entry point is [`Pipeline::start_generation`]. Stages are sequenced
//! (download settles before enumeration; packs exist before composition
//! dispatch) while the tasks inside each stage batch run concurrently
//! under an allow-failures policy.

pub mod batch;
pub mod compose;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod notify;
pub mod orchestrator;
pub mod source_cache;
pub mod store;

pub use config::PipelineConfig;
pub use error::PipelineError;
pub use orchestrator::Pipeline;
