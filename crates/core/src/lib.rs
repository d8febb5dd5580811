//! Domain types and pure logic for the creative variant generation
//! pipeline: statuses, field/pack DTOs, templates, progress math, and the
//! combinatorial variant enumerator.
//!
//! Everything in this crate is side-effect free. Network, storage, and
//! image operations live behind the boundary traits in `adforge-cloud`
//! and are driven by `adforge-pipeline`.

pub mod enumerate;
pub mod error;
pub mod field;
pub mod generation;
pub mod progress;
pub mod status;
pub mod template;
pub mod types;

pub use error::CoreError;
