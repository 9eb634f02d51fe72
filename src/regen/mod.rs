//! Regeneration of generated snippets.
//!
//! [`Orchestrator`] owns every snippet lifecycle operation (create, update,
//! delete) and schedules regeneration of whatever an operation invalidates.
//! Progress is observable through [`Orchestrator::status`] and the
//! [`RegenerationEvent`] broadcast channel.

mod orchestrator;
mod status;

pub use orchestrator::{
    BatchHandle, LifecycleOutcome, Orchestrator, RegenerationOptions,
};
pub use status::{BatchReport, RegenerationEvent, RegenerationStatus};
