//! Service Module
//!
//! Business logic layer for the orchestrator.
//! Services sit between the API handlers and the storage traits.

pub mod automation;
pub mod reaper;
pub mod resource;

pub use automation::{AutomationError, AutomationService, QueuePolicy};
pub use resource::{ResourceError, ResourceService};
