//! Data Transfer Objects for inter-service communication
//!
//! DTOs exchanged between the orchestrator, the runner, and the CLI over
//! HTTP. Field names are camelCase on the wire.

pub mod job;
pub mod resource;
