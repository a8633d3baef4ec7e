//! Repository layer
//!
//! Repositories are thin adapters over the orchestrator client. They carry
//! the worker's identity and no business logic.
//!
//! All repositories are trait-based to enable testing and mocking.

mod jobs;
mod resources;

// Re-export traits
pub use jobs::JobRepository;
pub use resources::ResourceRepository;

// Re-export implementations
pub use jobs::HttpJobRepository;
pub use resources::HttpResourceRepository;
