//! Service layer
//!
//! Business logic of the runner: routing claimed jobs to generators and
//! persisting the files they produce. Both services are trait-based so the
//! worker can be tested with fakes.

mod artifact_store;
mod dispatch;

// Re-export traits
pub use artifact_store::ArtifactStore;
pub use dispatch::JobExecutor;

// Re-export implementations
pub use artifact_store::LocalArtifactStore;
pub use dispatch::{AutomationDispatcher, DispatchError};
