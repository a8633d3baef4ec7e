//! Scheduler layer for the runner
//!
//! Background loops: the job worker, which polls, claims and executes
//! automation jobs, and the periodic task-directory cleanup.

pub mod cleanup;
pub mod worker;

pub use cleanup::run_cleanup_loop;
pub use worker::{JobEvent, Worker};
