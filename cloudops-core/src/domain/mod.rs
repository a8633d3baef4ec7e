//! Core domain types
//!
//! This module contains the core domain structures used across CloudOps services.
//! These types are shared between the orchestrator (which persists queued jobs
//! and resource records) and the runner (which executes automation tasks).

pub mod artifact;
pub mod config;
pub mod job;
pub mod resource;
pub mod task;
