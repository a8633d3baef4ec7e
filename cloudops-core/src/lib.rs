//! CloudOps Core
//!
//! Core types and abstractions for the CloudOps automation system.
//!
//! This crate contains:
//! - Domain types: automation tasks, invocation results, queued jobs, resources
//! - DTOs: Data transfer objects for inter-service communication

pub mod domain;
pub mod dto;
