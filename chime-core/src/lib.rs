//! Chime Core
//!
//! Core types and abstractions for the Chime job scheduler.
//!
//! This crate contains:
//! - Domain types: Core business entities (Job, JobExecution, Schedule, etc.)
//! - DTOs: Data transfer objects shared by the scheduler service and its clients

pub mod domain;
pub mod dto;
