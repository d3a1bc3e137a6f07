//! Repository Module
//!
//! Data access layer for the scheduler.
//! Each repository handles database operations for a specific domain entity.

pub mod execution;
pub mod job;

// Re-export for convenience
pub use execution as execution_repository;
pub use job as job_repository;
