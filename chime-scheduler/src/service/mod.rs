//! Service Module
//!
//! Business logic layer for the scheduler.
//! Services orchestrate between repositories and the live scheduler.

pub mod execution;
pub mod history;
pub mod job;

// Re-export for convenience
pub use history as history_service;
pub use job as job_service;
