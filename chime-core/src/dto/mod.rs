//! Data Transfer Objects for the management API
//!
//! Request and response bodies exchanged between the scheduler service and
//! its callers. Domain entities are returned as-is; these types cover the
//! shapes that are not entities themselves.

pub mod job;
pub mod scheduler;
