//! Core domain types
//!
//! This module contains the core domain structures used across Chime crates.
//! These types are persisted by the scheduler service and returned verbatim
//! by its management API, so the client and CLI share them as well.

pub mod execution;
pub mod job;
pub mod schedule;
pub mod stats;
