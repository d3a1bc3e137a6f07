//! Scheduler layer
//!
//! Turns stored job definitions into live triggers and fires them in the
//! background, independent of request handling.

pub mod engine;
pub mod seeder;
pub mod trigger;

pub use engine::{Scheduler, SchedulerConfig};
pub use seeder::SeedReport;
