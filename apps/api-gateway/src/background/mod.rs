//! Background jobs.

pub mod scheduler;

pub use scheduler::Scheduler;
