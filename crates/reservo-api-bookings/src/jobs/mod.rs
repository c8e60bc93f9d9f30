//! Background jobs.

pub mod expiry_sweeper_job;

pub use expiry_sweeper_job::{ExpirySweeperJob, SweepStats, SweeperError};
