//! Core types shared by all reservo crates.
//!
//! Currently this is the home of the strongly typed identifiers used
//! throughout the booking system. Keeping them in a dependency-light crate
//! lets both the persistence layer and the service layer speak the same id
//! vocabulary without pulling in sqlx.

pub mod ids;

pub use ids::{BookingId, CustomerId, ParseIdError, ProviderId, ServiceId, SlotId};
