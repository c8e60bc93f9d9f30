//! Postgres persistence layer for reservo.
//!
//! Every table is represented by a model struct under [`models`] whose
//! inherent async methods issue the SQL for that table. There are no
//! multi-statement transactions in the booking lifecycle paths: the only
//! cross-row coordination primitive this crate exposes is the conditional
//! single-row update (an `UPDATE ... WHERE <guard>` whose `rows_affected`
//! the caller must treat as a compare-and-swap result). The service layer
//! builds its sagas on top of that contract.

pub mod error;
pub mod migrations;
pub mod models;
pub mod pool;

pub use error::DbError;
pub use migrations::run_migrations;
pub use models::{
    Booking, BookingFilter, BookingStatus, NewBooking, PaymentStatus, ServiceOffering, Slot,
    StatusCount,
};
pub use pool::DbPool;
