//! Repository models for the reservo schema.
//!
//! Each model owns the SQL for its table. Lifecycle-critical mutations are
//! conditional single-row updates; callers interpret `rows_affected` (or a
//! `RETURNING` miss) as a compare-and-swap conflict, never as an error to
//! retry blindly.

pub mod booking;
pub mod service_offering;
pub mod slot;

pub use booking::{Booking, BookingFilter, BookingStatus, NewBooking, PaymentStatus, StatusCount};
pub use service_offering::ServiceOffering;
pub use slot::Slot;
