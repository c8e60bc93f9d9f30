//! Booking operations for reservo.
//!
//! This crate is the transport-agnostic operation surface of the booking
//! system:
//!
//! - [`services::BookingService`] — the reservation lifecycle engine
//!   (create hold, confirm, cancel, reschedule), built as short sagas of
//!   conditional single-row updates with explicit compensation.
//! - [`services::AvailabilityService`] — open-slot queries fitted to a
//!   service's duration.
//! - [`services::BookingQueryService`] — customer bucketed listings and
//!   admin reports with aggregates.
//! - [`jobs::ExpirySweeperJob`] — the periodic task that reclaims expired
//!   pending holds and releases their slots.
//!
//! HTTP routing, authentication, and outbound message delivery live in
//! other services; the [`services::BookingNotifier`] trait is the seam the
//! delivery side plugs into.

pub mod config;
pub mod error;
pub mod jobs;
pub mod services;

pub use config::BookingSettings;
pub use error::{ApiBookingsError, ApiResult};
pub use jobs::{ExpirySweeperJob, SweepStats, SweeperError};
pub use services::{
    AvailabilityService, BookingBucket, BookingNotifier, BookingQueryService, BookingReport,
    BookingService, CancelActor, CreateHoldRequest, LoggingNotifier, MyBookings,
    NotificationError,
};
