//! API error types for booking operations.
//!
//! Taxonomy: validation errors are rejected before any store access;
//! not-found and conflict errors are terminal and involve no compensation
//! (nothing was mutated yet, or the mutation's guard simply did not match);
//! store errors occurring mid-saga trigger compensation in the service
//! layer before being returned.

use thiserror::Error;
use uuid::Uuid;

use reservo_db::BookingStatus;

/// Result alias for booking operations.
pub type ApiResult<T> = Result<T, ApiBookingsError>;

/// Booking API error type.
#[derive(Debug, Error)]
pub enum ApiBookingsError {
    /// Malformed or missing input, rejected before touching the store.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Booking does not exist or is owned by another customer.
    #[error("Booking not found: {0}")]
    BookingNotFound(Uuid),

    /// Slot does not exist or belongs to another provider.
    #[error("Slot not found: {0}")]
    SlotNotFound(Uuid),

    /// Service offering does not exist or is inactive.
    #[error("Service not found: {0}")]
    ServiceNotFound(Uuid),

    /// The slot was claimed by another actor first. Definitive conflict,
    /// not a transient failure; the caller should pick another slot.
    #[error("Slot is no longer available: {0}")]
    SlotUnavailable(Uuid),

    /// The slot window cannot accommodate the service duration.
    #[error("Slot window of {window_minutes} minutes is shorter than the {required_minutes} minute service")]
    SlotTooShort {
        /// Length of the slot window.
        window_minutes: i64,
        /// Duration the service needs.
        required_minutes: i64,
    },

    /// The booking is not in a state that permits the operation.
    #[error("Booking is {status}, operation requires a different state")]
    InvalidState {
        /// The status the booking was found in.
        status: BookingStatus,
    },

    /// The hold expired before confirmation; the caller must create a new
    /// hold, since the sweeper may reclaim the slot at any moment.
    #[error("Reservation hold has expired")]
    HoldExpired,

    /// Cancellation requested closer to the start time than the configured
    /// minimum notice allows.
    #[error("Too late to cancel: {hours_remaining}h before start, {required_hours}h notice required")]
    CancellationWindowClosed {
        /// Whole hours remaining until the scheduled start.
        hours_remaining: i64,
        /// Configured minimum notice in hours.
        required_hours: i64,
    },

    /// Transient failure from the underlying store.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ApiBookingsError {
    /// Whether the error is a definitive conflict (retrying the same call
    /// without changing inputs cannot succeed, but no damage was done).
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::SlotUnavailable(_)
                | Self::SlotTooShort { .. }
                | Self::InvalidState { .. }
                | Self::HoldExpired
                | Self::CancellationWindowClosed { .. }
        )
    }
}
