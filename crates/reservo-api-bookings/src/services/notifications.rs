//! Notification dispatch seam.
//!
//! The delivery side (email, SMS, templating) is a separate service; this
//! crate only defines the interface it consumes. Dispatch happens strictly
//! after a lifecycle transition has committed, and a delivery failure is
//! logged but never rolls a booking back.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use reservo_db::Booking;

/// Error from a notification backend.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The backend could not deliver the message.
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Consumer of finalized booking state transitions.
#[async_trait]
pub trait BookingNotifier: Send + Sync {
    /// A hold was created and awaits confirmation.
    async fn hold_created(&self, booking: &Booking) -> Result<(), NotificationError>;

    /// A hold was confirmed and paid.
    async fn booking_confirmed(&self, booking: &Booking) -> Result<(), NotificationError>;

    /// A booking was cancelled.
    async fn booking_cancelled(&self, booking: &Booking) -> Result<(), NotificationError>;

    /// A booking was moved to a different slot.
    async fn booking_rescheduled(&self, booking: &Booking) -> Result<(), NotificationError>;
}

/// Default notifier that records transitions as structured log events.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

#[async_trait]
impl BookingNotifier for LoggingNotifier {
    async fn hold_created(&self, booking: &Booking) -> Result<(), NotificationError> {
        info!(
            booking_id = %booking.booking_id(),
            customer_id = %booking.customer_id(),
            expires_at = ?booking.expires_at,
            "notify: hold created"
        );
        Ok(())
    }

    async fn booking_confirmed(&self, booking: &Booking) -> Result<(), NotificationError> {
        info!(
            booking_id = %booking.booking_id(),
            customer_id = %booking.customer_id(),
            "notify: booking confirmed"
        );
        Ok(())
    }

    async fn booking_cancelled(&self, booking: &Booking) -> Result<(), NotificationError> {
        info!(
            booking_id = %booking.booking_id(),
            customer_id = %booking.customer_id(),
            "notify: booking cancelled"
        );
        Ok(())
    }

    async fn booking_rescheduled(&self, booking: &Booking) -> Result<(), NotificationError> {
        info!(
            booking_id = %booking.booking_id(),
            slot_id = %booking.slot_id(),
            slot_date = %booking.slot_date,
            "notify: booking rescheduled"
        );
        Ok(())
    }
}
