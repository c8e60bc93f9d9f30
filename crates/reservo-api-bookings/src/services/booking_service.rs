//! Reservation lifecycle engine.
//!
//! Each operation is a short saga: a fixed-order sequence of conditional
//! single-row mutations with an explicit compensation for every step that
//! can fail after a prior step succeeded. The store serializes conditional
//! updates per row, which is the only atomicity primitive available; there
//! is no multi-row transaction and no lock. Zero rows affected on a guarded
//! update is a definitive conflict signal, never something to retry blindly.
//!
//! The engine races the expiry sweeper by design: `confirm` re-validates
//! status and freshness at the row instead of trusting an earlier read, so
//! a hold the sweeper deleted mid-flight fails cleanly as not-found or
//! expired.

use std::sync::Arc;

use chrono::{DateTime, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use sqlx::PgPool;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use reservo_core::{BookingId, CustomerId, ProviderId, ServiceId, SlotId};
use reservo_db::{Booking, BookingStatus, NewBooking, ServiceOffering, Slot};

use crate::config::BookingSettings;
use crate::error::{ApiBookingsError, ApiResult};
use crate::services::notifications::{BookingNotifier, NotificationError};

/// Maximum accepted length of the customer note, in bytes.
const MAX_NOTE_LENGTH: usize = 500;

/// Who is requesting a cancellation.
#[derive(Debug, Clone, Copy)]
pub enum CancelActor {
    /// The booking's customer; ownership and the notice policy apply.
    Customer(CustomerId),
    /// An administrator; bypasses ownership and the notice policy.
    Admin,
}

/// Request to place a hold on a slot.
#[derive(Debug, Clone)]
pub struct CreateHoldRequest {
    /// Customer placing the hold.
    pub customer: CustomerId,
    /// Provider whose slot is requested.
    pub provider: ProviderId,
    /// The slot to hold.
    pub slot_id: SlotId,
    /// The priced service to book into the slot.
    pub service_id: ServiceId,
    /// Optional free-text note.
    pub note: Option<String>,
}

/// The reservation lifecycle engine.
pub struct BookingService {
    pool: PgPool,
    settings: BookingSettings,
    notifier: Arc<dyn BookingNotifier>,
}

impl BookingService {
    /// Create a new booking service.
    pub fn new(
        pool: PgPool,
        settings: BookingSettings,
        notifier: Arc<dyn BookingNotifier>,
    ) -> Self {
        Self {
            pool,
            settings,
            notifier,
        }
    }

    /// Place a time-limited hold on a slot.
    ///
    /// Saga: insert the pending booking, then claim the slot guarded on it
    /// still being available. A lost claim race deletes the just-inserted
    /// booking and surfaces [`ApiBookingsError::SlotUnavailable`], which is
    /// what keeps two simultaneous holds on one slot from both succeeding.
    #[instrument(skip(self, request), fields(customer_id = %request.customer, slot_id = %request.slot_id))]
    pub async fn create_hold(&self, request: CreateHoldRequest) -> ApiResult<Booking> {
        if let Some(note) = &request.note {
            if note.len() > MAX_NOTE_LENGTH {
                return Err(ApiBookingsError::Validation(format!(
                    "note exceeds {MAX_NOTE_LENGTH} bytes"
                )));
            }
        }

        let slot_id = request.slot_id.into_uuid();
        let service_id = request.service_id.into_uuid();
        let provider_id = request.provider.into_uuid();

        let (slot, service) = tokio::try_join!(
            Slot::find_for_provider(&self.pool, provider_id, slot_id),
            ServiceOffering::find_active(&self.pool, provider_id, service_id),
        )?;
        let slot = slot.ok_or(ApiBookingsError::SlotNotFound(slot_id))?;
        let service = service.ok_or(ApiBookingsError::ServiceNotFound(service_id))?;

        if !slot.is_available {
            return Err(ApiBookingsError::SlotUnavailable(slot_id));
        }
        if !slot.fits_duration(service.duration_minutes) {
            return Err(ApiBookingsError::SlotTooShort {
                window_minutes: slot.window_minutes(),
                required_minutes: i64::from(service.duration_minutes),
            });
        }

        let expires_at = Utc::now() + self.settings.hold_ttl();
        let booking = Booking::create(
            &self.pool,
            &NewBooking {
                customer_id: request.customer.into_uuid(),
                provider_id,
                service_id,
                slot_id,
                slot_date: slot.slot_date,
                start_time: slot.start_time,
                end_time: slot.end_time,
                service_name: service.name.clone(),
                service_price_cents: service.price_cents,
                service_duration_minutes: service.duration_minutes,
                expires_at,
                note: request.note,
            },
        )
        .await?;

        let claimed = match Slot::claim(&self.pool, slot_id).await {
            Ok(claimed) => claimed,
            Err(e) => {
                self.undo_hold_insert(booking.id, slot_id).await;
                return Err(e.into());
            }
        };
        if !claimed {
            // Another actor claimed the slot between our read and the CAS.
            self.undo_hold_insert(booking.id, slot_id).await;
            return Err(ApiBookingsError::SlotUnavailable(slot_id));
        }

        info!(booking_id = %booking.id, expires_at = %expires_at, "hold created");
        self.notify("hold_created", booking.id, self.notifier.hold_created(&booking).await);
        Ok(booking)
    }

    /// Confirm a pending hold before it expires.
    ///
    /// A single conditional update carries the whole transition, guarded on
    /// ownership, pending status, and freshness; payment capture is modeled
    /// as an always-succeeding flip to paid. On a guard miss the booking is
    /// re-read to classify the failure.
    #[instrument(skip(self), fields(booking_id = %booking_id, customer_id = %customer))]
    pub async fn confirm(&self, booking_id: BookingId, customer: CustomerId) -> ApiResult<Booking> {
        let id = booking_id.into_uuid();
        let customer_id = customer.into_uuid();
        let now = Utc::now();

        match Booking::confirm_pending(&self.pool, id, customer_id, now).await? {
            Some(booking) => {
                info!(booking_id = %id, "booking confirmed");
                self.notify(
                    "booking_confirmed",
                    id,
                    self.notifier.booking_confirmed(&booking).await,
                );
                Ok(booking)
            }
            None => {
                let reread = Booking::find_for_customer(&self.pool, customer_id, id).await?;
                let err = classify_confirm_miss(id, reread, now);
                if err.is_conflict() {
                    info!(booking_id = %id, error = %err, "confirm lost to a concurrent transition");
                }
                Err(err)
            }
        }
    }

    /// Cancel a pending or confirmed booking and release its slot.
    ///
    /// All-or-nothing for the caller: if the slot release fails, the
    /// booking's prior status and expiry are restored verbatim before the
    /// error is returned.
    #[instrument(skip(self), fields(booking_id = %booking_id))]
    pub async fn cancel(&self, booking_id: BookingId, actor: CancelActor) -> ApiResult<Booking> {
        let id = booking_id.into_uuid();

        let booking = match actor {
            CancelActor::Customer(customer) => {
                Booking::find_for_customer(&self.pool, customer.into_uuid(), id).await?
            }
            CancelActor::Admin => Booking::find_by_id(&self.pool, id).await?,
        }
        .ok_or(ApiBookingsError::BookingNotFound(id))?;

        if !booking.status.holds_slot() {
            return Err(ApiBookingsError::InvalidState {
                status: booking.status,
            });
        }

        if booking.status == BookingStatus::Confirmed
            && matches!(actor, CancelActor::Customer(_))
        {
            self.check_cancellation_notice(&booking, Utc::now())?;
        }

        // Snapshot for compensation before any mutation.
        let prior_status = booking.status;
        let prior_expires_at = booking.expires_at;

        let cancelled = match Booking::mark_cancelled(&self.pool, id).await? {
            Some(b) => b,
            // The status guard failed: a concurrent transition won. Re-read
            // to report what state the booking is in now.
            None => match Booking::find_by_id(&self.pool, id).await? {
                None => return Err(ApiBookingsError::BookingNotFound(id)),
                Some(b) => {
                    return Err(ApiBookingsError::InvalidState { status: b.status });
                }
            },
        };

        if let Err(e) = Slot::release(&self.pool, booking.slot_id).await {
            if let Err(restore_err) =
                Booking::restore_state(&self.pool, id, prior_status, prior_expires_at).await
            {
                error!(
                    booking_id = %id,
                    slot_id = %booking.slot_id,
                    error = %restore_err,
                    "cancel compensation failed: booking left cancelled while slot is still held, manual reconciliation required"
                );
            }
            return Err(e.into());
        }

        info!(booking_id = %id, prior_status = %prior_status, "booking cancelled");
        self.notify(
            "booking_cancelled",
            id,
            self.notifier.booking_cancelled(&cancelled).await,
        );
        Ok(cancelled)
    }

    /// Move a booking to a different slot of the same provider.
    ///
    /// Admin-privileged; the caller's authorization happens upstream. The
    /// booking's status never changes, only its denormalized slot fields.
    ///
    /// Three-legged saga, strictly ordered: (1) repoint the booking,
    /// (2) release the old slot, (3) claim the new slot under the
    /// availability guard. Each leg's failure undoes all prior legs in
    /// reverse order, leaving the system exactly as it started.
    #[instrument(skip(self), fields(booking_id = %booking_id, new_slot_id = %new_slot_id))]
    pub async fn reschedule(
        &self,
        booking_id: BookingId,
        new_slot_id: SlotId,
    ) -> ApiResult<Booking> {
        let id = booking_id.into_uuid();
        let new_id = new_slot_id.into_uuid();

        let booking = Booking::find_by_id(&self.pool, id)
            .await?
            .ok_or(ApiBookingsError::BookingNotFound(id))?;
        if !booking.status.holds_slot() {
            return Err(ApiBookingsError::InvalidState {
                status: booking.status,
            });
        }

        let new_slot = Slot::find_for_provider(&self.pool, booking.provider_id, new_id)
            .await?
            .ok_or(ApiBookingsError::SlotNotFound(new_id))?;
        if !new_slot.is_available {
            return Err(ApiBookingsError::SlotUnavailable(new_id));
        }
        // The window must fit the duration recorded at hold time, not the
        // service's current definition.
        if !new_slot.fits_duration(booking.service_duration_minutes) {
            return Err(ApiBookingsError::SlotTooShort {
                window_minutes: new_slot.window_minutes(),
                required_minutes: i64::from(booking.service_duration_minutes),
            });
        }

        let old = OldSlotFields {
            slot_id: booking.slot_id,
            slot_date: booking.slot_date,
            start_time: booking.start_time,
            end_time: booking.end_time,
        };

        // Leg 1: repoint the booking at the new slot.
        let moved = Booking::move_to_slot(
            &self.pool,
            id,
            new_slot.id,
            new_slot.slot_date,
            new_slot.start_time,
            new_slot.end_time,
        )
        .await?;
        if !moved {
            return Err(ApiBookingsError::BookingNotFound(id));
        }

        // Leg 2: release the old slot.
        if let Err(e) = Slot::release(&self.pool, old.slot_id).await {
            self.restore_booking_slot(id, &old).await;
            return Err(e.into());
        }

        // Leg 3: claim the new slot under the availability guard.
        match Slot::claim(&self.pool, new_slot.id).await {
            Ok(true) => {}
            Ok(false) => {
                self.undo_release_and_move(id, &old).await;
                return Err(ApiBookingsError::SlotUnavailable(new_slot.id));
            }
            Err(e) => {
                self.undo_release_and_move(id, &old).await;
                return Err(e.into());
            }
        }

        let updated = match Booking::find_by_id(&self.pool, id).await? {
            Some(b) => b,
            // The sweeper can delete an expired pending booking between
            // leg 3 and this read, in which case the fresh claim on the new
            // slot guards nothing and must be given back.
            None => {
                if let Err(e) = Slot::release(&self.pool, new_slot.id).await {
                    error!(
                        booking_id = %id,
                        slot_id = %new_slot.id,
                        error = %e,
                        "reschedule cleanup failed: slot held with no booking, manual reconciliation required"
                    );
                }
                return Err(ApiBookingsError::BookingNotFound(id));
            }
        };

        info!(
            booking_id = %id,
            old_slot_id = %old.slot_id,
            new_slot_id = %new_slot.id,
            "booking rescheduled"
        );
        self.notify(
            "booking_rescheduled",
            id,
            self.notifier.booking_rescheduled(&updated).await,
        );
        Ok(updated)
    }

    /// Delete the booking inserted by a hold whose slot claim failed.
    async fn undo_hold_insert(&self, booking_id: Uuid, slot_id: Uuid) {
        if let Err(e) = Booking::delete_by_id(&self.pool, booking_id).await {
            error!(
                booking_id = %booking_id,
                slot_id = %slot_id,
                error = %e,
                "hold compensation failed: orphaned pending booking requires manual reconciliation"
            );
        }
    }

    /// Undo reschedule leg 1: restore the booking's old slot fields.
    async fn restore_booking_slot(&self, booking_id: Uuid, old: &OldSlotFields) {
        if let Err(e) = Booking::move_to_slot(
            &self.pool,
            booking_id,
            old.slot_id,
            old.slot_date,
            old.start_time,
            old.end_time,
        )
        .await
        {
            error!(
                booking_id = %booking_id,
                slot_id = %old.slot_id,
                error = %e,
                "reschedule compensation failed: booking points at a slot it does not hold, manual reconciliation required"
            );
        }
    }

    /// Undo reschedule legs 2 then 1, in reverse order of execution.
    async fn undo_release_and_move(&self, booking_id: Uuid, old: &OldSlotFields) {
        if let Err(e) = Slot::reclaim(&self.pool, old.slot_id).await {
            error!(
                booking_id = %booking_id,
                slot_id = %old.slot_id,
                error = %e,
                "reschedule compensation failed: old slot released while booking still holds it, manual reconciliation required"
            );
        }
        self.restore_booking_slot(booking_id, old).await;
    }

    /// Reject a confirmed-booking cancellation inside the notice window.
    fn check_cancellation_notice(
        &self,
        booking: &Booking,
        now: DateTime<Utc>,
    ) -> ApiResult<()> {
        let required_hours = self.settings.min_cancel_notice_hours;
        if required_hours == 0 {
            return Ok(());
        }
        let remaining = hours_until_start(
            booking.slot_date,
            booking.start_time,
            self.settings.timezone,
            now,
        );
        if notice_violation(required_hours, remaining) {
            return Err(ApiBookingsError::CancellationWindowClosed {
                hours_remaining: remaining.max(0),
                required_hours,
            });
        }
        Ok(())
    }

    fn notify(&self, kind: &str, booking_id: Uuid, result: Result<(), NotificationError>) {
        if let Err(e) = result {
            warn!(booking_id = %booking_id, kind, error = %e, "notification dispatch failed");
        }
    }
}

/// The booking's denormalized slot fields as read before a reschedule.
#[derive(Debug, Clone)]
struct OldSlotFields {
    slot_id: Uuid,
    slot_date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
}

/// Classify a confirm whose guarded update matched no row.
///
/// The guard checks identity, ownership, pending status, and freshness in
/// one statement; the re-read (already customer-scoped) tells which of
/// those failed. A missing or foreign-owned row reads as not found.
fn classify_confirm_miss(
    booking_id: Uuid,
    reread: Option<Booking>,
    now: DateTime<Utc>,
) -> ApiBookingsError {
    match reread {
        None => ApiBookingsError::BookingNotFound(booking_id),
        Some(b) if b.status != BookingStatus::Pending => {
            ApiBookingsError::InvalidState { status: b.status }
        }
        // Still pending, so the freshness guard is what failed; the deadline
        // never moves once set, so the re-read agrees.
        Some(b) => {
            debug_assert!(b.is_expired_at(now));
            ApiBookingsError::HoldExpired
        }
    }
}

/// Whole hours from `now` until the booking's scheduled start, evaluated
/// with the start interpreted as wall time in `tz`. Negative once started.
fn hours_until_start(
    slot_date: NaiveDate,
    start_time: NaiveTime,
    tz: Tz,
    now: DateTime<Utc>,
) -> i64 {
    let naive = slot_date.and_time(start_time);
    let start = match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        // Wall time inside a DST gap; treat it as UTC.
        LocalResult::None => Utc.from_utc_datetime(&naive),
    };
    (start - now).num_hours()
}

/// Whether a configured notice requirement rejects a cancellation with
/// `remaining_hours` until the start. Zero disables the policy.
fn notice_violation(required_hours: i64, remaining_hours: i64) -> bool {
    required_hours > 0 && remaining_hours < required_hours
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    mod confirm_classification_tests {
        use super::*;
        use reservo_db::PaymentStatus;

        fn pending_booking(expires_at: DateTime<Utc>) -> Booking {
            Booking {
                id: Uuid::new_v4(),
                customer_id: Uuid::new_v4(),
                provider_id: Uuid::new_v4(),
                service_id: Uuid::new_v4(),
                slot_id: Uuid::new_v4(),
                slot_date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
                start_time: "10:00:00".parse().unwrap(),
                end_time: "11:00:00".parse().unwrap(),
                service_name: "Consultation".to_string(),
                service_price_cents: 5_000,
                service_duration_minutes: 60,
                status: BookingStatus::Pending,
                expires_at: Some(expires_at),
                payment_status: PaymentStatus::Unpaid,
                payment_amount_cents: 5_000,
                note: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            }
        }

        #[test]
        fn test_missing_row_is_not_found() {
            let id = Uuid::new_v4();
            let err = classify_confirm_miss(id, None, Utc::now());
            assert!(matches!(err, ApiBookingsError::BookingNotFound(got) if got == id));
            assert!(!err.is_conflict());
        }

        #[test]
        fn test_non_pending_row_is_invalid_state() {
            let now = Utc::now();
            let mut b = pending_booking(now + Duration::minutes(10));
            b.status = BookingStatus::Cancelled;
            b.expires_at = None;

            let err = classify_confirm_miss(b.id, Some(b), now);
            assert!(matches!(
                err,
                ApiBookingsError::InvalidState {
                    status: BookingStatus::Cancelled
                }
            ));
        }

        #[test]
        fn test_stale_pending_row_is_expired_hold() {
            let now = Utc::now();
            let b = pending_booking(now - Duration::minutes(1));
            assert!(b.is_expired_at(now));

            let err = classify_confirm_miss(b.id, Some(b), now);
            assert!(matches!(err, ApiBookingsError::HoldExpired));
            assert!(err.is_conflict());
        }

        #[test]
        fn test_deadline_boundary_classifies_as_expired() {
            let now = Utc::now();
            let b = pending_booking(now);

            let err = classify_confirm_miss(b.id, Some(b), now);
            assert!(matches!(err, ApiBookingsError::HoldExpired));
        }
    }

    mod notice_policy_tests {
        use super::*;

        #[test]
        fn test_disabled_policy_never_rejects() {
            assert!(!notice_violation(0, -100));
            assert!(!notice_violation(0, 0));
        }

        #[test]
        fn test_rejects_inside_window() {
            assert!(notice_violation(24, 3));
        }

        #[test]
        fn test_accepts_exactly_at_threshold() {
            assert!(!notice_violation(24, 24));
        }

        #[test]
        fn test_rejects_already_started() {
            assert!(notice_violation(24, -2));
        }
    }

    mod hours_until_start_tests {
        use super::*;

        fn date(y: i32, m: u32, d: u32) -> NaiveDate {
            NaiveDate::from_ymd_opt(y, m, d).unwrap()
        }

        #[test]
        fn test_utc_exact_hours() {
            let now = Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap();
            let hours = hours_until_start(
                date(2026, 3, 11),
                "09:00:00".parse().unwrap(),
                Tz::UTC,
                now,
            );
            assert_eq!(hours, 24);
        }

        #[test]
        fn test_timezone_offset_applied() {
            // 09:00 in New York (EDT, UTC-4) is 13:00 UTC.
            let now = Utc.with_ymd_and_hms(2026, 6, 1, 3, 0, 0).unwrap();
            let hours = hours_until_start(
                date(2026, 6, 1),
                "09:00:00".parse().unwrap(),
                chrono_tz::America::New_York,
                now,
            );
            assert_eq!(hours, 10);
        }

        #[test]
        fn test_negative_once_started() {
            let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
            let hours = hours_until_start(
                date(2026, 3, 10),
                "09:00:00".parse().unwrap(),
                Tz::UTC,
                now,
            );
            assert_eq!(hours, -3);
        }

        #[test]
        fn test_partial_hour_truncates_toward_zero() {
            let now = Utc.with_ymd_and_hms(2026, 3, 10, 9, 30, 0).unwrap();
            let hours = hours_until_start(
                date(2026, 3, 11),
                "09:00:00".parse().unwrap(),
                Tz::UTC,
                now,
            );
            // 23.5 hours remaining counts as 23 whole hours.
            assert_eq!(hours, 23);
        }
    }

    #[test]
    fn test_expiry_is_ttl_from_now() {
        let settings = crate::config::BookingSettings::default();
        let now = Utc::now();
        let expires_at = now + settings.hold_ttl();
        assert_eq!(expires_at - now, Duration::minutes(15));
    }
}
