//! Booking entity model.
//!
//! A booking is created only as a pending hold with an expiry, and leaves
//! the pending state through exactly one of: confirmation, cancellation, or
//! deletion by the expiry sweeper. `expires_at` is non-null iff the status
//! is pending; every transition out of pending clears it.
//!
//! All lifecycle mutations here are conditional single-row statements. A
//! guarded `UPDATE ... RETURNING` that returns no row means the guard no
//! longer holds (the row is missing, foreign-owned, in another state, or
//! expired); callers re-read to classify, they do not retry.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Type};
use uuid::Uuid;

use reservo_core::{BookingId, CustomerId, SlotId};

/// Status of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Type, Serialize, Deserialize)]
#[sqlx(type_name = "booking_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    /// Held, awaiting confirmation before `expires_at`.
    #[default]
    Pending,
    /// Confirmed and paid.
    Confirmed,
    /// Cancelled by the customer or an admin. Terminal.
    Cancelled,
    /// The appointment took place. Terminal.
    Completed,
}

impl BookingStatus {
    /// Whether the booking still holds its slot.
    #[must_use]
    pub fn holds_slot(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }

    /// Whether the state machine permits a transition to `next`.
    ///
    /// Reschedule is not a status transition (fields change, status does
    /// not), and sweeper deletion is modeled as row removal, so neither
    /// appears here.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Pending, Self::Confirmed | Self::Cancelled) => true,
            (Self::Confirmed, Self::Cancelled | Self::Completed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

/// Payment status of a booking.
///
/// Payment capture is modeled as an immediate, always-succeeding flip to
/// `Paid` at confirmation time; no gateway integration lives here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Type, Serialize, Deserialize)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Not yet paid (holds).
    #[default]
    Unpaid,
    /// Captured at confirmation.
    Paid,
    /// Refunded after cancellation.
    Refunded,
}

/// A booking row: a hold on a slot plus a snapshot of the priced service.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Booking {
    /// Unique identifier.
    pub id: Uuid,

    /// Customer who placed the hold.
    pub customer_id: Uuid,

    /// Provider whose slot is held.
    pub provider_id: Uuid,

    /// The priced service being booked.
    pub service_id: Uuid,

    /// The held slot.
    pub slot_id: Uuid,

    /// Denormalized copy of the slot's date, kept in sync on reschedule.
    pub slot_date: NaiveDate,

    /// Denormalized copy of the slot's start time.
    pub start_time: NaiveTime,

    /// Denormalized copy of the slot's end time.
    pub end_time: NaiveTime,

    /// Service name snapshot taken at hold time.
    pub service_name: String,

    /// Service price snapshot in cents.
    pub service_price_cents: i64,

    /// Service duration snapshot in minutes.
    pub service_duration_minutes: i32,

    /// Current lifecycle status.
    pub status: BookingStatus,

    /// Hold deadline; non-null exactly while the status is pending.
    pub expires_at: Option<DateTime<Utc>>,

    /// Payment status.
    pub payment_status: PaymentStatus,

    /// Amount charged (or to be charged) in cents.
    pub payment_amount_cents: i64,

    /// Optional free-text note from the customer.
    pub note: Option<String>,

    /// When the booking was created.
    pub created_at: DateTime<Utc>,

    /// When the booking was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Get the booking ID as a typed `BookingId`.
    #[must_use]
    pub fn booking_id(&self) -> BookingId {
        BookingId::from_uuid(self.id)
    }

    /// Get the customer ID as a typed `CustomerId`.
    #[must_use]
    pub fn customer_id(&self) -> CustomerId {
        CustomerId::from_uuid(self.customer_id)
    }

    /// Get the held slot's ID as a typed `SlotId`.
    #[must_use]
    pub fn slot_id(&self) -> SlotId {
        SlotId::from_uuid(self.slot_id)
    }

    /// Whether the hold deadline has passed at `now`.
    ///
    /// Only meaningful for pending bookings; non-pending bookings have no
    /// deadline and are never expired.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(deadline) if deadline <= now)
    }

    /// Create a new booking row.
    pub async fn create(pool: &PgPool, new: &NewBooking) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r"
            INSERT INTO bookings (
                customer_id, provider_id, service_id, slot_id,
                slot_date, start_time, end_time,
                service_name, service_price_cents, service_duration_minutes,
                status, expires_at, payment_status, payment_amount_cents, note
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING *
            ",
        )
        .bind(new.customer_id)
        .bind(new.provider_id)
        .bind(new.service_id)
        .bind(new.slot_id)
        .bind(new.slot_date)
        .bind(new.start_time)
        .bind(new.end_time)
        .bind(&new.service_name)
        .bind(new.service_price_cents)
        .bind(new.service_duration_minutes)
        .bind(BookingStatus::Pending)
        .bind(new.expires_at)
        .bind(PaymentStatus::Unpaid)
        .bind(new.service_price_cents)
        .bind(&new.note)
        .fetch_one(pool)
        .await
    }

    /// Find a booking by ID.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r"
            SELECT * FROM bookings
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Find a booking by ID, scoped to its owning customer.
    ///
    /// A foreign-owned booking is indistinguishable from a missing one.
    pub async fn find_for_customer(
        pool: &PgPool,
        customer_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r"
            SELECT * FROM bookings
            WHERE id = $1 AND customer_id = $2
            ",
        )
        .bind(id)
        .bind(customer_id)
        .fetch_optional(pool)
        .await
    }

    /// Confirm a pending hold, guarded on ownership, state, and freshness.
    ///
    /// The guard (`status = 'pending' AND expires_at > now`) is evaluated at
    /// the row under the store's single-row serialization, so a hold the
    /// sweeper has already deleted, or one that expired between the caller's
    /// read and this update, yields `None` instead of an invalid transition.
    pub async fn confirm_pending(
        pool: &PgPool,
        id: Uuid,
        customer_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r"
            UPDATE bookings
            SET status = 'confirmed',
                payment_status = 'paid',
                expires_at = NULL,
                updated_at = NOW()
            WHERE id = $1
              AND customer_id = $2
              AND status = 'pending'
              AND expires_at > $3
            RETURNING *
            ",
        )
        .bind(id)
        .bind(customer_id)
        .bind(now)
        .fetch_optional(pool)
        .await
    }

    /// Move the booking to cancelled and clear the hold deadline.
    pub async fn mark_cancelled(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r"
            UPDATE bookings
            SET status = 'cancelled',
                expires_at = NULL,
                updated_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'confirmed')
            RETURNING *
            ",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Write back a previously read status and expiry verbatim.
    ///
    /// Cancellation compensation: restores the exact pre-call state after a
    /// failed slot release. Idempotent, so a compensation retry is safe.
    pub async fn restore_state(
        pool: &PgPool,
        id: Uuid,
        status: BookingStatus,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r"
            UPDATE bookings
            SET status = $2, expires_at = $3, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(status)
        .bind(expires_at)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Rewrite the denormalized slot fields to point at another slot.
    ///
    /// Used by reschedule (and its compensation, with the old values).
    pub async fn move_to_slot(
        pool: &PgPool,
        id: Uuid,
        slot_id: Uuid,
        slot_date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r"
            UPDATE bookings
            SET slot_id = $2, slot_date = $3, start_time = $4, end_time = $5,
                updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(slot_id)
        .bind(slot_date)
        .bind(start_time)
        .bind(end_time)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a booking by identity.
    ///
    /// The sweeper deletes the exact rows it selected rather than
    /// re-matching the expiry filter. An expired hold cannot be confirmed
    /// after selection (the confirm guard requires freshness), so identity
    /// is a sufficient claim; `false` means the row was already gone.
    pub async fn delete_by_id(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r"
            DELETE FROM bookings
            WHERE id = $1
            ",
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Select pending holds whose deadline has passed.
    pub async fn find_expired_pending(
        pool: &PgPool,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r"
            SELECT * FROM bookings
            WHERE status = 'pending'
              AND expires_at IS NOT NULL
              AND expires_at < $1
            ORDER BY expires_at
            LIMIT $2
            ",
        )
        .bind(now)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// List all bookings for a customer, most recent date first.
    pub async fn list_for_customer(
        pool: &PgPool,
        customer_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r"
            SELECT * FROM bookings
            WHERE customer_id = $1
            ORDER BY slot_date DESC, start_time DESC
            ",
        )
        .bind(customer_id)
        .fetch_all(pool)
        .await
    }

    /// List bookings with admin filters and pagination.
    pub async fn list_filtered(
        pool: &PgPool,
        filter: &BookingFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut query = String::from(
            r"
            SELECT * FROM bookings
            WHERE TRUE
            ",
        );
        let mut param_count = 0;

        if filter.provider_id.is_some() {
            param_count += 1;
            query.push_str(&format!(" AND provider_id = ${param_count}"));
        }
        if filter.customer_id.is_some() {
            param_count += 1;
            query.push_str(&format!(" AND customer_id = ${param_count}"));
        }
        if filter.status.is_some() {
            param_count += 1;
            query.push_str(&format!(" AND status = ${param_count}"));
        }
        if filter.from_date.is_some() {
            param_count += 1;
            query.push_str(&format!(" AND slot_date >= ${param_count}"));
        }
        if filter.to_date.is_some() {
            param_count += 1;
            query.push_str(&format!(" AND slot_date <= ${param_count}"));
        }

        query.push_str(&format!(
            " ORDER BY slot_date DESC, start_time DESC LIMIT ${} OFFSET ${}",
            param_count + 1,
            param_count + 2
        ));

        let mut q = sqlx::query_as::<_, Self>(&query);

        if let Some(provider_id) = filter.provider_id {
            q = q.bind(provider_id);
        }
        if let Some(customer_id) = filter.customer_id {
            q = q.bind(customer_id);
        }
        if let Some(status) = filter.status {
            q = q.bind(status);
        }
        if let Some(from_date) = filter.from_date {
            q = q.bind(from_date);
        }
        if let Some(to_date) = filter.to_date {
            q = q.bind(to_date);
        }

        q.bind(limit).bind(offset).fetch_all(pool).await
    }

    /// Count bookings per status, under the same filters as `list_filtered`
    /// (the status filter itself is ignored so the counts stay complete).
    pub async fn count_by_status(
        pool: &PgPool,
        filter: &BookingFilter,
    ) -> Result<Vec<StatusCount>, sqlx::Error> {
        let mut query = String::from(
            r"
            SELECT status, COUNT(*) AS count
            FROM bookings
            WHERE TRUE
            ",
        );
        let mut param_count = 0;

        if filter.provider_id.is_some() {
            param_count += 1;
            query.push_str(&format!(" AND provider_id = ${param_count}"));
        }
        if filter.customer_id.is_some() {
            param_count += 1;
            query.push_str(&format!(" AND customer_id = ${param_count}"));
        }
        if filter.from_date.is_some() {
            param_count += 1;
            query.push_str(&format!(" AND slot_date >= ${param_count}"));
        }
        if filter.to_date.is_some() {
            param_count += 1;
            query.push_str(&format!(" AND slot_date <= ${param_count}"));
        }

        query.push_str(" GROUP BY status");

        let mut q = sqlx::query_as::<_, StatusCount>(&query);

        if let Some(provider_id) = filter.provider_id {
            q = q.bind(provider_id);
        }
        if let Some(customer_id) = filter.customer_id {
            q = q.bind(customer_id);
        }
        if let Some(from_date) = filter.from_date {
            q = q.bind(from_date);
        }
        if let Some(to_date) = filter.to_date {
            q = q.bind(to_date);
        }

        q.fetch_all(pool).await
    }

    /// Sum of payment amounts over confirmed and completed bookings, in
    /// cents, under the non-status filters.
    pub async fn revenue_total(
        pool: &PgPool,
        filter: &BookingFilter,
    ) -> Result<i64, sqlx::Error> {
        let mut query = String::from(
            r"
            SELECT COALESCE(SUM(payment_amount_cents), 0)
            FROM bookings
            WHERE status IN ('confirmed', 'completed')
            ",
        );
        let mut param_count = 0;

        if filter.provider_id.is_some() {
            param_count += 1;
            query.push_str(&format!(" AND provider_id = ${param_count}"));
        }
        if filter.customer_id.is_some() {
            param_count += 1;
            query.push_str(&format!(" AND customer_id = ${param_count}"));
        }
        if filter.from_date.is_some() {
            param_count += 1;
            query.push_str(&format!(" AND slot_date >= ${param_count}"));
        }
        if filter.to_date.is_some() {
            param_count += 1;
            query.push_str(&format!(" AND slot_date <= ${param_count}"));
        }

        let mut q = sqlx::query_scalar::<_, i64>(&query);

        if let Some(provider_id) = filter.provider_id {
            q = q.bind(provider_id);
        }
        if let Some(customer_id) = filter.customer_id {
            q = q.bind(customer_id);
        }
        if let Some(from_date) = filter.from_date {
            q = q.bind(from_date);
        }
        if let Some(to_date) = filter.to_date {
            q = q.bind(to_date);
        }

        q.fetch_one(pool).await
    }
}

/// Data for creating a new booking hold.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub customer_id: Uuid,
    pub provider_id: Uuid,
    pub service_id: Uuid,
    pub slot_id: Uuid,
    pub slot_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub service_name: String,
    pub service_price_cents: i64,
    pub service_duration_minutes: i32,
    pub expires_at: DateTime<Utc>,
    pub note: Option<String>,
}

/// Filter options for admin booking listings.
#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    /// Filter by provider.
    pub provider_id: Option<Uuid>,

    /// Filter by customer.
    pub customer_id: Option<Uuid>,

    /// Filter by lifecycle status (listing only; aggregates ignore it).
    pub status: Option<BookingStatus>,

    /// Earliest slot date, inclusive.
    pub from_date: Option<NaiveDate>,

    /// Latest slot date, inclusive.
    pub to_date: Option<NaiveDate>,
}

/// Per-status booking count row.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StatusCount {
    /// The status being counted.
    pub status: BookingStatus,
    /// Number of bookings in that status.
    pub count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn booking(status: BookingStatus, expires_at: Option<DateTime<Utc>>) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            provider_id: Uuid::new_v4(),
            service_id: Uuid::new_v4(),
            slot_id: Uuid::new_v4(),
            slot_date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            start_time: "10:00:00".parse().unwrap(),
            end_time: "11:00:00".parse().unwrap(),
            service_name: "Consultation".to_string(),
            service_price_cents: 5_000,
            service_duration_minutes: 60,
            status,
            expires_at,
            payment_status: PaymentStatus::Unpaid,
            payment_amount_cents: 5_000,
            note: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    mod transition_tests {
        use super::*;

        #[test]
        fn test_pending_can_confirm_and_cancel() {
            assert!(BookingStatus::Pending.can_transition_to(BookingStatus::Confirmed));
            assert!(BookingStatus::Pending.can_transition_to(BookingStatus::Cancelled));
        }

        #[test]
        fn test_confirmed_can_cancel_and_complete() {
            assert!(BookingStatus::Confirmed.can_transition_to(BookingStatus::Cancelled));
            assert!(BookingStatus::Confirmed.can_transition_to(BookingStatus::Completed));
        }

        #[test]
        fn test_no_transition_out_of_cancelled() {
            for next in [
                BookingStatus::Pending,
                BookingStatus::Confirmed,
                BookingStatus::Cancelled,
                BookingStatus::Completed,
            ] {
                assert!(!BookingStatus::Cancelled.can_transition_to(next));
            }
        }

        #[test]
        fn test_completed_is_terminal() {
            for next in [
                BookingStatus::Pending,
                BookingStatus::Confirmed,
                BookingStatus::Cancelled,
                BookingStatus::Completed,
            ] {
                assert!(!BookingStatus::Completed.can_transition_to(next));
            }
        }

        #[test]
        fn test_holds_slot_only_while_non_terminal() {
            assert!(BookingStatus::Pending.holds_slot());
            assert!(BookingStatus::Confirmed.holds_slot());
            assert!(!BookingStatus::Cancelled.holds_slot());
            assert!(!BookingStatus::Completed.holds_slot());
        }
    }

    mod expiry_tests {
        use super::*;

        #[test]
        fn test_pending_past_deadline_is_expired() {
            let now = Utc::now();
            let b = booking(BookingStatus::Pending, Some(now - Duration::minutes(1)));
            assert!(b.is_expired_at(now));
        }

        #[test]
        fn test_pending_before_deadline_is_fresh() {
            let now = Utc::now();
            let b = booking(BookingStatus::Pending, Some(now + Duration::minutes(10)));
            assert!(!b.is_expired_at(now));
        }

        #[test]
        fn test_confirmed_has_no_deadline() {
            let b = booking(BookingStatus::Confirmed, None);
            assert!(!b.is_expired_at(Utc::now()));
        }

        #[test]
        fn test_deadline_boundary_counts_as_expired() {
            let now = Utc::now();
            let b = booking(BookingStatus::Pending, Some(now));
            assert!(b.is_expired_at(now));
        }
    }
}
