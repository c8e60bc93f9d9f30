//! Booking listing and reporting queries.
//!
//! Customers see their bookings grouped into derived buckets; admins get a
//! filtered listing with per-status counts and a revenue total.

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::instrument;

use reservo_core::CustomerId;
use reservo_db::{Booking, BookingFilter, BookingStatus, StatusCount};

use crate::error::ApiResult;

/// Derived display bucket for a customer's booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingBucket {
    /// Confirmed or completed, scheduled today or later.
    Upcoming,
    /// Held, awaiting confirmation.
    Pending,
    /// Confirmed or completed, scheduled before today.
    Past,
    /// Cancelled.
    Cancelled,
}

impl BookingBucket {
    /// Derive the bucket from status and the booking date relative to
    /// `today` (already evaluated in the configured timezone).
    #[must_use]
    pub fn derive(status: BookingStatus, slot_date: NaiveDate, today: NaiveDate) -> Self {
        match status {
            BookingStatus::Cancelled => Self::Cancelled,
            BookingStatus::Pending => Self::Pending,
            BookingStatus::Confirmed | BookingStatus::Completed => {
                if slot_date >= today {
                    Self::Upcoming
                } else {
                    Self::Past
                }
            }
        }
    }
}

/// A customer's bookings grouped by bucket.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MyBookings {
    /// Confirmed or completed bookings from today onward.
    pub upcoming: Vec<Booking>,
    /// Unconfirmed holds.
    pub pending: Vec<Booking>,
    /// Confirmed or completed bookings before today.
    pub past: Vec<Booking>,
    /// Cancelled bookings.
    pub cancelled: Vec<Booking>,
}

/// Admin listing plus aggregates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingReport {
    /// The filtered, paginated rows.
    pub bookings: Vec<Booking>,
    /// Booking counts per status under the same (non-status) filters.
    pub counts: Vec<StatusCount>,
    /// Revenue in cents over confirmed and completed bookings.
    pub revenue_cents: i64,
    /// When the report was generated.
    pub generated_at: chrono::DateTime<Utc>,
}

/// Read-side service for booking listings.
pub struct BookingQueryService {
    pool: PgPool,
    timezone: Tz,
}

impl BookingQueryService {
    /// Create a new query service evaluating "today" in `timezone`.
    #[must_use]
    pub fn new(pool: PgPool, timezone: Tz) -> Self {
        Self { pool, timezone }
    }

    /// List a customer's bookings grouped into display buckets.
    #[instrument(skip(self), fields(customer_id = %customer))]
    pub async fn list_my_bookings(&self, customer: CustomerId) -> ApiResult<MyBookings> {
        let rows = Booking::list_for_customer(&self.pool, customer.into_uuid()).await?;
        let today = Utc::now().with_timezone(&self.timezone).date_naive();

        let mut grouped = MyBookings::default();
        for booking in rows {
            match BookingBucket::derive(booking.status, booking.slot_date, today) {
                BookingBucket::Upcoming => grouped.upcoming.push(booking),
                BookingBucket::Pending => grouped.pending.push(booking),
                BookingBucket::Past => grouped.past.push(booking),
                BookingBucket::Cancelled => grouped.cancelled.push(booking),
            }
        }
        Ok(grouped)
    }

    /// List bookings with admin filters, plus per-status counts and the
    /// revenue total over confirmed and completed bookings.
    #[instrument(skip(self, filter))]
    pub async fn list_all_bookings(
        &self,
        filter: &BookingFilter,
        limit: i64,
        offset: i64,
    ) -> ApiResult<BookingReport> {
        let (bookings, counts, revenue_cents) = tokio::try_join!(
            Booking::list_filtered(&self.pool, filter, limit, offset),
            Booking::count_by_status(&self.pool, filter),
            Booking::revenue_total(&self.pool, filter),
        )?;

        Ok(BookingReport {
            bookings,
            counts,
            revenue_cents,
            generated_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_cancelled_wins_regardless_of_date() {
        let today = date(2026, 3, 10);
        assert_eq!(
            BookingBucket::derive(BookingStatus::Cancelled, date(2026, 3, 20), today),
            BookingBucket::Cancelled
        );
        assert_eq!(
            BookingBucket::derive(BookingStatus::Cancelled, date(2026, 3, 1), today),
            BookingBucket::Cancelled
        );
    }

    #[test]
    fn test_pending_is_its_own_bucket() {
        let today = date(2026, 3, 10);
        assert_eq!(
            BookingBucket::derive(BookingStatus::Pending, date(2026, 3, 1), today),
            BookingBucket::Pending
        );
    }

    #[test]
    fn test_confirmed_today_is_upcoming() {
        let today = date(2026, 3, 10);
        assert_eq!(
            BookingBucket::derive(BookingStatus::Confirmed, today, today),
            BookingBucket::Upcoming
        );
    }

    #[test]
    fn test_confirmed_yesterday_is_past() {
        let today = date(2026, 3, 10);
        assert_eq!(
            BookingBucket::derive(BookingStatus::Confirmed, date(2026, 3, 9), today),
            BookingBucket::Past
        );
    }

    #[test]
    fn test_completed_follows_date_rule() {
        let today = date(2026, 3, 10);
        assert_eq!(
            BookingBucket::derive(BookingStatus::Completed, date(2026, 3, 9), today),
            BookingBucket::Past
        );
        assert_eq!(
            BookingBucket::derive(BookingStatus::Completed, date(2026, 3, 11), today),
            BookingBucket::Upcoming
        );
    }
}
