//! Slot entity model.
//!
//! A slot is a schedulable time window owned by a provider. The booking
//! engine never creates or destroys slots; it only flips `is_available`,
//! always in the opposite direction of the booking transition that caused
//! the flip (a hold claims the slot, a cancellation or expiry releases it).

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use reservo_core::{ProviderId, SlotId};

/// A schedulable time window for a resource provider.
///
/// Invariant: `is_available` is false iff exactly one non-terminal
/// (pending or confirmed) booking currently references this slot. The
/// service layer maintains this through guarded claims and compensations.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Slot {
    /// Unique identifier.
    pub id: Uuid,

    /// Provider that owns this slot.
    pub provider_id: Uuid,

    /// Calendar date of the window.
    pub slot_date: NaiveDate,

    /// Window start.
    pub start_time: NaiveTime,

    /// Window end.
    pub end_time: NaiveTime,

    /// Whether the slot can currently be held.
    pub is_available: bool,

    /// When the slot was created.
    pub created_at: DateTime<Utc>,

    /// When the slot was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Slot {
    /// Get the slot ID as a typed `SlotId`.
    #[must_use]
    pub fn slot_id(&self) -> SlotId {
        SlotId::from_uuid(self.id)
    }

    /// Get the owning provider's ID as a typed `ProviderId`.
    #[must_use]
    pub fn provider_id(&self) -> ProviderId {
        ProviderId::from_uuid(self.provider_id)
    }

    /// Length of the slot window in whole minutes.
    #[must_use]
    pub fn window_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }

    /// Whether the window can accommodate a service of `duration_minutes`.
    #[must_use]
    pub fn fits_duration(&self, duration_minutes: i32) -> bool {
        self.window_minutes() >= i64::from(duration_minutes)
    }

    /// Find a slot by ID.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r"
            SELECT * FROM slots
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Find a slot by ID, scoped to its owning provider.
    pub async fn find_for_provider(
        pool: &PgPool,
        provider_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r"
            SELECT * FROM slots
            WHERE id = $1 AND provider_id = $2
            ",
        )
        .bind(id)
        .bind(provider_id)
        .fetch_optional(pool)
        .await
    }

    /// Claim the slot for a hold, guarded on it still being available.
    ///
    /// Compare-and-swap semantics: the update matches zero rows if another
    /// actor already claimed the slot, and a `false` return is a definitive
    /// conflict signal rather than an error.
    pub async fn claim(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r"
            UPDATE slots
            SET is_available = FALSE, updated_at = NOW()
            WHERE id = $1 AND is_available = TRUE
            ",
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Release the slot back to availability.
    ///
    /// Unconditional and idempotent: releasing an already-available slot is
    /// harmless, which keeps compensation retries safe.
    pub async fn release(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r"
            UPDATE slots
            SET is_available = TRUE, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Re-mark the slot as held without an availability guard.
    ///
    /// Used only by reschedule compensation, where the caller held the slot
    /// moments ago and must undo its own release. Idempotent.
    pub async fn reclaim(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r"
            UPDATE slots
            SET is_available = FALSE, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// List available slots in a date range whose window is at least
    /// `min_window_minutes` long, ordered by date and start time.
    pub async fn list_available(
        pool: &PgPool,
        provider_id: Option<Uuid>,
        from: NaiveDate,
        to: NaiveDate,
        min_window_minutes: i32,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut query = String::from(
            r"
            SELECT * FROM slots
            WHERE is_available = TRUE
              AND slot_date BETWEEN $1 AND $2
              AND end_time - start_time >= make_interval(mins => $3)
            ",
        );
        if provider_id.is_some() {
            query.push_str(" AND provider_id = $4");
        }
        query.push_str(" ORDER BY slot_date, start_time");

        let mut q = sqlx::query_as::<_, Self>(&query)
            .bind(from)
            .bind(to)
            .bind(min_window_minutes);
        if let Some(provider_id) = provider_id {
            q = q.bind(provider_id);
        }

        q.fetch_all(pool).await
    }
}
