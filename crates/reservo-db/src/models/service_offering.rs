//! Service offering entity model.
//!
//! A priced, time-boxed service a provider offers (name, price, duration).
//! Read-only input to hold creation; the booking engine never mutates it,
//! it only snapshots the fields onto the booking row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// A priced service offered by a provider.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ServiceOffering {
    /// Unique identifier.
    pub id: Uuid,

    /// Provider offering this service.
    pub provider_id: Uuid,

    /// Display name.
    pub name: String,

    /// Price in cents.
    pub price_cents: i64,

    /// How long the service takes, in minutes.
    pub duration_minutes: i32,

    /// Whether the service can currently be booked.
    pub active: bool,

    /// When the offering was created.
    pub created_at: DateTime<Utc>,

    /// When the offering was last updated.
    pub updated_at: DateTime<Utc>,
}

impl ServiceOffering {
    /// Find a service offering by ID.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r"
            SELECT * FROM service_offerings
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Find an active service offering by ID, scoped to its provider.
    pub async fn find_active(
        pool: &PgPool,
        provider_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r"
            SELECT * FROM service_offerings
            WHERE id = $1 AND provider_id = $2 AND active = TRUE
            ",
        )
        .bind(id)
        .bind(provider_id)
        .fetch_optional(pool)
        .await
    }

    /// List a provider's active offerings, ordered by name.
    pub async fn list_active(
        pool: &PgPool,
        provider_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r"
            SELECT * FROM service_offerings
            WHERE provider_id = $1 AND active = TRUE
            ORDER BY name
            ",
        )
        .bind(provider_id)
        .fetch_all(pool)
        .await
    }
}
