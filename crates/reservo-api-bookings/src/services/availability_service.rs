//! Open-slot queries.

use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::instrument;

use reservo_core::ServiceId;
use reservo_db::{ServiceOffering, Slot};

use crate::error::{ApiBookingsError, ApiResult};

/// Read-side service for listing bookable slots.
pub struct AvailabilityService {
    pool: PgPool,
}

impl AvailabilityService {
    /// Create a new availability service.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List available slots that could hold a service in a date range.
    ///
    /// The service's provider scopes the search, and only slots whose
    /// window is at least as long as the service's duration are returned;
    /// a shorter slot could never hold the service.
    #[instrument(skip(self), fields(service_id = %service_id))]
    pub async fn list_open_slots(
        &self,
        service_id: ServiceId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ApiResult<Vec<Slot>> {
        if from > to {
            return Err(ApiBookingsError::Validation(
                "date range start is after its end".to_string(),
            ));
        }

        let id = service_id.into_uuid();
        let service = ServiceOffering::find_by_id(&self.pool, id)
            .await?
            .filter(|s| s.active)
            .ok_or(ApiBookingsError::ServiceNotFound(id))?;

        let slots = Slot::list_available(
            &self.pool,
            Some(service.provider_id),
            from,
            to,
            service.duration_minutes,
        )
        .await?;

        Ok(slots)
    }
}
