//! Expiry sweeper job.
//!
//! Periodically reclaims pending holds whose `expires_at` has passed:
//! select the expired rows, delete each by identity, then release each
//! deleted booking's slot. The identity delete is what makes the sweep safe
//! against the foreground engine: a row that was confirmed or cancelled
//! between select and delete no longer matches and is skipped, never acted
//! on from a stale snapshot.
//!
//! The deletion is the authoritative "this hold is gone" event. A slot
//! release failure afterwards is logged and counted but does not roll the
//! deletion back; the slot heals on its next release.

use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use reservo_db::{Booking, Slot};

use crate::config::BookingSettings;

/// Default maximum holds reclaimed per cycle.
pub const DEFAULT_BATCH_SIZE: i64 = 100;

/// Statistics from a single sweep cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Expired pending holds selected.
    pub examined: usize,
    /// Holds actually deleted.
    pub deleted: usize,
    /// Rows gone by the time of the identity delete (changed or already
    /// reclaimed between select and delete).
    pub skipped: usize,
    /// Slots released after deletion.
    pub slots_released: usize,
    /// Slot releases that failed (logged, not fatal).
    pub release_failures: usize,
    /// Per-row delete errors (logged, sweep continues).
    pub errors: usize,
}

impl SweepStats {
    /// Whether the cycle performed no mutations at all.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.deleted == 0 && self.slots_released == 0
    }
}

/// Errors that can occur during a sweep cycle.
#[derive(Debug, thiserror::Error)]
pub enum SweeperError {
    /// The expired-hold selection failed; the cycle is abandoned.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// The periodic task reclaiming expired pending holds.
pub struct ExpirySweeperJob {
    pool: PgPool,
    interval: Duration,
    batch_size: i64,
}

impl ExpirySweeperJob {
    /// Create a new sweeper with the configured interval.
    #[must_use]
    pub fn new(pool: PgPool, settings: &BookingSettings) -> Self {
        Self {
            pool,
            interval: settings.sweep_interval(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Create with a custom batch size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// The interval between cycles.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.interval
    }

    /// Run a single sweep cycle.
    ///
    /// Tolerates zero matches and per-row failures; only a failed selection
    /// aborts the cycle.
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> Result<SweepStats, SweeperError> {
        let now = chrono::Utc::now();
        let expired = Booking::find_expired_pending(&self.pool, now, self.batch_size).await?;

        let mut stats = SweepStats {
            examined: expired.len(),
            ..SweepStats::default()
        };

        if expired.is_empty() {
            debug!("No expired holds to reclaim");
            return Ok(stats);
        }

        info!(count = expired.len(), "Reclaiming expired holds");

        for booking in expired {
            let deleted = match Booking::delete_by_id(&self.pool, booking.id).await {
                Ok(deleted) => deleted,
                Err(e) => {
                    warn!(booking_id = %booking.id, error = %e, "Failed to delete expired hold");
                    stats.errors += 1;
                    continue;
                }
            };
            if !deleted {
                // The row changed hands between select and delete.
                stats.skipped += 1;
                continue;
            }
            stats.deleted += 1;

            // The deleted booking legitimately owned its hold, so an
            // unconditional release is safe.
            match Slot::release(&self.pool, booking.slot_id).await {
                Ok(()) => stats.slots_released += 1,
                Err(e) => {
                    warn!(
                        booking_id = %booking.id,
                        slot_id = %booking.slot_id,
                        error = %e,
                        "Expired hold deleted but slot release failed; slot stays blocked until released manually"
                    );
                    stats.release_failures += 1;
                }
            }
        }

        info!(
            examined = stats.examined,
            deleted = stats.deleted,
            skipped = stats.skipped,
            slots_released = stats.slots_released,
            release_failures = stats.release_failures,
            errors = stats.errors,
            "Sweep cycle complete"
        );
        Ok(stats)
    }

    /// Run one cycle on demand, returning the number of holds reclaimed.
    pub async fn manual_sweep(&self) -> Result<usize, SweeperError> {
        Ok(self.run_once().await?.deleted)
    }

    /// Run the sweep loop until `shutdown` flips to true or its sender is
    /// dropped. Intended to be spawned once at process init.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_secs = self.interval.as_secs(), "Expiry sweeper started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        // A failed cycle never crashes the host process.
                        error!(error = %e, "Sweep cycle failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Expiry sweeper stopping");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_stats_are_noop() {
        let stats = SweepStats::default();
        assert!(stats.is_noop());
        assert_eq!(stats.examined, 0);
    }

    #[test]
    fn test_examined_without_mutation_is_still_noop() {
        let stats = SweepStats {
            examined: 3,
            skipped: 3,
            ..SweepStats::default()
        };
        assert!(stats.is_noop());
    }

    #[test]
    fn test_deleted_is_not_noop() {
        let stats = SweepStats {
            examined: 1,
            deleted: 1,
            slots_released: 1,
            ..SweepStats::default()
        };
        assert!(!stats.is_noop());
    }

    #[test]
    fn test_sweeper_error_display() {
        let err = SweeperError::Database(sqlx::Error::RowNotFound);
        assert!(err.to_string().starts_with("Database error"));
    }
}
