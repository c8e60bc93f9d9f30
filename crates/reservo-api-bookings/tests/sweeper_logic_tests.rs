//! Sweep-cycle logic tests over simulated rows.
//!
//! Replays the sweeper's select, delete-by-identity, release sequence
//! against an in-memory set of bookings and slots, including the race
//! where a hold is confirmed between select and delete and the case where
//! a slot release fails after deletion.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use reservo_api_bookings::SweepStats;
use reservo_db::BookingStatus;

#[derive(Debug, Clone)]
struct SimBooking {
    id: Uuid,
    slot_id: Uuid,
    status: BookingStatus,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct SimStore {
    bookings: Vec<SimBooking>,
    unavailable_slots: Vec<Uuid>,
    failing_slots: Vec<Uuid>,
}

impl SimStore {
    fn add_expired_hold(&mut self, now: DateTime<Utc>) -> Uuid {
        self.add_hold(now - Duration::minutes(1))
    }

    fn add_hold(&mut self, expires_at: DateTime<Utc>) -> Uuid {
        let slot_id = Uuid::new_v4();
        self.unavailable_slots.push(slot_id);
        let id = Uuid::new_v4();
        self.bookings.push(SimBooking {
            id,
            slot_id,
            status: BookingStatus::Pending,
            expires_at: Some(expires_at),
        });
        id
    }

    /// The sweeper's selection: pending, with a deadline, past it.
    fn select_expired(&self, now: DateTime<Utc>) -> Vec<SimBooking> {
        self.bookings
            .iter()
            .filter(|b| {
                b.status == BookingStatus::Pending
                    && matches!(b.expires_at, Some(deadline) if deadline < now)
            })
            .cloned()
            .collect()
    }

    fn delete_by_id(&mut self, id: Uuid) -> bool {
        let before = self.bookings.len();
        self.bookings.retain(|b| b.id != id);
        self.bookings.len() < before
    }

    fn release(&mut self, slot_id: Uuid) -> Result<(), ()> {
        if self.failing_slots.contains(&slot_id) {
            return Err(());
        }
        self.unavailable_slots.retain(|s| *s != slot_id);
        Ok(())
    }
}

/// One sweep cycle with the production accounting rules.
fn sim_sweep(store: &mut SimStore, now: DateTime<Utc>) -> SweepStats {
    let expired = store.select_expired(now);
    let mut stats = SweepStats {
        examined: expired.len(),
        ..SweepStats::default()
    };

    for booking in expired {
        if !store.delete_by_id(booking.id) {
            stats.skipped += 1;
            continue;
        }
        stats.deleted += 1;
        match store.release(booking.slot_id) {
            Ok(()) => stats.slots_released += 1,
            Err(()) => stats.release_failures += 1,
        }
    }
    stats
}

#[test]
fn test_empty_store_is_noop() {
    let mut store = SimStore::default();
    let stats = sim_sweep(&mut store, Utc::now());
    assert!(stats.is_noop());
    assert_eq!(stats.examined, 0);
}

#[test]
fn test_expired_hold_is_deleted_and_slot_released() {
    let now = Utc::now();
    let mut store = SimStore::default();
    store.add_expired_hold(now);

    let stats = sim_sweep(&mut store, now);

    assert_eq!(stats.examined, 1);
    assert_eq!(stats.deleted, 1);
    assert_eq!(stats.slots_released, 1);
    assert!(store.bookings.is_empty());
    assert!(store.unavailable_slots.is_empty());
}

#[test]
fn test_fresh_hold_is_untouched() {
    let now = Utc::now();
    let mut store = SimStore::default();
    store.add_hold(now + Duration::minutes(10));

    let stats = sim_sweep(&mut store, now);

    assert!(stats.is_noop());
    assert_eq!(store.bookings.len(), 1);
}

#[test]
fn test_second_run_performs_zero_mutations() {
    let now = Utc::now();
    let mut store = SimStore::default();
    store.add_expired_hold(now);
    store.add_expired_hold(now);

    let first = sim_sweep(&mut store, now);
    assert_eq!(first.deleted, 2);

    let second = sim_sweep(&mut store, now);
    assert!(second.is_noop());
    assert_eq!(second.examined, 0);
}

#[test]
fn test_confirmed_between_select_and_delete_is_skipped() {
    let now = Utc::now();
    let mut store = SimStore::default();
    let id = store.add_expired_hold(now);

    // Simulate the race: selection happens, then a confirm lands before
    // the identity delete. The sweeper deletes the exact rows it selected;
    // a row that changed identity-wise (here: already removed and
    // re-recorded as confirmed) must not be acted on.
    let expired = store.select_expired(now);
    assert_eq!(expired.len(), 1);
    let slot_id = expired[0].slot_id;
    store.delete_by_id(id);
    store.bookings.push(SimBooking {
        id: Uuid::new_v4(),
        slot_id,
        status: BookingStatus::Confirmed,
        expires_at: None,
    });

    let mut stats = SweepStats {
        examined: expired.len(),
        ..SweepStats::default()
    };
    for booking in expired {
        if !store.delete_by_id(booking.id) {
            stats.skipped += 1;
            continue;
        }
        stats.deleted += 1;
    }

    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.deleted, 0);
    // The confirmed booking still holds its slot.
    assert!(store.unavailable_slots.contains(&slot_id));
}

#[test]
fn test_release_failure_does_not_resurrect_booking() {
    let now = Utc::now();
    let mut store = SimStore::default();
    let id = store.add_expired_hold(now);
    let slot_id = store.bookings[0].slot_id;
    store.failing_slots.push(slot_id);

    let stats = sim_sweep(&mut store, now);

    // Deletion stands; the stuck slot is only counted.
    assert_eq!(stats.deleted, 1);
    assert_eq!(stats.release_failures, 1);
    assert_eq!(stats.slots_released, 0);
    assert!(store.bookings.iter().all(|b| b.id != id));
    assert!(store.unavailable_slots.contains(&slot_id));
}

#[test]
fn test_partial_failure_mid_batch_continues() {
    let now = Utc::now();
    let mut store = SimStore::default();
    store.add_expired_hold(now);
    let failing = store.add_expired_hold(now);
    store.add_expired_hold(now);
    let failing_slot = store
        .bookings
        .iter()
        .find(|b| b.id == failing)
        .unwrap()
        .slot_id;
    store.failing_slots.push(failing_slot);

    let stats = sim_sweep(&mut store, now);

    assert_eq!(stats.examined, 3);
    assert_eq!(stats.deleted, 3);
    assert_eq!(stats.slots_released, 2);
    assert_eq!(stats.release_failures, 1);
}
