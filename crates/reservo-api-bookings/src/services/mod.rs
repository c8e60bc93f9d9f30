//! Service layer for booking operations.

pub mod availability_service;
pub mod booking_query_service;
pub mod booking_service;
pub mod notifications;

pub use availability_service::AvailabilityService;
pub use booking_query_service::{BookingBucket, BookingQueryService, BookingReport, MyBookings};
pub use booking_service::{BookingService, CancelActor, CreateHoldRequest};
pub use notifications::{BookingNotifier, LoggingNotifier, NotificationError};
