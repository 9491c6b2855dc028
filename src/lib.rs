//! roombook — an embeddable room-reservation engine.
//!
//! Interval algebra over half-open spans, recurrence expansion on civil
//! dates, collision detection under per-room write locks, occupancy
//! statistics, free-slot negotiation, and event-sourced persistence with a
//! group-commit WAL. One [`Engine`] per location; [`location::LocationManager`]
//! manages several.

pub mod engine;
pub mod limits;
pub mod location;
pub mod model;
pub mod notify;
pub mod observability;
pub mod reaper;
pub mod wal;

pub use engine::{Engine, EngineError};
pub use model::{Booking, BookingStatus, Repeat, Room, Series, Span};
