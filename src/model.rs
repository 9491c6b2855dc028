use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds — the only instant type.
pub type Ms = i64;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Common part of two spans, or None if they don't overlap.
    pub fn intersect(&self, other: &Span) -> Option<Span> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start < end { Some(Span::new(start, end)) } else { None }
    }
}

/// Civil day + time of day to unix ms. All civil values are UTC.
pub fn day_time_ms(day: NaiveDate, time: NaiveTime) -> Ms {
    day.and_time(time).and_utc().timestamp_millis()
}

/// The civil day an instant falls on, if the instant is representable.
pub fn day_of_ms(ms: Ms) -> Option<NaiveDate> {
    chrono::DateTime::from_timestamp_millis(ms).map(|dt| dt.date_naive())
}

/// Recurrence pattern of a booking series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Repeat {
    /// One continuous period, possibly spanning several days.
    Single,
    Daily,
    Weekly,
    EveryTwoWeeks,
    EveryThreeWeeks,
    /// Same weekday and same week-number-of-month as the first day
    /// (the "3rd Friday" rule).
    Monthly,
}

impl Repeat {
    /// Days between consecutive occurrences for the fixed-gap patterns.
    pub fn day_gap(&self) -> Option<i64> {
        match self {
            Repeat::Daily => Some(1),
            Repeat::Weekly => Some(7),
            Repeat::EveryTwoWeeks => Some(14),
            Repeat::EveryThreeWeeks => Some(21),
            Repeat::Single | Repeat::Monthly => None,
        }
    }
}

/// Shape of a possibly-recurring reservation.
///
/// For a repeating series, every matching day `D` in `[first_day, last_day]`
/// yields the occurrence span `[D+start_time, D+end_time)`. A `Single`
/// series is one continuous block from `first_day+start_time` to
/// `last_day+end_time`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Series {
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub repeat: Repeat,
    /// Days the series skips. Sorted, deduplicated.
    pub excluded_days: Vec<NaiveDate>,
}

impl Series {
    pub fn new(
        first_day: NaiveDate,
        last_day: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
        repeat: Repeat,
    ) -> Self {
        // A one-day series never repeats.
        let repeat = if first_day == last_day { Repeat::Single } else { repeat };
        Self {
            first_day,
            last_day,
            start_time,
            end_time,
            repeat,
            excluded_days: Vec::new(),
        }
    }

    pub fn single(day: NaiveDate, start_time: NaiveTime, end_time: NaiveTime) -> Self {
        Self::new(day, day, start_time, end_time, Repeat::Single)
    }

    /// Outer bound of all occurrence spans.
    pub fn envelope(&self) -> Span {
        Span::new(
            day_time_ms(self.first_day, self.start_time),
            day_time_ms(self.last_day, self.end_time),
        )
    }

    pub fn is_excluded(&self, day: NaiveDate) -> bool {
        self.excluded_days.binary_search(&day).is_ok()
    }

    /// Insert into the excluded-days list. Returns false if already present.
    pub fn exclude(&mut self, day: NaiveDate) -> bool {
        match self.excluded_days.binary_search(&day) {
            Ok(_) => false,
            Err(pos) => {
                self.excluded_days.insert(pos, day);
                true
            }
        }
    }

    /// Remove from the excluded-days list. Returns false if not present.
    pub fn include(&mut self, day: NaiveDate) -> bool {
        match self.excluded_days.binary_search(&day) {
            Ok(pos) => {
                self.excluded_days.remove(pos);
                true
            }
            Err(_) => false,
        }
    }
}

/// Lifecycle state of a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    /// Definitive reservation.
    Confirmed,
    /// Pre-booking awaiting confirmation; lapses at `expires_at`.
    Tentative { expires_at: Ms },
    /// Withdrawn by the person who booked.
    Cancelled,
    /// Turned down by the room responsible.
    Rejected { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub room_id: Ulid,
    pub series: Series,
    pub status: BookingStatus,
    pub booked_for: Option<String>,
    pub reason: Option<String>,
    pub created_by: Option<String>,
}

impl Booking {
    /// A booking occupies its room while confirmed or tentative-and-unexpired.
    pub fn is_live(&self, now: Ms) -> bool {
        match &self.status {
            BookingStatus::Confirmed => true,
            BookingStatus::Tentative { expires_at } => *expires_at > now,
            BookingStatus::Cancelled | BookingStatus::Rejected { .. } => false,
        }
    }

    pub fn is_tentative(&self) -> bool {
        matches!(self.status, BookingStatus::Tentative { .. })
    }

    /// A booking is archival once its last occurrence is entirely in the past.
    pub fn is_archival(&self, now: Ms) -> bool {
        self.series.envelope().end <= now
    }
}

/// A bookable room. Rooms are never hard deleted — deactivation flips
/// `is_active` and keeps the history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: Ulid,
    pub name: String,
    pub site: String,
    pub building: Option<String>,
    pub floor: Option<String>,
    /// Seat count.
    pub capacity: u32,
    pub surface_m2: Option<u32>,
    pub equipment: Vec<String>,
    pub custom_attrs: HashMap<String, String>,
    pub comments: Option<String>,
    pub responsible_email: Option<String>,
    pub is_active: bool,
    pub is_reservable: bool,
}

impl Room {
    pub fn new(id: Ulid, name: impl Into<String>, site: impl Into<String>, capacity: u32) -> Self {
        Self {
            id,
            name: name.into(),
            site: site.into(),
            building: None,
            floor: None,
            capacity,
            surface_m2: None,
            equipment: Vec::new(),
            custom_attrs: HashMap::new(),
            comments: None,
            responsible_email: None,
            is_active: true,
            is_reservable: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RoomState {
    pub room: Room,
    /// Every booking ever made for the room, sorted by envelope start.
    pub bookings: Vec<Booking>,
}

impl RoomState {
    pub fn new(room: Room) -> Self {
        Self {
            room,
            bookings: Vec::new(),
        }
    }

    /// Insert a booking maintaining sort order by envelope start.
    pub fn insert_booking(&mut self, booking: Booking) {
        let key = booking.series.envelope().start;
        let pos = self
            .bookings
            .binary_search_by_key(&key, |b| b.series.envelope().start)
            .unwrap_or_else(|e| e);
        self.bookings.insert(pos, booking);
    }

    /// Remove a booking by id (used when a series is rescheduled).
    pub fn remove_booking(&mut self, id: Ulid) -> Option<Booking> {
        let pos = self.bookings.iter().position(|b| b.id == id)?;
        Some(self.bookings.remove(pos))
    }

    pub fn booking(&self, id: Ulid) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == id)
    }

    pub fn booking_mut(&mut self, id: Ulid) -> Option<&mut Booking> {
        self.bookings.iter_mut().find(|b| b.id == id)
    }

    /// Bookings whose series envelope overlaps the query window.
    /// Uses binary search to skip bookings starting at or after `query.end`.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &Booking> {
        let right_bound = self
            .bookings
            .partition_point(|b| b.series.envelope().start < query.end);
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.series.envelope().end > query.start)
    }
}

/// The event types — flat, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RoomCreated {
        room: Room,
    },
    RoomUpdated {
        room: Room,
    },
    RoomDeactivated {
        id: Ulid,
    },
    RoomReactivated {
        id: Ulid,
    },
    BookingCreated {
        id: Ulid,
        room_id: Ulid,
        series: Series,
        status: BookingStatus,
        booked_for: Option<String>,
        reason: Option<String>,
        created_by: Option<String>,
    },
    BookingConfirmed {
        id: Ulid,
        room_id: Ulid,
    },
    BookingCancelled {
        id: Ulid,
        room_id: Ulid,
    },
    BookingRejected {
        id: Ulid,
        room_id: Ulid,
        reason: String,
    },
    BookingRescheduled {
        id: Ulid,
        room_id: Ulid,
        series: Series,
    },
    DayExcluded {
        id: Ulid,
        room_id: Ulid,
        day: NaiveDate,
    },
    DayIncluded {
        id: Ulid,
        room_id: Ulid,
        day: NaiveDate,
    },
}

// ── Query result types ───────────────────────────────────────────

/// One overlap between a candidate series and an existing booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collision {
    pub booking_id: Ulid,
    pub overlap: Span,
}

/// Live/archival × valid/cancelled/rejected booking counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BookingStats {
    pub live_valid: usize,
    pub live_cancelled: usize,
    pub live_rejected: usize,
    pub archival_valid: usize,
    pub archival_cancelled: usize,
    pub archival_rejected: usize,
}

impl BookingStats {
    pub(crate) fn count(&mut self, booking: &Booking, now: Ms) {
        let archival = booking.is_archival(now);
        match (&booking.status, archival) {
            (BookingStatus::Cancelled, true) => self.archival_cancelled += 1,
            (BookingStatus::Cancelled, false) => self.live_cancelled += 1,
            (BookingStatus::Rejected { .. }, true) => self.archival_rejected += 1,
            (BookingStatus::Rejected { .. }, false) => self.live_rejected += 1,
            (_, true) => self.archival_valid += 1,
            (_, false) => self.live_valid += 1,
        }
    }
}
