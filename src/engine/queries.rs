use chrono::NaiveDate;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::availability::{booked_spans, free_slots};
use super::conflict::{find_collisions, first_collision, now_ms, validate_series};
use super::negotiate::{Negotiation, Restriction};
use super::occupancy::{OccupancyPeriod, WORK_DAY_MS, booked_in_windows, working_windows};
use super::occurrence::overlaps_window;
use super::registry::RoomFilter;
use super::{Engine, EngineError};

fn validate_window(query: &Span) -> Result<(), EngineError> {
    if query.start >= query.end {
        return Err(EngineError::InvalidSeries("window end not after start"));
    }
    if query.duration_ms() > MAX_QUERY_WINDOW_MS {
        return Err(EngineError::LimitExceeded("query window too wide"));
    }
    Ok(())
}

fn validate_date_range(first_day: NaiveDate, last_day: NaiveDate) -> Result<(), EngineError> {
    if first_day > last_day {
        return Err(EngineError::InvalidSeries("range ends before it starts"));
    }
    if (last_day - first_day).num_days() > MAX_SERIES_DAYS {
        return Err(EngineError::LimitExceeded("query window too wide"));
    }
    Ok(())
}

impl Engine {
    pub async fn list_rooms(&self) -> Vec<Room> {
        let mut rooms = Vec::new();
        for rs in self.room_arcs() {
            let guard = rs.read().await;
            rooms.push(guard.room.clone());
        }
        rooms.sort_by(|a, b| a.name.cmp(&b.name));
        rooms
    }

    pub async fn room_info(&self, id: Ulid) -> Option<Room> {
        let rs = self.get_room(&id)?;
        let guard = rs.read().await;
        Some(guard.room.clone())
    }

    /// Bookings of a room, optionally only those touching a window.
    /// Unknown rooms yield an empty list.
    pub async fn get_bookings(
        &self,
        room_id: Ulid,
        window: Option<Span>,
    ) -> Result<Vec<Booking>, EngineError> {
        if let Some(ref w) = window {
            validate_window(w)?;
        }
        let rs = match self.get_room(&room_id) {
            Some(rs) => rs,
            None => return Ok(vec![]),
        };
        let guard = rs.read().await;
        Ok(guard
            .bookings
            .iter()
            .filter(|b| match &window {
                Some(w) => overlaps_window(&b.series, w),
                None => true,
            })
            .cloned()
            .collect())
    }

    pub async fn get_booking(&self, id: Ulid) -> Option<Booking> {
        let room_id = self.room_for_booking(&id)?;
        let rs = self.get_room(&room_id)?;
        let guard = rs.read().await;
        guard.booking(id).cloned()
    }

    /// All overlaps a candidate series would have with the room's live
    /// bookings. Unknown rooms yield an empty list.
    pub async fn find_collisions(
        &self,
        room_id: Ulid,
        candidate: &Series,
        sans_id: Option<Ulid>,
    ) -> Result<Vec<Collision>, EngineError> {
        validate_series(candidate)?;
        let rs = match self.get_room(&room_id) {
            Some(rs) => rs,
            None => return Ok(vec![]),
        };
        let guard = rs.read().await;
        Ok(find_collisions(&guard, candidate, sans_id, true, now_ms()))
    }

    pub async fn is_available(
        &self,
        room_id: Ulid,
        candidate: &Series,
    ) -> Result<bool, EngineError> {
        validate_series(candidate)?;
        let rs = match self.get_room(&room_id) {
            Some(rs) => rs,
            None => return Ok(false),
        };
        let guard = rs.read().await;
        Ok(first_collision(&guard, candidate, None, true, now_ms()).is_none())
    }

    /// Free sub-spans of the query window for a room.
    pub async fn free_slots(
        &self,
        room_id: Ulid,
        query_start: Ms,
        query_end: Ms,
        min_duration_ms: Option<Ms>,
    ) -> Result<Vec<Span>, EngineError> {
        let query = Span { start: query_start, end: query_end };
        validate_window(&query)?;
        let rs = match self.get_room(&room_id) {
            Some(rs) => rs,
            None => return Ok(vec![]),
        };
        let guard = rs.read().await;
        let mut free = free_slots(&guard, &query, now_ms());
        if let Some(min_dur) = min_duration_ms {
            free.retain(|span| span.duration_ms() >= min_dur);
        }
        Ok(free)
    }

    /// Booked-hours / bookable-hours ratio for one room over a date range.
    pub async fn room_occupancy(
        &self,
        room_id: Ulid,
        first_day: NaiveDate,
        last_day: NaiveDate,
    ) -> Result<f64, EngineError> {
        validate_date_range(first_day, last_day)?;
        let rs = match self.get_room(&room_id) {
            Some(rs) => rs,
            None => return Ok(0.0),
        };
        let guard = rs.read().await;
        Ok(super::occupancy::room_occupancy(
            &guard, first_day, last_day, now_ms(),
        ))
    }

    pub async fn room_occupancy_for(
        &self,
        room_id: Ulid,
        period: OccupancyPeriod,
    ) -> Result<f64, EngineError> {
        let today = day_of_ms(now_ms())
            .ok_or(EngineError::LimitExceeded("timestamp out of range"))?;
        let (first_day, last_day) = period.date_range(today);
        self.room_occupancy(room_id, first_day, last_day).await
    }

    /// Average occupancy of all active, reservable rooms over a date range.
    pub async fn average_occupancy(
        &self,
        first_day: NaiveDate,
        last_day: NaiveDate,
    ) -> Result<f64, EngineError> {
        validate_date_range(first_day, last_day)?;
        let windows = working_windows(first_day, last_day);
        if windows.is_empty() {
            return Ok(0.0);
        }
        let now = now_ms();
        let mut rooms: usize = 0;
        let mut booked: Ms = 0;
        for rs in self.room_arcs() {
            let guard = rs.read().await;
            if !guard.room.is_active || !guard.room.is_reservable {
                continue;
            }
            rooms += 1;
            booked += booked_in_windows(&guard, &windows, now);
        }
        if rooms == 0 {
            return Ok(0.0);
        }
        let bookable = windows.len() as Ms * WORK_DAY_MS * rooms as Ms;
        Ok((booked as f64 / bookable as f64).clamp(0.0, 1.0))
    }

    /// Query-by-example room search.
    pub async fn search_rooms(&self, filter: &RoomFilter) -> Result<Vec<Room>, EngineError> {
        if let Some(ref candidate) = filter.available_for {
            validate_series(candidate)?;
        }
        let now = now_ms();
        let mut rooms = Vec::new();
        for rs in self.room_arcs() {
            let guard = rs.read().await;
            if !filter.matches_room(&guard.room) {
                continue;
            }
            if let Some(ref candidate) = filter.available_for
                && first_collision(&guard, candidate, None, true, now).is_some() {
                    continue;
                }
            rooms.push(guard.room.clone());
        }
        rooms.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rooms)
    }

    /// Live/archival × valid/cancelled/rejected counts over every booking.
    pub async fn booking_stats(&self) -> BookingStats {
        let now = now_ms();
        let mut stats = BookingStats::default();
        for rs in self.room_arcs() {
            let guard = rs.read().await;
            for booking in &guard.bookings {
                stats.count(booking, now);
            }
        }
        stats
    }

    /// Total surface and capacity of active, reservable rooms.
    pub async fn total_surface_and_capacity(&self) -> (u64, u64) {
        let mut surface: u64 = 0;
        let mut capacity: u64 = 0;
        for rs in self.room_arcs() {
            let guard = rs.read().await;
            if !guard.room.is_active || !guard.room.is_reservable {
                continue;
            }
            surface += guard.room.surface_m2.unwrap_or(0) as u64;
            capacity += guard.room.capacity as u64;
        }
        (surface, capacity)
    }

    /// Negotiate free slots in a room: slide a candidate of `desired_ms`
    /// through the window in `step` increments, avoiding the room's live
    /// occurrences (hard) plus any caller-supplied restrictions.
    pub async fn negotiate_slot(
        &self,
        room_id: Ulid,
        window: Span,
        step: Ms,
        desired_ms: Ms,
        extra: &[Restriction],
    ) -> Result<Vec<Span>, EngineError> {
        validate_window(&window)?;
        let rs = match self.get_room(&room_id) {
            Some(rs) => rs,
            None => return Ok(vec![]),
        };
        let guard = rs.read().await;
        let mut negotiation = Negotiation::new(window, step, desired_ms)?;
        for span in booked_spans(&guard, &window, now_ms()) {
            negotiation.add_restriction(Restriction::hard(span))?;
        }
        for r in extra {
            negotiation.add_restriction(*r)?;
        }
        negotiation.find_all_solutions();
        Ok(negotiation.solutions().to_vec())
    }
}
