use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::{RwLock, oneshot};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability::OPS_TOTAL;

use super::conflict::{check_no_conflict, now_ms, validate_series};
use super::{Engine, EngineError, WalCommand};

fn validate_room(room: &Room) -> Result<(), EngineError> {
    if room.name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("room name too long"));
    }
    if room.site.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("site name too long"));
    }
    if let Some(ref c) = room.comments
        && c.len() > MAX_TEXT_LEN {
            return Err(EngineError::LimitExceeded("comments too long"));
        }
    if room.equipment.len() > MAX_EQUIPMENT_ITEMS {
        return Err(EngineError::LimitExceeded("too many equipment items"));
    }
    if room.custom_attrs.len() > MAX_CUSTOM_ATTRS {
        return Err(EngineError::LimitExceeded("too many custom attributes"));
    }
    Ok(())
}

fn validate_label(label: &Option<String>) -> Result<(), EngineError> {
    if let Some(l) = label
        && l.len() > MAX_TEXT_LEN {
            return Err(EngineError::LimitExceeded("label too long"));
        }
    Ok(())
}

impl Engine {
    pub async fn create_room(&self, room: Room) -> Result<(), EngineError> {
        validate_room(&room)?;
        if self.state.len() >= MAX_ROOMS_PER_LOCATION {
            return Err(EngineError::LimitExceeded("too many rooms"));
        }
        if self.state.contains_key(&room.id) {
            return Err(EngineError::AlreadyExists(room.id));
        }

        let event = Event::RoomCreated { room: room.clone() };
        self.wal_append(&event).await?;
        let id = room.id;
        self.state.insert(id, Arc::new(RwLock::new(RoomState::new(room))));
        self.notify.send(id, &event);
        Ok(())
    }

    pub async fn update_room(&self, room: Room) -> Result<(), EngineError> {
        validate_room(&room)?;
        let rs = self
            .get_room(&room.id)
            .ok_or(EngineError::NotFound(room.id))?;
        let mut guard = rs.write().await;

        let id = room.id;
        let event = Event::RoomUpdated { room };
        self.persist_and_apply(id, &mut guard, &event).await
    }

    /// Rooms are never deleted — deactivation hides them from search and
    /// blocks new bookings while keeping history intact.
    pub async fn deactivate_room(&self, id: Ulid) -> Result<(), EngineError> {
        let rs = self.get_room(&id).ok_or(EngineError::NotFound(id))?;
        let mut guard = rs.write().await;
        let event = Event::RoomDeactivated { id };
        self.persist_and_apply(id, &mut guard, &event).await
    }

    pub async fn reactivate_room(&self, id: Ulid) -> Result<(), EngineError> {
        let rs = self.get_room(&id).ok_or(EngineError::NotFound(id))?;
        let mut guard = rs.write().await;
        let event = Event::RoomReactivated { id };
        self.persist_and_apply(id, &mut guard, &event).await
    }

    /// Create a confirmed booking. The conflict check and the insertion
    /// happen under the room's write lock, so two concurrent requests for
    /// the same slot cannot both succeed.
    pub async fn book(
        &self,
        id: Ulid,
        room_id: Ulid,
        series: Series,
        booked_for: Option<String>,
        reason: Option<String>,
        created_by: Option<String>,
    ) -> Result<(), EngineError> {
        validate_series(&series)?;
        validate_label(&booked_for)?;
        validate_label(&reason)?;
        let rs = self
            .get_room(&room_id)
            .ok_or(EngineError::NotFound(room_id))?;
        let mut guard = rs.write().await;
        if !guard.room.is_active || !guard.room.is_reservable {
            return Err(EngineError::RoomNotBookable(room_id));
        }
        if guard.bookings.len() >= MAX_BOOKINGS_PER_ROOM {
            return Err(EngineError::LimitExceeded("too many bookings on room"));
        }

        check_no_conflict(&guard, &series, None, true, now_ms())?;

        let event = Event::BookingCreated {
            id,
            room_id,
            series,
            status: BookingStatus::Confirmed,
            booked_for,
            reason,
            created_by,
        };
        self.persist_and_apply(room_id, &mut guard, &event).await?;
        metrics::counter!(OPS_TOTAL, "op" => "book").increment(1);
        Ok(())
    }

    /// Create a tentative booking that lapses at `expires_at` unless
    /// confirmed. Tentative bookings may compete with each other for a
    /// slot; only confirmed bookings block them.
    #[allow(clippy::too_many_arguments)]
    pub async fn prebook(
        &self,
        id: Ulid,
        room_id: Ulid,
        series: Series,
        expires_at: Ms,
        booked_for: Option<String>,
        reason: Option<String>,
        created_by: Option<String>,
    ) -> Result<(), EngineError> {
        validate_series(&series)?;
        validate_label(&booked_for)?;
        validate_label(&reason)?;
        let rs = self
            .get_room(&room_id)
            .ok_or(EngineError::NotFound(room_id))?;
        let mut guard = rs.write().await;
        if !guard.room.is_active || !guard.room.is_reservable {
            return Err(EngineError::RoomNotBookable(room_id));
        }
        if guard.bookings.len() >= MAX_BOOKINGS_PER_ROOM {
            return Err(EngineError::LimitExceeded("too many bookings on room"));
        }

        check_no_conflict(&guard, &series, None, false, now_ms())?;

        let event = Event::BookingCreated {
            id,
            room_id,
            series,
            status: BookingStatus::Tentative { expires_at },
            booked_for,
            reason,
            created_by,
        };
        self.persist_and_apply(room_id, &mut guard, &event).await?;
        metrics::counter!(OPS_TOTAL, "op" => "prebook").increment(1);
        Ok(())
    }

    /// Promote a tentative booking. Re-validates under the write lock:
    /// among competing tentatives, the first confirmation wins and the
    /// rest fail with a conflict.
    pub async fn confirm_booking(&self, id: Ulid) -> Result<Ulid, EngineError> {
        let (room_id, mut guard) = self.resolve_booking_write(&id).await?;
        let now = now_ms();
        let booking = guard.booking(id).ok_or(EngineError::NotFound(id))?;
        match booking.status {
            BookingStatus::Tentative { expires_at } => {
                if expires_at <= now {
                    return Err(EngineError::TentativeLapsed(id));
                }
            }
            _ => return Err(EngineError::NotTentative(id)),
        }
        let series = booking.series.clone();
        check_no_conflict(&guard, &series, Some(id), false, now)?;

        let event = Event::BookingConfirmed { id, room_id };
        self.persist_and_apply(room_id, &mut guard, &event).await?;
        metrics::counter!(OPS_TOTAL, "op" => "confirm").increment(1);
        Ok(room_id)
    }

    pub async fn cancel_booking(&self, id: Ulid) -> Result<Ulid, EngineError> {
        let (room_id, mut guard) = self.resolve_booking_write(&id).await?;
        let booking = guard.booking(id).ok_or(EngineError::NotFound(id))?;
        if matches!(
            booking.status,
            BookingStatus::Cancelled | BookingStatus::Rejected { .. }
        ) {
            return Err(EngineError::AlreadyClosed(id));
        }
        let event = Event::BookingCancelled { id, room_id };
        self.persist_and_apply(room_id, &mut guard, &event).await?;
        metrics::counter!(OPS_TOTAL, "op" => "cancel").increment(1);
        Ok(room_id)
    }

    pub async fn reject_booking(&self, id: Ulid, reason: String) -> Result<Ulid, EngineError> {
        if reason.len() > MAX_TEXT_LEN {
            return Err(EngineError::LimitExceeded("rejection reason too long"));
        }
        let (room_id, mut guard) = self.resolve_booking_write(&id).await?;
        let booking = guard.booking(id).ok_or(EngineError::NotFound(id))?;
        if matches!(
            booking.status,
            BookingStatus::Cancelled | BookingStatus::Rejected { .. }
        ) {
            return Err(EngineError::AlreadyClosed(id));
        }
        let event = Event::BookingRejected { id, room_id, reason };
        self.persist_and_apply(room_id, &mut guard, &event).await?;
        metrics::counter!(OPS_TOTAL, "op" => "reject").increment(1);
        Ok(room_id)
    }

    /// Replace the series of a live booking, re-running the conflict check
    /// (skipping the booking itself).
    pub async fn reschedule_booking(&self, id: Ulid, series: Series) -> Result<Ulid, EngineError> {
        validate_series(&series)?;
        let (room_id, mut guard) = self.resolve_booking_write(&id).await?;
        let now = now_ms();
        let booking = guard.booking(id).ok_or(EngineError::NotFound(id))?;
        if !booking.is_live(now) {
            return Err(EngineError::AlreadyClosed(id));
        }
        let count_tentative = !booking.is_tentative();
        check_no_conflict(&guard, &series, Some(id), count_tentative, now)?;

        let event = Event::BookingRescheduled { id, room_id, series };
        self.persist_and_apply(room_id, &mut guard, &event).await?;
        Ok(room_id)
    }

    /// Skip one day of a repeating series ("every week except …").
    pub async fn exclude_day(&self, id: Ulid, day: NaiveDate) -> Result<Ulid, EngineError> {
        let (room_id, mut guard) = self.resolve_booking_write(&id).await?;
        let booking = guard.booking(id).ok_or(EngineError::NotFound(id))?;
        if booking.series.repeat == Repeat::Single {
            return Err(EngineError::NotRepeating(id));
        }
        if booking.series.is_excluded(day) {
            return Ok(room_id); // already excluded — nothing to record
        }
        if booking.series.excluded_days.len() >= MAX_EXCLUDED_DAYS {
            return Err(EngineError::LimitExceeded("too many excluded days"));
        }
        let event = Event::DayExcluded { id, room_id, day };
        self.persist_and_apply(room_id, &mut guard, &event).await?;
        Ok(room_id)
    }

    /// Put a previously excluded day back into the series.
    pub async fn include_day(&self, id: Ulid, day: NaiveDate) -> Result<Ulid, EngineError> {
        let (room_id, mut guard) = self.resolve_booking_write(&id).await?;
        let booking = guard.booking(id).ok_or(EngineError::NotFound(id))?;
        if booking.series.repeat == Repeat::Single {
            return Err(EngineError::NotRepeating(id));
        }
        if !booking.series.is_excluded(day) {
            return Ok(room_id);
        }
        // The day rejoins the series, so it must not clash with other bookings.
        let now = now_ms();
        let mut restored = booking.series.clone();
        restored.include(day);
        let count_tentative = !booking.is_tentative();
        check_no_conflict(&guard, &restored, Some(id), count_tentative, now)?;

        let event = Event::DayIncluded { id, room_id, day };
        self.persist_and_apply(room_id, &mut guard, &event).await?;
        Ok(room_id)
    }

    /// Tentative bookings whose lapse deadline has passed, as
    /// `(booking_id, room_id)` pairs. Used by the reaper.
    pub fn collect_lapsed_tentative(&self, now: Ms) -> Vec<(Ulid, Ulid)> {
        let mut lapsed = Vec::new();
        for entry in self.state.iter() {
            let rs = entry.value().clone();
            if let Ok(guard) = rs.try_read() {
                for booking in &guard.bookings {
                    if let BookingStatus::Tentative { expires_at } = booking.status
                        && expires_at <= now {
                            lapsed.push((booking.id, guard.room.id));
                        }
                }
            }
        }
        lapsed
    }

    /// Compact the WAL by rewriting it with only the events needed to
    /// recreate the current state. Lapsed tentative bookings are dropped.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let now = now_ms();
        let mut events = Vec::new();

        for rs in self.room_arcs() {
            let guard = rs.read().await;
            events.push(Event::RoomCreated { room: guard.room.clone() });
            for booking in &guard.bookings {
                if let BookingStatus::Tentative { expires_at } = booking.status
                    && expires_at <= now {
                        continue;
                    }
                events.push(Event::BookingCreated {
                    id: booking.id,
                    room_id: guard.room.id,
                    series: booking.series.clone(),
                    status: booking.status.clone(),
                    booked_for: booking.booked_for.clone(),
                    reason: booking.reason.clone(),
                    created_by: booking.created_by.clone(),
                });
            }
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
