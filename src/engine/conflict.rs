use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::EngineError;
use super::occurrence::expand;

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as Ms
}

pub(crate) fn validate_series(series: &Series) -> Result<(), EngineError> {
    if series.first_day > series.last_day {
        return Err(EngineError::InvalidSeries("series ends before it starts"));
    }
    if series.repeat != Repeat::Single && series.start_time >= series.end_time {
        return Err(EngineError::InvalidSeries("occurrence end not after start"));
    }
    if series.repeat == Repeat::Single
        && series.first_day == series.last_day
        && series.start_time >= series.end_time
    {
        return Err(EngineError::InvalidSeries("period end not after start"));
    }
    let env = series.envelope();
    if env.start < MIN_VALID_TIMESTAMP_MS || env.end > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    if (series.last_day - series.first_day).num_days() > MAX_SERIES_DAYS {
        return Err(EngineError::LimitExceeded("series too long"));
    }
    if series.excluded_days.len() > MAX_EXCLUDED_DAYS {
        return Err(EngineError::LimitExceeded("too many excluded days"));
    }
    Ok(())
}

// ── Span-list intersection ───────────────────────────────────────

/// Overlaps between two sorted disjoint span lists, two-pointer merge scan.
pub fn intersect_sorted(a: &[Span], b: &[Span]) -> Vec<Span> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if let Some(common) = a[i].intersect(&b[j]) {
            out.push(common);
        }
        // Drop whichever span ends first; the other may still overlap more.
        if a[i].end <= b[j].end {
            i += 1;
        } else {
            j += 1;
        }
    }
    out
}

fn intersects_any(a: &[Span], b: &[Span]) -> bool {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i].overlaps(&b[j]) {
            return true;
        }
        if a[i].end <= b[j].end {
            i += 1;
        } else {
            j += 1;
        }
    }
    false
}

// ── Collision detection ──────────────────────────────────────────

/// Whether a booking participates in conflict checks against a candidate.
/// Tentative candidates tolerate other tentatives (they compete for the
/// slot until one is confirmed); confirmed candidates tolerate nothing.
fn blocks_candidate(booking: &Booking, count_tentative: bool, now: Ms) -> bool {
    if !booking.is_live(now) {
        return false;
    }
    count_tentative || !booking.is_tentative()
}

/// All overlaps between the candidate's occurrences and existing live
/// bookings of the room. `sans_id` skips one booking (conflict-with-self
/// during updates).
pub(crate) fn find_collisions(
    rs: &RoomState,
    candidate: &Series,
    sans_id: Option<Ulid>,
    count_tentative: bool,
    now: Ms,
) -> Vec<Collision> {
    let candidate_occs: Vec<Span> = expand(candidate).iter().map(|o| o.span).collect();
    let envelope = candidate.envelope();

    let mut collisions = Vec::new();
    for booking in rs.overlapping(&envelope) {
        if Some(booking.id) == sans_id || !blocks_candidate(booking, count_tentative, now) {
            continue;
        }
        let booking_occs: Vec<Span> = expand(&booking.series).iter().map(|o| o.span).collect();
        for overlap in intersect_sorted(&candidate_occs, &booking_occs) {
            collisions.push(Collision {
                booking_id: booking.id,
                overlap,
            });
        }
    }
    collisions
}

/// Early-exit variant of `find_collisions`: the id of the first blocking
/// booking, or None.
pub(crate) fn first_collision(
    rs: &RoomState,
    candidate: &Series,
    sans_id: Option<Ulid>,
    count_tentative: bool,
    now: Ms,
) -> Option<Ulid> {
    let candidate_occs: Vec<Span> = expand(candidate).iter().map(|o| o.span).collect();
    let envelope = candidate.envelope();

    for booking in rs.overlapping(&envelope) {
        if Some(booking.id) == sans_id || !blocks_candidate(booking, count_tentative, now) {
            continue;
        }
        let booking_occs: Vec<Span> = expand(&booking.series).iter().map(|o| o.span).collect();
        if intersects_any(&candidate_occs, &booking_occs) {
            return Some(booking.id);
        }
    }
    None
}

pub(crate) fn check_no_conflict(
    rs: &RoomState,
    candidate: &Series,
    sans_id: Option<Ulid>,
    count_tentative: bool,
    now: Ms,
) -> Result<(), EngineError> {
    match first_collision(rs, candidate, sans_id, count_tentative, now) {
        Some(id) => {
            metrics::counter!(crate::observability::CONFLICTS_TOTAL).increment(1);
            Err(EngineError::Conflict(id))
        }
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn t(h: u32, min: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, min, 0).unwrap()
    }

    fn room_with(bookings: Vec<Booking>) -> RoomState {
        let mut rs = RoomState::new(Room::new(Ulid::new(), "A", "north", 8));
        for b in bookings {
            rs.insert_booking(b);
        }
        rs
    }

    fn confirmed(series: Series) -> Booking {
        Booking {
            id: Ulid::new(),
            room_id: Ulid::new(),
            series,
            status: BookingStatus::Confirmed,
            booked_for: None,
            reason: None,
            created_by: None,
        }
    }

    fn tentative(series: Series, expires_at: Ms) -> Booking {
        Booking {
            status: BookingStatus::Tentative { expires_at },
            ..confirmed(series)
        }
    }

    // ── intersect_sorted ─────────────────────────────────

    #[test]
    fn intersect_disjoint() {
        let a = vec![Span::new(0, 100), Span::new(200, 300)];
        let b = vec![Span::new(100, 200), Span::new(300, 400)];
        assert!(intersect_sorted(&a, &b).is_empty());
        assert!(!intersects_any(&a, &b));
    }

    #[test]
    fn intersect_partial_and_contained() {
        let a = vec![Span::new(0, 100), Span::new(200, 500)];
        let b = vec![Span::new(50, 250), Span::new(300, 350)];
        assert_eq!(
            intersect_sorted(&a, &b),
            vec![Span::new(50, 100), Span::new(200, 250), Span::new(300, 350)]
        );
        assert!(intersects_any(&a, &b));
    }

    #[test]
    fn intersect_one_covering_many() {
        let a = vec![Span::new(0, 1000)];
        let b = vec![Span::new(100, 200), Span::new(400, 500)];
        assert_eq!(
            intersect_sorted(&a, &b),
            vec![Span::new(100, 200), Span::new(400, 500)]
        );
        // Symmetric.
        assert_eq!(intersect_sorted(&a, &b), intersect_sorted(&b, &a));
    }

    // ── validate_series ──────────────────────────────────

    #[test]
    fn validate_rejects_backwards_series() {
        let s = Series::new(d(2024, 3, 8), d(2024, 3, 4), t(9, 0), t(10, 0), Repeat::Daily);
        assert!(matches!(
            validate_series(&s),
            Err(EngineError::InvalidSeries(_))
        ));
    }

    #[test]
    fn validate_rejects_backwards_times() {
        let s = Series::new(d(2024, 3, 4), d(2024, 3, 8), t(10, 0), t(9, 0), Repeat::Daily);
        assert!(matches!(
            validate_series(&s),
            Err(EngineError::InvalidSeries(_))
        ));
        // A multi-day Single block may cross midnight.
        let block = Series::new(d(2024, 3, 4), d(2024, 3, 5), t(18, 0), t(8, 0), Repeat::Single);
        assert!(validate_series(&block).is_ok());
    }

    #[test]
    fn validate_rejects_too_long_series() {
        let s = Series::new(d(2024, 1, 1), d(2030, 1, 1), t(9, 0), t(10, 0), Repeat::Daily);
        assert!(matches!(
            validate_series(&s),
            Err(EngineError::LimitExceeded(_))
        ));
    }

    // ── collisions ───────────────────────────────────────

    #[test]
    fn single_day_collision() {
        let existing = confirmed(Series::single(d(2024, 3, 4), t(9, 0), t(11, 0)));
        let existing_id = existing.id;
        let rs = room_with(vec![existing]);

        let candidate = Series::single(d(2024, 3, 4), t(10, 0), t(12, 0));
        let collisions = find_collisions(&rs, &candidate, None, true, 0);
        assert_eq!(collisions.len(), 1);
        assert_eq!(collisions[0].booking_id, existing_id);
        assert_eq!(
            collisions[0].overlap,
            Span::new(
                day_time_ms(d(2024, 3, 4), t(10, 0)),
                day_time_ms(d(2024, 3, 4), t(11, 0)),
            )
        );
    }

    #[test]
    fn adjacent_periods_do_not_collide() {
        let rs = room_with(vec![confirmed(Series::single(d(2024, 3, 4), t(9, 0), t(10, 0)))]);
        let candidate = Series::single(d(2024, 3, 4), t(10, 0), t(11, 0));
        assert!(find_collisions(&rs, &candidate, None, true, 0).is_empty());
    }

    #[test]
    fn weekly_series_collides_only_on_pattern_days() {
        // Mondays 9:00–10:00 for a month.
        let weekly = confirmed(Series::new(
            d(2024, 3, 4),
            d(2024, 4, 1),
            t(9, 0),
            t(10, 0),
            Repeat::Weekly,
        ));
        let rs = room_with(vec![weekly]);

        let on_monday = Series::single(d(2024, 3, 11), t(9, 30), t(10, 30));
        assert_eq!(find_collisions(&rs, &on_monday, None, true, 0).len(), 1);

        let on_tuesday = Series::single(d(2024, 3, 12), t(9, 30), t(10, 30));
        assert!(find_collisions(&rs, &on_tuesday, None, true, 0).is_empty());
    }

    #[test]
    fn excluded_day_does_not_collide() {
        let mut series = Series::new(d(2024, 3, 4), d(2024, 4, 1), t(9, 0), t(10, 0), Repeat::Weekly);
        series.exclude(d(2024, 3, 11));
        let rs = room_with(vec![confirmed(series)]);

        let candidate = Series::single(d(2024, 3, 11), t(9, 0), t(10, 0));
        assert!(find_collisions(&rs, &candidate, None, true, 0).is_empty());
    }

    #[test]
    fn two_weekly_series_same_weekday_collide_on_every_shared_monday() {
        let a = confirmed(Series::new(d(2024, 3, 4), d(2024, 3, 25), t(9, 0), t(10, 0), Repeat::Weekly));
        let rs = room_with(vec![a]);

        let b = Series::new(d(2024, 3, 11), d(2024, 4, 1), t(9, 30), t(10, 30), Repeat::Weekly);
        let collisions = find_collisions(&rs, &b, None, true, 0);
        // Shared Mondays: 3/11, 3/18, 3/25.
        assert_eq!(collisions.len(), 3);
    }

    #[test]
    fn cancelled_and_lapsed_do_not_block() {
        let slot = Series::single(d(2024, 3, 4), t(9, 0), t(10, 0));
        let mut cancelled = confirmed(slot.clone());
        cancelled.status = BookingStatus::Cancelled;
        let lapsed = tentative(slot.clone(), 1_000);
        let rs = room_with(vec![cancelled, lapsed]);

        let now = 2_000; // past the tentative deadline
        assert!(find_collisions(&rs, &slot, None, true, now).is_empty());
    }

    #[test]
    fn tentative_candidate_tolerates_tentatives() {
        let slot = Series::single(d(2024, 3, 4), t(9, 0), t(10, 0));
        let pending = tentative(slot.clone(), Ms::MAX);
        let rs = room_with(vec![pending]);

        // A competing tentative is allowed...
        assert!(first_collision(&rs, &slot, None, false, 0).is_none());
        // ...but a confirmed candidate is blocked.
        assert!(first_collision(&rs, &slot, None, true, 0).is_some());
    }

    #[test]
    fn sans_id_skips_self() {
        let slot = Series::single(d(2024, 3, 4), t(9, 0), t(10, 0));
        let existing = confirmed(slot.clone());
        let id = existing.id;
        let rs = room_with(vec![existing]);

        assert!(find_collisions(&rs, &slot, Some(id), true, 0).is_empty());
        assert_eq!(find_collisions(&rs, &slot, None, true, 0).len(), 1);
    }

    #[test]
    fn collision_is_symmetric() {
        let a = Series::new(d(2024, 3, 4), d(2024, 3, 25), t(9, 0), t(11, 0), Repeat::Weekly);
        let b = Series::new(d(2024, 3, 11), d(2024, 4, 1), t(10, 0), t(12, 0), Repeat::Weekly);

        let rs_a = room_with(vec![confirmed(a.clone())]);
        let rs_b = room_with(vec![confirmed(b.clone())]);

        let hits_ab = find_collisions(&rs_a, &b, None, true, 0);
        let hits_ba = find_collisions(&rs_b, &a, None, true, 0);
        let spans_ab: Vec<Span> = hits_ab.iter().map(|c| c.overlap).collect();
        let spans_ba: Vec<Span> = hits_ba.iter().map(|c| c.overlap).collect();
        assert_eq!(spans_ab, spans_ba);
        assert!(!spans_ab.is_empty());
    }
}
