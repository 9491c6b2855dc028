use crate::model::*;

use super::occurrence::expand;

// ── Free-slot algebra ────────────────────────────────────────────

/// Live occurrence spans of a room clipped to the query window,
/// sorted and merged into a disjoint list.
pub(crate) fn booked_spans(rs: &RoomState, query: &Span, now: Ms) -> Vec<Span> {
    let mut spans: Vec<Span> = Vec::new();
    for booking in rs.overlapping(query) {
        if !booking.is_live(now) {
            continue;
        }
        for occ in expand(&booking.series) {
            if let Some(clipped) = occ.span.intersect(query) {
                spans.push(clipped);
            }
        }
    }
    spans.sort_by_key(|s| s.start);
    merge_overlapping(&spans)
}

/// Free sub-spans of the query window: the window minus every live
/// occurrence, as a sorted disjoint list.
pub fn free_slots(rs: &RoomState, query: &Span, now: Ms) -> Vec<Span> {
    let booked = booked_spans(rs, query, now);
    if booked.is_empty() {
        return vec![*query];
    }
    subtract_intervals(&[*query], &booked)
}

/// Merge sorted overlapping/adjacent intervals into disjoint intervals.
pub fn merge_overlapping(sorted: &[Span]) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::new();
    for &span in sorted {
        if let Some(last) = merged.last_mut()
            && span.start <= last.end {
                last.end = last.end.max(span.end);
                continue;
            }
        merged.push(span);
    }
    merged
}

/// Interval difference: `base` minus `to_remove`. Both inputs sorted.
pub fn subtract_intervals(base: &[Span], to_remove: &[Span]) -> Vec<Span> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut current_start = b.start;
        let current_end = b.end;

        while ri < to_remove.len() && to_remove[ri].end <= current_start {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].start < current_end {
            let r = &to_remove[j];
            if r.start > current_start {
                result.push(Span::new(current_start, r.start));
            }
            current_start = current_start.max(r.end);
            j += 1;
        }

        if current_start < current_end {
            result.push(Span::new(current_start, current_end));
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use ulid::Ulid;

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

    // ── subtract_intervals ────────────────────────────────

    #[test]
    fn subtract_no_overlap() {
        let base = vec![Span::new(100, 200), Span::new(300, 400)];
        let remove = vec![Span::new(200, 300)];
        let result = subtract_intervals(&base, &remove);
        assert_eq!(result, base);
    }

    #[test]
    fn subtract_full_overlap() {
        let base = vec![Span::new(100, 200)];
        let remove = vec![Span::new(50, 250)];
        assert!(subtract_intervals(&base, &remove).is_empty());
    }

    #[test]
    fn subtract_middle_punch() {
        let base = vec![Span::new(100, 300)];
        let remove = vec![Span::new(150, 200)];
        assert_eq!(
            subtract_intervals(&base, &remove),
            vec![Span::new(100, 150), Span::new(200, 300)]
        );
    }

    #[test]
    fn subtract_multiple_punches() {
        let base = vec![Span::new(0, 1000)];
        let remove = vec![
            Span::new(100, 200),
            Span::new(400, 500),
            Span::new(800, 900),
        ];
        assert_eq!(
            subtract_intervals(&base, &remove),
            vec![
                Span::new(0, 100),
                Span::new(200, 400),
                Span::new(500, 800),
                Span::new(900, 1000),
            ]
        );
    }

    // ── merge_overlapping ────────────────────────────────

    #[test]
    fn merge_overlapping_basic() {
        let spans = vec![
            Span::new(100, 300),
            Span::new(200, 400),
            Span::new(500, 600),
        ];
        assert_eq!(
            merge_overlapping(&spans),
            vec![Span::new(100, 400), Span::new(500, 600)]
        );
    }

    #[test]
    fn merge_overlapping_adjacent() {
        let spans = vec![Span::new(100, 200), Span::new(200, 300)];
        assert_eq!(merge_overlapping(&spans), vec![Span::new(100, 300)]);
    }

    // ── free_slots ───────────────────────────────────────

    #[test]
    fn free_slots_empty_room() {
        let rs = room_with(vec![]);
        let query = Span::new(0, 1000);
        assert_eq!(free_slots(&rs, &query, 0), vec![query]);
    }

    #[test]
    fn free_slots_around_single_booking() {
        let day = d(2024, 3, 4);
        let rs = room_with(vec![confirmed(Series::single(day, t(10, 0), t(11, 0)))]);

        let query = Span::new(day_time_ms(day, t(9, 0)), day_time_ms(day, t(12, 0)));
        let free = free_slots(&rs, &query, 0);
        assert_eq!(
            free,
            vec![
                Span::new(day_time_ms(day, t(9, 0)), day_time_ms(day, t(10, 0))),
                Span::new(day_time_ms(day, t(11, 0)), day_time_ms(day, t(12, 0))),
            ]
        );
    }

    #[test]
    fn free_slots_skip_non_live() {
        let day = d(2024, 3, 4);
        let mut cancelled = confirmed(Series::single(day, t(10, 0), t(11, 0)));
        cancelled.status = BookingStatus::Cancelled;
        let rs = room_with(vec![cancelled]);

        let query = Span::new(day_time_ms(day, t(9, 0)), day_time_ms(day, t(12, 0)));
        assert_eq!(free_slots(&rs, &query, 0), vec![query]);
    }

    #[test]
    fn free_slots_with_weekly_series() {
        // Mondays 9:00–10:00; querying a Monday leaves two slots, a Tuesday
        // stays whole.
        let rs = room_with(vec![confirmed(Series::new(
            d(2024, 3, 4),
            d(2024, 4, 1),
            t(9, 0),
            t(10, 0),
            Repeat::Weekly,
        ))]);

        let monday = Span::new(
            day_time_ms(d(2024, 3, 11), t(8, 0)),
            day_time_ms(d(2024, 3, 11), t(12, 0)),
        );
        let free = free_slots(&rs, &monday, 0);
        assert_eq!(free.len(), 2);
        assert_eq!(free[0].end, day_time_ms(d(2024, 3, 11), t(9, 0)));
        assert_eq!(free[1].start, day_time_ms(d(2024, 3, 11), t(10, 0)));

        let tuesday = Span::new(
            day_time_ms(d(2024, 3, 12), t(8, 0)),
            day_time_ms(d(2024, 3, 12), t(12, 0)),
        );
        assert_eq!(free_slots(&rs, &tuesday, 0), vec![tuesday]);
    }

    #[test]
    fn booked_spans_merge_overlapping_bookings() {
        let day = d(2024, 3, 4);
        // Two overlapping confirmed bookings (historical double-booking).
        let rs = room_with(vec![
            confirmed(Series::single(day, t(9, 0), t(11, 0))),
            confirmed(Series::single(day, t(10, 0), t(12, 0))),
        ]);
        let query = Span::new(day_time_ms(day, t(8, 0)), day_time_ms(day, t(13, 0)));
        let booked = booked_spans(&rs, &query, 0);
        assert_eq!(
            booked,
            vec![Span::new(day_time_ms(day, t(9, 0)), day_time_ms(day, t(12, 0)))]
        );
    }
}
