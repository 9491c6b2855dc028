use chrono::{Datelike, Days, NaiveDate, NaiveTime, Weekday};

use crate::model::{Ms, RoomState, Span, day_time_ms};

use super::availability::booked_spans;
use super::conflict::intersect_sorted;

// ── Occupancy statistics ─────────────────────────────────────────
//
// Booked time is measured against working hours only: Monday–Friday,
// 08:30–17:30. Saturdays and Sundays never count as bookable.

/// Bookable time per working day.
pub const WORK_DAY_MS: Ms = 9 * 3_600_000;

fn work_start() -> NaiveTime {
    NaiveTime::from_hms_opt(8, 30, 0).unwrap()
}

fn work_end() -> NaiveTime {
    NaiveTime::from_hms_opt(17, 30, 0).unwrap()
}

/// Convenience ranges for occupancy reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccupancyPeriod {
    PastMonth,
    PastYear,
    ThisYear,
}

impl OccupancyPeriod {
    pub fn date_range(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let first = match self {
            OccupancyPeriod::PastMonth => today.checked_sub_days(Days::new(30)),
            OccupancyPeriod::PastYear => today.checked_sub_days(Days::new(365)),
            OccupancyPeriod::ThisYear => NaiveDate::from_ymd_opt(today.year(), 1, 1),
        };
        (first.unwrap_or(today), today)
    }
}

/// One 08:30–17:30 window per working day in `[first_day, last_day]`,
/// sorted. Weekends are skipped.
pub(crate) fn working_windows(first_day: NaiveDate, last_day: NaiveDate) -> Vec<Span> {
    let mut windows = Vec::new();
    let mut day = first_day;
    while day <= last_day {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            windows.push(Span::new(
                day_time_ms(day, work_start()),
                day_time_ms(day, work_end()),
            ));
        }
        day = match day.checked_add_days(Days::new(1)) {
            Some(d) => d,
            None => break,
        };
    }
    windows
}

/// Milliseconds of live booked time falling inside the given working
/// windows. Overlapping bookings are merged first, so a slot is never
/// counted twice.
pub(crate) fn booked_in_windows(rs: &RoomState, windows: &[Span], now: Ms) -> Ms {
    let (Some(first), Some(last)) = (windows.first(), windows.last()) else {
        return 0;
    };
    let query = Span::new(first.start, last.end);
    let booked = booked_spans(rs, &query, now);
    intersect_sorted(&booked, windows)
        .iter()
        .map(|s| s.duration_ms())
        .sum()
}

/// How often the room is booked during working hours over the date range.
/// Always in `[0, 1]`; a range without working days yields 0.
pub fn room_occupancy(rs: &RoomState, first_day: NaiveDate, last_day: NaiveDate, now: Ms) -> f64 {
    let windows = working_windows(first_day, last_day);
    if windows.is_empty() {
        return 0.0;
    }
    let booked = booked_in_windows(rs, &windows, now);
    let bookable = windows.len() as Ms * WORK_DAY_MS;
    (booked as f64 / bookable as f64).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
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

    #[test]
    fn working_windows_skip_weekends() {
        // 2024-03-04 (Mon) through 2024-03-10 (Sun): 5 working days.
        let windows = working_windows(d(2024, 3, 4), d(2024, 3, 10));
        assert_eq!(windows.len(), 5);
        assert_eq!(windows[0].start, day_time_ms(d(2024, 3, 4), t(8, 30)));
        assert_eq!(windows[4].end, day_time_ms(d(2024, 3, 8), t(17, 30)));
    }

    #[test]
    fn empty_room_has_zero_occupancy() {
        let rs = room_with(vec![]);
        assert_eq!(room_occupancy(&rs, d(2024, 3, 4), d(2024, 3, 8), 0), 0.0);
    }

    #[test]
    fn weekend_only_range_has_zero_occupancy() {
        let rs = room_with(vec![confirmed(Series::single(d(2024, 3, 9), t(9, 0), t(17, 0)))]);
        assert_eq!(room_occupancy(&rs, d(2024, 3, 9), d(2024, 3, 10), 0), 0.0);
    }

    #[test]
    fn single_booking_ratio() {
        // 3 booked hours on Monday over a 5-working-day week: 3 / 45.
        let rs = room_with(vec![confirmed(Series::single(d(2024, 3, 4), t(9, 0), t(12, 0)))]);
        let ratio = room_occupancy(&rs, d(2024, 3, 4), d(2024, 3, 8), 0);
        assert!((ratio - 3.0 / 45.0).abs() < 1e-9);
    }

    #[test]
    fn booking_outside_working_hours_is_clipped() {
        // 07:00–09:30 counts only as 08:30–09:30.
        let rs = room_with(vec![confirmed(Series::single(d(2024, 3, 4), t(7, 0), t(9, 30)))]);
        let ratio = room_occupancy(&rs, d(2024, 3, 4), d(2024, 3, 4), 0);
        assert!((ratio - 1.0 / 9.0).abs() < 1e-9);
    }

    #[test]
    fn saturday_booking_does_not_count() {
        let rs = room_with(vec![confirmed(Series::single(d(2024, 3, 9), t(9, 0), t(17, 0)))]);
        let ratio = room_occupancy(&rs, d(2024, 3, 4), d(2024, 3, 10), 0);
        assert_eq!(ratio, 0.0);
    }

    #[test]
    fn daily_all_day_series_fills_the_week() {
        let rs = room_with(vec![confirmed(Series::new(
            d(2024, 3, 4),
            d(2024, 3, 8),
            t(8, 0),
            t(18, 0),
            Repeat::Daily,
        ))]);
        let ratio = room_occupancy(&rs, d(2024, 3, 4), d(2024, 3, 8), 0);
        assert_eq!(ratio, 1.0);
    }

    #[test]
    fn double_booking_stays_bounded() {
        // Two overlapping all-day bookings: ratio must not exceed 1.
        let all_day = Series::single(d(2024, 3, 4), t(8, 0), t(18, 0));
        let rs = room_with(vec![confirmed(all_day.clone()), confirmed(all_day)]);
        let ratio = room_occupancy(&rs, d(2024, 3, 4), d(2024, 3, 4), 0);
        assert_eq!(ratio, 1.0);
    }

    #[test]
    fn occupancy_period_ranges() {
        let today = d(2024, 6, 15);
        let (first, last) = OccupancyPeriod::PastMonth.date_range(today);
        assert_eq!(last, today);
        assert_eq!(first, d(2024, 5, 16));
        let (first, _) = OccupancyPeriod::ThisYear.date_range(today);
        assert_eq!(first, d(2024, 1, 1));
    }
}
