use chrono::{Datelike, Days, NaiveDate};

use crate::model::{Repeat, Series, Span, day_of_ms, day_time_ms};

// ── Repeat-pattern expansion ─────────────────────────────────────

/// One concrete occurrence of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurrence {
    pub day: NaiveDate,
    pub span: Span,
}

/// Which same-weekday of its month a day is (1–5).
/// For a Friday, returns which Friday of the month it is.
pub fn week_number_in_month(day: NaiveDate) -> u32 {
    (day.day() - 1) / 7 + 1
}

fn occurrence_span(series: &Series, day: NaiveDate) -> Span {
    Span::new(
        day_time_ms(day, series.start_time),
        day_time_ms(day, series.end_time),
    )
}

fn gap_matches(series: &Series, day: NaiveDate, gap: i64) -> bool {
    (day - series.first_day).num_days() % gap == 0
}

/// True if `day` matches the recurrence pattern, ignoring exclusions.
fn matches_pattern(series: &Series, day: NaiveDate) -> bool {
    if day < series.first_day || day > series.last_day {
        return false;
    }
    match series.repeat {
        Repeat::Single | Repeat::Daily => true,
        Repeat::Weekly => gap_matches(series, day, 7),
        Repeat::EveryTwoWeeks => gap_matches(series, day, 14),
        Repeat::EveryThreeWeeks => gap_matches(series, day, 21),
        Repeat::Monthly => {
            day.weekday() == series.first_day.weekday()
                && week_number_in_month(day) == week_number_in_month(series.first_day)
        }
    }
}

/// Candidate-day step for scanning a pattern. Monthly scans week by week;
/// `matches_pattern` filters the weeks with the wrong month position.
fn scan_step(repeat: Repeat) -> u64 {
    match repeat {
        Repeat::Single | Repeat::Daily => 1,
        Repeat::Weekly | Repeat::Monthly => 7,
        Repeat::EveryTwoWeeks => 14,
        Repeat::EveryThreeWeeks => 21,
    }
}

/// True if the series has an occurrence on `day`.
pub fn occurs_on(series: &Series, day: NaiveDate) -> bool {
    matches_pattern(series, day) && !series.is_excluded(day)
}

/// All concrete occurrences of a series, in chronological order, excluded
/// days filtered out. A `Single` series is one block spanning its whole
/// envelope.
pub fn expand(series: &Series) -> Vec<Occurrence> {
    if series.repeat == Repeat::Single {
        return vec![Occurrence {
            day: series.first_day,
            span: series.envelope(),
        }];
    }
    let step = scan_step(series.repeat);
    let mut out = Vec::new();
    let mut day = series.first_day;
    while day <= series.last_day {
        if matches_pattern(series, day) && !series.is_excluded(day) {
            out.push(Occurrence {
                day,
                span: occurrence_span(series, day),
            });
        }
        day = match day.checked_add_days(Days::new(step)) {
            Some(d) => d,
            None => break,
        };
    }
    out
}

/// First occurrence strictly after `after`, skipping excluded days.
pub fn next_occurrence(series: &Series, after: NaiveDate) -> Option<Occurrence> {
    if series.repeat == Repeat::Single {
        return (series.first_day > after).then(|| Occurrence {
            day: series.first_day,
            span: series.envelope(),
        });
    }

    // First candidate: the pattern day at or after max(first_day, after + 1).
    let mut day = if after < series.first_day {
        series.first_day
    } else {
        let from = after.checked_add_days(Days::new(1))?;
        match series.repeat {
            Repeat::Daily | Repeat::Weekly | Repeat::EveryTwoWeeks | Repeat::EveryThreeWeeks => {
                // How many days too early is the candidate for the gap?
                let gap = series.repeat.day_gap()?;
                let since = (from - series.first_day).num_days();
                let to_early = (gap - since % gap) % gap;
                from.checked_add_days(Days::new(to_early as u64))?
            }
            Repeat::Monthly => {
                // Align to the series weekday; week scanning below finds the
                // right week of the month.
                let want = series.first_day.weekday().num_days_from_monday() as i64;
                let have = from.weekday().num_days_from_monday() as i64;
                let diff = (want - have).rem_euclid(7);
                from.checked_add_days(Days::new(diff as u64))?
            }
            Repeat::Single => return None,
        }
    };

    let step = scan_step(series.repeat);
    while day <= series.last_day {
        if matches_pattern(series, day) && !series.is_excluded(day) {
            return Some(Occurrence {
                day,
                span: occurrence_span(series, day),
            });
        }
        day = day.checked_add_days(Days::new(step))?;
    }
    None
}

/// Does any occurrence span intersect the query window?
///
/// Checks only the days the window touches instead of materialising the
/// whole expansion.
pub fn overlaps_window(series: &Series, window: &Span) -> bool {
    let env = series.envelope();
    if !env.overlaps(window) {
        return false;
    }
    if series.repeat == Repeat::Single {
        // The envelope is the single occurrence.
        return true;
    }
    let Some(lo) = day_of_ms(window.start) else {
        return false;
    };
    let Some(hi) = day_of_ms(window.end - 1) else {
        return false;
    };
    let lo = lo.max(series.first_day);
    let hi = hi.min(series.last_day);
    let mut day = lo;
    while day <= hi {
        if occurs_on(series, day) && occurrence_span(series, day).overlaps(window) {
            return true;
        }
        day = match day.checked_add_days(Days::new(1)) {
            Some(d) => d,
            None => return false,
        };
    }
    false
}
