use chrono::{Datelike, Days, NaiveDate, NaiveTime};

use crate::limits::*;
use crate::model::{Ms, Span, day_of_ms, day_time_ms};

use super::EngineError;

// ── Free-slot negotiation ────────────────────────────────────────
//
// A negotiation slides a candidate span of the desired duration forward
// through a window in fixed steps and records every position that avoids
// all restrictions. When the strict pass finds nothing, soft restrictions
// are dropped one at a time and the search retried.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hardness {
    /// May never be violated.
    Hard,
    /// Dropped during relaxation if no strict solution exists.
    Soft,
}

/// An interval a proposed solution must avoid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Restriction {
    pub span: Span,
    pub hardness: Hardness,
}

impl Restriction {
    pub fn hard(span: Span) -> Self {
        Self { span, hardness: Hardness::Hard }
    }

    pub fn soft(span: Span) -> Self {
        Self { span, hardness: Hardness::Soft }
    }
}

/// How a recurring restriction repeats across the negotiation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurrencePattern {
    /// The anchor day only.
    Exact,
    /// The same time range every day.
    Daily,
    /// Every day with the anchor's weekday.
    Weekly,
    /// The anchor's day-of-month; months without it are skipped.
    Monthly,
    /// The anchor's month and day each year.
    Yearly,
}

/// A restriction given as a daily time range plus a recurrence rule,
/// expanded into concrete spans before the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecurringRestriction {
    pub anchor: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub pattern: RecurrencePattern,
    pub hardness: Hardness,
}

impl RecurringRestriction {
    fn span_on(&self, day: NaiveDate) -> Span {
        Span::new(day_time_ms(day, self.start_time), day_time_ms(day, self.end_time))
    }

    /// Concrete restrictions inside the window, in chronological order.
    pub fn expand(&self, window: &Span) -> Vec<Restriction> {
        if self.start_time >= self.end_time {
            return Vec::new();
        }
        if self.pattern == RecurrencePattern::Exact {
            let span = self.span_on(self.anchor);
            return if span.overlaps(window) {
                vec![Restriction { span, hardness: self.hardness }]
            } else {
                Vec::new()
            };
        }

        let (Some(lo), Some(hi)) = (day_of_ms(window.start), day_of_ms(window.end - 1)) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut day = lo;
        while day <= hi {
            let hit = match self.pattern {
                RecurrencePattern::Daily => true,
                RecurrencePattern::Weekly => day.weekday() == self.anchor.weekday(),
                RecurrencePattern::Monthly => day.day() == self.anchor.day(),
                RecurrencePattern::Yearly => {
                    day.month() == self.anchor.month() && day.day() == self.anchor.day()
                }
                RecurrencePattern::Exact => unreachable!(),
            };
            if hit {
                let span = self.span_on(day);
                if span.overlaps(window) {
                    out.push(Restriction { span, hardness: self.hardness });
                }
            }
            day = match day.checked_add_days(Days::new(1)) {
                Some(d) => d,
                None => break,
            };
        }
        out
    }
}

/// Forward-step search for free sub-spans of a window.
#[derive(Debug)]
pub struct Negotiation {
    window: Span,
    step: Ms,
    desired_ms: Ms,
    /// Sorted by span start.
    restrictions: Vec<Restriction>,
    solutions: Vec<Span>,
    finished: bool,
}

impl Negotiation {
    pub fn new(window: Span, step: Ms, desired_ms: Ms) -> Result<Self, EngineError> {
        if window.start >= window.end {
            return Err(EngineError::InvalidNegotiation("window end not after start"));
        }
        if step <= 0 {
            return Err(EngineError::InvalidNegotiation("step must be positive"));
        }
        if desired_ms <= 0 {
            return Err(EngineError::InvalidNegotiation("desired duration must be positive"));
        }
        if desired_ms > window.duration_ms() {
            return Err(EngineError::InvalidNegotiation("desired duration exceeds window"));
        }
        let steps = (window.duration_ms() - desired_ms) / step + 1;
        if steps > MAX_NEGOTIATION_STEPS as Ms {
            return Err(EngineError::LimitExceeded("too many negotiation steps"));
        }
        Ok(Self {
            window,
            step,
            desired_ms,
            restrictions: Vec::new(),
            solutions: Vec::new(),
            finished: false,
        })
    }

    /// Insert a restriction keeping the list sorted by start.
    pub fn add_restriction(&mut self, restriction: Restriction) -> Result<(), EngineError> {
        if self.restrictions.len() >= MAX_RESTRICTIONS {
            return Err(EngineError::LimitExceeded("too many restrictions"));
        }
        let pos = self
            .restrictions
            .partition_point(|r| r.span.start <= restriction.span.start);
        self.restrictions.insert(pos, restriction);
        Ok(())
    }

    /// Expand a recurring restriction over the window and add every span.
    pub fn add_recurring(&mut self, recurring: &RecurringRestriction) -> Result<(), EngineError> {
        for r in recurring.expand(&self.window) {
            self.add_restriction(r)?;
        }
        Ok(())
    }

    pub fn restrictions(&self) -> &[Restriction] {
        &self.restrictions
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn solutions(&self) -> &[Span] {
        &self.solutions
    }

    pub fn first_solution(&self) -> Option<Span> {
        self.solutions.first().copied()
    }

    pub fn solution(&self, index: usize) -> Option<Span> {
        self.solutions.get(index).copied()
    }

    /// One forward pass; `skip` ignores a single restriction by index.
    fn scan(&self, skip: Option<usize>) -> Vec<Span> {
        let mut found = Vec::new();
        let mut start = self.window.start;
        while start + self.desired_ms <= self.window.end {
            let candidate = Span::new(start, start + self.desired_ms);
            let blocked = self
                .restrictions
                .iter()
                .enumerate()
                .any(|(i, r)| Some(i) != skip && r.span.overlaps(&candidate));
            if !blocked {
                found.push(candidate);
            }
            start += self.step;
        }
        found
    }

    /// Collect every step position that avoids all restrictions. If the
    /// strict pass is empty, retry with each soft restriction dropped in
    /// turn, accumulating the results. Hard restrictions are never dropped.
    pub fn find_all_solutions(&mut self) -> &[Span] {
        self.solutions = self.scan(None);

        if self.solutions.is_empty() {
            let mut relaxed = Vec::new();
            for (i, r) in self.restrictions.iter().enumerate() {
                if r.hardness == Hardness::Soft {
                    relaxed.extend(self.scan(Some(i)));
                }
            }
            relaxed.sort_by_key(|s| s.start);
            relaxed.dedup();
            self.solutions = relaxed;
        }

        self.finished = true;
        &self.solutions
    }
}
