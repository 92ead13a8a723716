//! Fixed-width date windows over a requested range

use std::fmt;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Half-open interval of calendar days `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// `None` unless `end > start`
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (end > start).then_some(Self { start, end })
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    /// ISO-8601 start date, the key records are stored under
    pub fn label(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Iterator over consecutive `step_days`-wide windows.
///
/// Every window has the full width, so the last one may run past the
/// requested end. Cloning restarts from the clone's position.
#[derive(Debug, Clone)]
pub struct Windows {
    next: NaiveDate,
    end: NaiveDate,
    step_days: u32,
}

/// Partition `[start, end)` into windows of `step_days`.
///
/// Yields `ceil((end - start) / step_days)` windows; nothing when
/// `start >= end` or `step_days == 0`.
pub fn windows(start: NaiveDate, end: NaiveDate, step_days: u32) -> Windows {
    Windows {
        next: start,
        end,
        step_days,
    }
}

impl Iterator for Windows {
    type Item = DateWindow;

    fn next(&mut self) -> Option<DateWindow> {
        if self.step_days == 0 || self.next >= self.end {
            return None;
        }
        let start = self.next;
        let end = start.checked_add_days(Days::new(u64::from(self.step_days)))?;
        self.next = end;
        Some(DateWindow { start, end })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Windows {}

impl Windows {
    fn remaining(&self) -> usize {
        if self.step_days == 0 || self.next >= self.end {
            return 0;
        }
        let days = (self.end - self.next).num_days() as usize;
        days.div_ceil(self.step_days as usize)
    }
}
