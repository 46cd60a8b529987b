//! Time axis values: interval ordinals and wall-clock timestamps.

use std::fmt;

use chrono::{NaiveDateTime, TimeDelta};

use crate::error::{Result, ViewerError};

/// Text format shared with the backend (`Time_first`, `Time_index`, query strings).
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn parse_timestamp(text: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text.trim(), TIME_FORMAT).map_err(|_| ViewerError::InvalidTime {
        text: text.to_string(),
    })
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIME_FORMAT).to_string()
}

/// Position on the time axis of a bitmap.
///
/// Views built from interval-counted bitmaps use `Interval`; views with a known
/// first timestamp use `Timestamp`. A single view never mixes the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimeIndex {
    Interval(u64),
    Timestamp(NaiveDateTime),
}

impl TimeIndex {
    /// Parse either a bare interval number or a `YYYY-MM-DD HH:MM:SS` timestamp.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return trimmed
                .parse::<u64>()
                .map(TimeIndex::Interval)
                .map_err(|_| ViewerError::InvalidTime {
                    text: text.to_string(),
                });
        }
        parse_timestamp(trimmed).map(TimeIndex::Timestamp)
    }

    pub fn same_kind(&self, other: &TimeIndex) -> bool {
        matches!(
            (self, other),
            (TimeIndex::Interval(_), TimeIndex::Interval(_))
                | (TimeIndex::Timestamp(_), TimeIndex::Timestamp(_))
        )
    }
}

impl fmt::Display for TimeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeIndex::Interval(n) => write!(f, "{n}"),
            TimeIndex::Timestamp(ts) => write!(f, "{}", ts.format(TIME_FORMAT)),
        }
    }
}

/// Inclusive time range with `first <= last`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    first: TimeIndex,
    last: TimeIndex,
}

impl TimeRange {
    /// Build a range from two endpoints in either order.
    pub fn new(a: TimeIndex, b: TimeIndex) -> Self {
        if a <= b {
            Self { first: a, last: b }
        } else {
            Self { first: b, last: a }
        }
    }

    pub fn first(&self) -> TimeIndex {
        self.first
    }

    pub fn last(&self) -> TimeIndex {
        self.last
    }

    pub fn contains(&self, t: &TimeIndex) -> bool {
        self.first <= *t && *t <= self.last
    }

    pub fn is_single(&self) -> bool {
        self.first == self.last
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.first, self.last)
    }
}

/// How column ordinals of a view translate into [`TimeIndex`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeAxis {
    /// Columns count intervals starting at `first`.
    Intervals { first: u64, interval_secs: u32 },
    /// Column `n` starts at `first + n * interval_secs`.
    Timestamps {
        first: NaiveDateTime,
        interval_secs: u32,
    },
}

impl TimeAxis {
    pub fn at(&self, ordinal: u64) -> TimeIndex {
        match *self {
            TimeAxis::Intervals { first, .. } => TimeIndex::Interval(first.saturating_add(ordinal)),
            TimeAxis::Timestamps {
                first,
                interval_secs,
            } => {
                let offset = i64::try_from(ordinal)
                    .unwrap_or(i64::MAX)
                    .saturating_mul(i64::from(interval_secs));
                let ts = TimeDelta::try_seconds(offset)
                    .and_then(|delta| first.checked_add_signed(delta))
                    .unwrap_or(NaiveDateTime::MAX);
                TimeIndex::Timestamp(ts)
            }
        }
    }

    /// Declared length of one column in seconds.
    pub fn interval_secs(&self) -> u32 {
        match *self {
            TimeAxis::Intervals { interval_secs, .. } | TimeAxis::Timestamps { interval_secs, .. } => {
                interval_secs
            }
        }
    }
}
