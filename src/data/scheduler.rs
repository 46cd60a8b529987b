//! Refresh cadence and response ordering.
//!
//! [`PollScheduler`] is a single timer: `online` re-arms it after every fetch,
//! `offline` fetches once and leaves it disarmed. The clock is passed in so the
//! cadence can be driven by the UI frame loop and by tests alike.
//!
//! [`ResponseSequencer`] numbers outgoing requests. Requests may overlap and
//! complete in any order; the sequencer's policy decides whether a late answer
//! to an older request may still overwrite newer state.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::view::ViewMode;

/// Shortest refresh period, whatever interval the backend declares.
pub const MIN_POLL_PERIOD: Duration = Duration::from_secs(1);

// ─────────────────────────────────────────────────────────────────────────────
// ResponseSequencer
// ─────────────────────────────────────────────────────────────────────────────

/// How completions of overlapping requests are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseOrdering {
    /// Drop a response older than one already applied.
    #[default]
    LatestIssued,
    /// Apply every response as it arrives; a slow old response overwrites newer state.
    ArrivalOrder,
}

#[derive(Debug, Clone)]
pub struct ResponseSequencer {
    policy: ResponseOrdering,
    last_issued: u64,
    last_applied: Option<u64>,
}

impl ResponseSequencer {
    pub fn new(policy: ResponseOrdering) -> Self {
        Self {
            policy,
            last_issued: 0,
            last_applied: None,
        }
    }

    pub fn policy(&self) -> ResponseOrdering {
        self.policy
    }

    /// Number the next request. Sequence numbers start at 1.
    pub fn issue(&mut self) -> u64 {
        self.last_issued += 1;
        self.last_issued
    }

    pub fn last_issued(&self) -> u64 {
        self.last_issued
    }

    pub fn last_applied(&self) -> Option<u64> {
        self.last_applied
    }

    /// Decide whether the response to request `seq` may be applied, and record it if so.
    pub fn accept(&mut self, seq: u64) -> bool {
        match self.policy {
            ResponseOrdering::ArrivalOrder => {
                self.last_applied = Some(seq);
                true
            }
            ResponseOrdering::LatestIssued => {
                if self.last_applied.is_some_and(|applied| seq < applied) {
                    return false;
                }
                self.last_applied = Some(seq);
                true
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PollScheduler
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of [`PollScheduler::apply_mode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeChange {
    Unchanged,
    /// `online -> offline`: the pending refresh was cancelled.
    WentOffline,
    /// `offline -> online` is not supported and was ignored.
    Ignored,
}

#[derive(Debug, Clone)]
pub struct PollScheduler {
    mode: ViewMode,
    period: Duration,
    next_due: Option<Instant>,
}

impl PollScheduler {
    pub fn new(mode: ViewMode, period: Duration) -> Self {
        Self {
            mode,
            period: period.max(MIN_POLL_PERIOD),
            next_due: None,
        }
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Cadence for the next arming; the timer already armed keeps its deadline.
    pub fn set_period(&mut self, period: Duration) {
        self.period = period.max(MIN_POLL_PERIOD);
    }

    /// Fetch now. Online re-arms the timer one period ahead; offline leaves it disarmed.
    ///
    /// Always returns `true`: the caller must issue a fetch.
    pub fn start(&mut self, now: Instant) -> bool {
        self.cancel();
        if self.mode == ViewMode::Online {
            self.next_due = Some(now + self.period);
        }
        true
    }

    /// Same as [`start`](Self::start); used when the user switches bitmap type.
    pub fn restart(&mut self, now: Instant) -> bool {
        self.start(now)
    }

    /// `true` when the armed deadline has passed; re-arms (online) before returning.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.next_due {
            Some(due) if now >= due => self.start(now),
            _ => false,
        }
    }

    /// Apply the `Mode` reported by the backend.
    pub fn apply_mode(&mut self, mode: ViewMode) -> ModeChange {
        match (self.mode, mode) {
            (ViewMode::Online, ViewMode::Offline) => {
                self.mode = ViewMode::Offline;
                self.cancel();
                ModeChange::WentOffline
            }
            (ViewMode::Offline, ViewMode::Online) => ModeChange::Ignored,
            _ => ModeChange::Unchanged,
        }
    }

    pub fn cancel(&mut self) {
        self.next_due = None;
    }

    pub fn is_armed(&self) -> bool {
        self.next_due.is_some()
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.next_due
    }

    /// Time left until the next fetch, for scheduling a repaint.
    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.next_due.map(|due| due.saturating_duration_since(now))
    }
}
