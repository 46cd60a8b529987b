//! Event subscriptions for the viewer.
//!
//! The session publishes what happens (hover readouts, selections, new bitmaps,
//! mode changes, failures) through an [`EventController`]. Each event carries
//! a set of [`EventKind`] flags, so one occurrence can match several categories
//! (a rejected selection is also a failure of the selection path, for instance).
//!
//! Subscribers pass an [`EventFilter`]; an event is delivered when
//! `(event.kinds & filter) != 0`.

use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex};

use crate::data::readout::Readout;
use crate::data::selection::SelectionRequest;
use crate::data::view::{BitmapType, ViewKind, ViewMode};

// ─────────────────────────────────────────────────────────────────────────────
// EventKind – bitflags
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventKind(pub u64);

impl EventKind {
    // ── Pointer ─────────────────────────────────────────────────────────
    /// The backend resolved the cell under the pointer.
    pub const HOVER: Self = Self(1 << 0);
    /// A drag gesture started over a bitmap.
    pub const SELECTION_STARTED: Self = Self(1 << 1);
    /// A selection passed validation and was sent.
    pub const SELECTION_COMMITTED: Self = Self(1 << 2);
    /// A selection was refused before anything was sent.
    pub const SELECTION_REJECTED: Self = Self(1 << 3);

    // ── Views ───────────────────────────────────────────────────────────
    /// A new origin bitmap replaced the previous one.
    pub const BITMAP_UPDATED: Self = Self(1 << 4);
    /// A new zoomed bitmap arrived for a selection.
    pub const SELECTED_BITMAP_UPDATED: Self = Self(1 << 5);
    /// The user switched between source, destination and both.
    pub const BITMAP_TYPE_CHANGED: Self = Self(1 << 6);

    // ── Backend ─────────────────────────────────────────────────────────
    /// The backend reported a different collection mode.
    pub const MODE_CHANGED: Self = Self(1 << 7);
    /// A request failed; polling carries on.
    pub const NETWORK_FAILURE: Self = Self(1 << 8);
    /// A completion arrived after a newer one and was discarded.
    pub const STALE_RESPONSE_DROPPED: Self = Self(1 << 9);

    /// Wildcard: matches every event kind.
    pub const ALL: Self = Self(u64::MAX);

    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Check whether `self` contains all bits in `other`.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Check whether `self` intersects with `other` (at least one bit in common).
    #[inline]
    pub const fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for EventKind {
    type Output = Self;
    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for EventKind {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl std::ops::BitAnd for EventKind {
    type Output = Self;
    #[inline]
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

const NAMED_KINDS: &[(EventKind, &str)] = &[
    (EventKind::HOVER, "HOVER"),
    (EventKind::SELECTION_STARTED, "SELECTION_STARTED"),
    (EventKind::SELECTION_COMMITTED, "SELECTION_COMMITTED"),
    (EventKind::SELECTION_REJECTED, "SELECTION_REJECTED"),
    (EventKind::BITMAP_UPDATED, "BITMAP_UPDATED"),
    (EventKind::SELECTED_BITMAP_UPDATED, "SELECTED_BITMAP_UPDATED"),
    (EventKind::BITMAP_TYPE_CHANGED, "BITMAP_TYPE_CHANGED"),
    (EventKind::MODE_CHANGED, "MODE_CHANGED"),
    (EventKind::NETWORK_FAILURE, "NETWORK_FAILURE"),
    (EventKind::STALE_RESPONSE_DROPPED, "STALE_RESPONSE_DROPPED"),
];

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "EMPTY");
        }
        if *self == EventKind::ALL {
            return write!(f, "ALL");
        }

        let mut names = Vec::new();
        let mut known_bits: u64 = 0;
        for (kind, name) in NAMED_KINDS {
            known_bits |= kind.0;
            if self.contains(*kind) {
                names.push((*name).to_string());
            }
        }

        let extra = self.0 & !known_bits;
        if extra != 0 {
            names.push(format!("0x{:x}", extra));
        }
        write!(f, "{}", names.join("|"))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Metadata
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SelectionMeta {
    pub view: ViewKind,
    /// The normalized request, when one was built.
    pub request: Option<SelectionRequest>,
    /// Why the selection was refused.
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ViewMeta {
    pub view: ViewKind,
    pub bitmap_type: BitmapType,
    pub width_px: u32,
    pub height_px: u32,
    pub seq: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct ModeMeta {
    pub from: ViewMode,
    pub to: ViewMode,
    /// `false` when the transition is not supported and was ignored.
    pub applied: bool,
}

#[derive(Debug, Clone)]
pub struct FailureMeta {
    pub seq: u64,
    /// Which request failed (`fetch`, `resolve_index`, `select_area`).
    pub job: &'static str,
    pub status: Option<u16>,
    pub message: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// ViewerEvent
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ViewerEvent {
    pub kinds: EventKind,
    /// Seconds since the controller was created.
    pub timestamp: f64,

    pub hover: Option<Readout>,
    pub selection: Option<SelectionMeta>,
    pub view: Option<ViewMeta>,
    pub mode: Option<ModeMeta>,
    pub failure: Option<FailureMeta>,
}

impl ViewerEvent {
    pub fn new(kinds: EventKind) -> Self {
        Self {
            kinds,
            timestamp: 0.0, // set by the controller
            hover: None,
            selection: None,
            view: None,
            mode: None,
            failure: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// EventFilter
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct EventFilter {
    pub mask: EventKind,
}

impl EventFilter {
    pub const fn all() -> Self {
        Self {
            mask: EventKind::ALL,
        }
    }

    pub const fn only(mask: EventKind) -> Self {
        Self { mask }
    }

    #[inline]
    pub fn matches(&self, event: &ViewerEvent) -> bool {
        event.kinds.intersects(self.mask)
    }
}

impl Default for EventFilter {
    fn default() -> Self {
        Self::all()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// EventController
// ─────────────────────────────────────────────────────────────────────────────

struct Subscriber {
    filter: EventFilter,
    sender: Sender<ViewerEvent>,
}

/// Collects events and fans them out to subscribers over `mpsc` channels.
///
/// Cloning yields another handle to the same subscriber list.
#[derive(Clone)]
pub struct EventController {
    inner: Arc<Mutex<EventCtrlInner>>,
}

struct EventCtrlInner {
    subscribers: Vec<Subscriber>,
    start_instant: std::time::Instant,
}

impl EventController {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(EventCtrlInner {
                subscribers: Vec::new(),
                start_instant: std::time::Instant::now(),
            })),
        }
    }

    /// Subscribe to events whose kinds intersect the filter mask.
    pub fn subscribe(&self, filter: EventFilter) -> Receiver<ViewerEvent> {
        let (tx, rx) = std::sync::mpsc::channel();
        if let Ok(mut inner) = self.inner.lock() {
            inner.subscribers.push(Subscriber { filter, sender: tx });
        }
        rx
    }

    pub fn subscribe_all(&self) -> Receiver<ViewerEvent> {
        self.subscribe(EventFilter::all())
    }

    /// Deliver `event` to every matching subscriber.
    ///
    /// Subscribers whose receiver was dropped are pruned the next time an
    /// event matches them.
    pub fn emit(&self, mut event: ViewerEvent) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        event.timestamp = inner.start_instant.elapsed().as_secs_f64();
        inner.subscribers.retain(|sub| {
            if sub.filter.matches(&event) {
                sub.sender.send(event.clone()).is_ok()
            } else {
                true
            }
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().map(|inner| inner.subscribers.len()).unwrap_or(0)
    }
}

impl Default for EventController {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventController")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────────────────────────
