//! Drag-to-select over a bitmap.
//!
//! ```text
//! Idle --pointer down--> Dragging --pointer up anywhere--> PendingSelection --corners known--> request
//!                         |   ^
//!                         +---+ pointer move (pixel rectangle only)
//! ```
//!
//! Each corner is mapped once: the anchor on pointer down, the end on pointer
//! up. A corner that lands on the image names a cell whose address the backend
//! has to resolve; a corner off the image is [`Corner::Outside`] and becomes the
//! undefined sentinel at commit. A finished gesture yields one
//! [`PendingSelection`], which commits to exactly one [`SelectionRequest`].

use std::cmp::Ordering;

use super::address::{Address, AddressRange};
use super::mapper::{CellIndex, CoordinateMapper};
use super::readout::AddressResolver;
use super::time::{TimeIndex, TimeRange};
use super::view::{BitmapType, BitmapView};
use crate::error::Result;

/// Pointer position relative to the image widget (chrome included).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelPos {
    pub x: i64,
    pub y: i64,
}

impl PixelPos {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle between two pixel positions, `min <= max` per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub min: PixelPos,
    pub max: PixelPos,
}

impl PixelRect {
    pub fn from_corners(a: PixelPos, b: PixelPos) -> Self {
        Self {
            min: PixelPos::new(a.x.min(b.x), a.y.min(b.y)),
            max: PixelPos::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn width(&self) -> i64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> i64 {
        self.max.y - self.min.y
    }
}

/// A drag endpoint: resolved, or the "undefined" sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint<T> {
    Resolved(T),
    Undefined,
}

impl<T> Endpoint<T> {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Endpoint::Undefined)
    }

    pub fn resolved(&self) -> Option<&T> {
        match self {
            Endpoint::Resolved(value) => Some(value),
            Endpoint::Undefined => None,
        }
    }
}

impl<T> From<Option<T>> for Endpoint<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Endpoint::Undefined, Endpoint::Resolved)
    }
}

/// One end of a drag after mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum Corner {
    /// On the image. `address` stays `None` until the backend has answered for
    /// that row; `Some(Endpoint::Undefined)` is the backend's own `undefined`.
    Cell {
        cell: CellIndex,
        address: Option<Endpoint<Address>>,
    },
    /// The mapper put the position outside the image.
    Outside,
}

impl Corner {
    fn map(
        mapper: &CoordinateMapper,
        pos: PixelPos,
        view: &BitmapView,
        resolver: &dyn AddressResolver,
    ) -> Self {
        match mapper.pixel_to_index(pos.x, pos.y, view) {
            Ok(cell) => Corner::Cell {
                cell,
                address: resolver.address_at(view, cell.ip_index),
            },
            Err(_) => Corner::Outside,
        }
    }

    pub fn cell(&self) -> Option<CellIndex> {
        match self {
            Corner::Cell { cell, .. } => Some(*cell),
            Corner::Outside => None,
        }
    }

    /// Mapped onto a cell whose address is still unknown.
    pub fn is_waiting(&self) -> bool {
        matches!(self, Corner::Cell { address: None, .. })
    }

    /// Pick up an address that arrived since the corner was mapped.
    pub fn refresh(&mut self, view: &BitmapView, resolver: &dyn AddressResolver) {
        if let Corner::Cell { cell, address } = self {
            if address.is_none() {
                *address = resolver.address_at(view, cell.ip_index);
            }
        }
    }

    /// `None` while the address is unknown.
    fn endpoints(&self) -> Option<(Endpoint<Address>, Endpoint<TimeIndex>)> {
        match self {
            Corner::Cell {
                cell,
                address: Some(address),
            } => Some((address.clone(), Endpoint::Resolved(cell.time))),
            Corner::Cell { address: None, .. } => None,
            Corner::Outside => Some((Endpoint::Undefined, Endpoint::Undefined)),
        }
    }
}

/// State of one active drag gesture.
#[derive(Debug, Clone, PartialEq)]
pub struct DragState {
    pub anchor_pixel: PixelPos,
    pub current_pixel: PixelPos,
    pub anchor: Corner,
}

impl DragState {
    pub fn rect(&self) -> PixelRect {
        PixelRect::from_corners(self.anchor_pixel, self.current_pixel)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum SelectionState {
    #[default]
    Idle,
    Dragging(DragState),
}

/// A released gesture, possibly still waiting for corner addresses.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSelection {
    pub anchor: Corner,
    pub end: Corner,
}

impl PendingSelection {
    pub fn refresh(&mut self, view: &BitmapView, resolver: &dyn AddressResolver) {
        self.anchor.refresh(view, resolver);
        self.end.refresh(view, resolver);
    }

    /// Cells whose address has not come back yet.
    pub fn waiting_on(&self) -> Vec<CellIndex> {
        [&self.anchor, &self.end]
            .into_iter()
            .filter(|corner| corner.is_waiting())
            .filter_map(Corner::cell)
            .collect()
    }

    pub fn is_ready(&self) -> bool {
        !self.anchor.is_waiting() && !self.end.is_waiting()
    }

    /// Build the request, or `None` while a corner is waiting.
    pub fn commit(&self, view: &BitmapView) -> Option<Result<SelectionRequest>> {
        let (anchor_address, anchor_time) = self.anchor.endpoints()?;
        let (end_address, end_time) = self.end.endpoints()?;
        Some(commit(anchor_address, end_address, anchor_time, end_time, view))
    }
}

/// Committed selection handed to the request layer.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionRequest {
    pub addresses: AddressRange,
    pub times: TimeRange,
    pub bitmap_type: BitmapType,
    /// Prefix length the backend uses to cut rows (`subnet_size`).
    pub granularity: u8,
}

#[derive(Debug, Default)]
pub struct SelectionMachine {
    state: SelectionState,
    mapper: CoordinateMapper,
}

impl SelectionMachine {
    pub fn new(mapper: CoordinateMapper) -> Self {
        Self {
            state: SelectionState::Idle,
            mapper,
        }
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, SelectionState::Dragging(_))
    }

    /// Pixel rectangle of the active drag, for the overlay.
    pub fn drag_rect(&self) -> Option<PixelRect> {
        match &self.state {
            SelectionState::Dragging(drag) => Some(drag.rect()),
            SelectionState::Idle => None,
        }
    }

    /// Anchor of the active drag.
    pub fn anchor(&self) -> Option<&Corner> {
        match &self.state {
            SelectionState::Dragging(drag) => Some(&drag.anchor),
            SelectionState::Idle => None,
        }
    }

    /// Start a gesture. Returns `false` if one is already active (single pointer).
    pub fn pointer_down(
        &mut self,
        pos: PixelPos,
        view: &BitmapView,
        resolver: &dyn AddressResolver,
    ) -> bool {
        if self.is_dragging() {
            return false;
        }
        self.state = SelectionState::Dragging(DragState {
            anchor_pixel: pos,
            current_pixel: pos,
            anchor: Corner::map(&self.mapper, pos, view, resolver),
        });
        true
    }

    /// Track the pointer; returns the updated rectangle while dragging.
    pub fn pointer_move(&mut self, pos: PixelPos) -> Option<PixelRect> {
        match &mut self.state {
            SelectionState::Dragging(drag) => {
                drag.current_pixel = pos;
                Some(drag.rect())
            }
            SelectionState::Idle => None,
        }
    }

    /// Finish the gesture. `pos` is `None` when the release happened where no
    /// pointer position is known; the last tracked position is used instead.
    ///
    /// Returns `None` when no gesture was active.
    pub fn pointer_up(
        &mut self,
        pos: Option<PixelPos>,
        view: &BitmapView,
        resolver: &dyn AddressResolver,
    ) -> Option<PendingSelection> {
        let SelectionState::Dragging(drag) = std::mem::take(&mut self.state) else {
            return None;
        };
        let end = pos.unwrap_or(drag.current_pixel);
        let mut pending = PendingSelection {
            anchor: drag.anchor,
            end: Corner::map(&self.mapper, end, view, resolver),
        };
        // The anchor lookup may have landed during the drag.
        pending.refresh(view, resolver);
        Some(pending)
    }

    /// Drop an active gesture without emitting anything.
    pub fn cancel(&mut self) {
        self.state = SelectionState::Idle;
    }
}

/// Normalize both endpoints into ranges, substituting undefined ends with view extremes.
pub fn commit(
    anchor_address: Endpoint<Address>,
    current_address: Endpoint<Address>,
    anchor_time: Endpoint<TimeIndex>,
    current_time: Endpoint<TimeIndex>,
    view: &BitmapView,
) -> Result<SelectionRequest> {
    let (a, b) = substitute_addresses(anchor_address, current_address, view)?;
    let (t1, t2) = substitute_times(anchor_time, current_time, view);
    Ok(SelectionRequest {
        addresses: AddressRange::new(a, b)?,
        times: TimeRange::new(t1, t2),
        bitmap_type: view.bitmap_type(),
        granularity: view.granularity(),
    })
}

fn substitute_addresses(
    a: Endpoint<Address>,
    b: Endpoint<Address>,
    view: &BitmapView,
) -> Result<(Address, Address)> {
    let min = view.addresses().low();
    let max = view.addresses().high();
    let extreme_for = |counterpart: &Address| -> Result<Address> {
        Ok(if counterpart.compare(min)? == Ordering::Greater {
            min.clone()
        } else {
            max.clone()
        })
    };
    Ok(match (a, b) {
        (Endpoint::Resolved(a), Endpoint::Resolved(b)) => (a, b),
        (Endpoint::Undefined, Endpoint::Resolved(b)) => (extreme_for(&b)?, b),
        (Endpoint::Resolved(a), Endpoint::Undefined) => {
            let b = extreme_for(&a)?;
            (a, b)
        }
        (Endpoint::Undefined, Endpoint::Undefined) => (min.clone(), max.clone()),
    })
}

fn substitute_times(
    a: Endpoint<TimeIndex>,
    b: Endpoint<TimeIndex>,
    view: &BitmapView,
) -> (TimeIndex, TimeIndex) {
    let span = view.time_range();
    let extreme_for = |counterpart: &TimeIndex| {
        if *counterpart > span.first() {
            span.first()
        } else {
            span.last()
        }
    };
    match (a, b) {
        (Endpoint::Resolved(a), Endpoint::Resolved(b)) => (a, b),
        (Endpoint::Undefined, Endpoint::Resolved(b)) => (extreme_for(&b), b),
        (Endpoint::Resolved(a), Endpoint::Undefined) => (a, extreme_for(&a)),
        (Endpoint::Undefined, Endpoint::Undefined) => (span.first(), span.last()),
    }
}
