//! Live hover readout and the address lookups built from it.

use std::collections::HashMap;

use super::address::Address;
use super::mapper::CellIndex;
use super::selection::Endpoint;
use super::time::TimeIndex;
use super::view::{BitmapView, ViewKind};

/// Entries kept before the cache starts over.
const READOUT_CACHE_CAPACITY: usize = 4096;

/// Resolves the address of an IP row of a view.
///
/// The selection machine only ever asks; it never computes addresses itself.
/// `None` means the backend has not answered for that row yet.
pub trait AddressResolver {
    fn address_at(&self, view: &BitmapView, ip_index: u64) -> Option<Endpoint<Address>>;
}

/// Colour of the cell under the pointer as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CellColour {
    #[default]
    Black,
    White,
    /// Backend considers the cell outside the bitmap.
    Gray,
    Other(String),
}

impl CellColour {
    pub fn from_header(value: &str) -> Self {
        match value.trim() {
            "black" => CellColour::Black,
            "white" => CellColour::White,
            "gray" | "grey" => CellColour::Gray,
            other => CellColour::Other(other.to_string()),
        }
    }

    /// Whether the cell saw any activity.
    pub fn is_active(&self) -> bool {
        matches!(self, CellColour::White)
    }
}

/// One resolved hover position.
#[derive(Debug, Clone, PartialEq)]
pub struct Readout {
    pub kind: ViewKind,
    pub cell: CellIndex,
    /// `None` when the backend answered `undefined`.
    pub address: Option<Address>,
    pub time: Option<TimeIndex>,
    pub colour: CellColour,
}

/// Addresses the backend has already resolved, per view kind and row.
#[derive(Debug, Default)]
pub struct ReadoutCache {
    addresses: HashMap<(ViewKind, u64), Endpoint<Address>>,
    latest: Option<Readout>,
}

impl ReadoutCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the backend's answer for one row.
    pub fn remember(&mut self, kind: ViewKind, ip_index: u64, address: Endpoint<Address>) {
        if self.addresses.len() >= READOUT_CACHE_CAPACITY {
            self.addresses.clear();
        }
        self.addresses.insert((kind, ip_index), address);
    }

    /// Show `readout` as the hover label and remember its row.
    pub fn record(&mut self, readout: Readout) {
        self.remember(
            readout.kind,
            readout.cell.ip_index,
            readout.address.clone().into(),
        );
        self.latest = Some(readout);
    }

    /// Most recent readout, for the hover label.
    pub fn latest(&self) -> Option<&Readout> {
        self.latest.as_ref()
    }

    pub fn clear_latest(&mut self) {
        self.latest = None;
    }

    /// Forget every address of one view (its origin or granularity changed).
    pub fn invalidate(&mut self, kind: ViewKind) {
        self.addresses.retain(|(k, _), _| *k != kind);
        if self.latest.as_ref().is_some_and(|r| r.kind == kind) {
            self.latest = None;
        }
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

impl AddressResolver for ReadoutCache {
    fn address_at(&self, view: &BitmapView, ip_index: u64) -> Option<Endpoint<Address>> {
        self.addresses.get(&(view.kind(), ip_index)).cloned()
    }
}
