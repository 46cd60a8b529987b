//! Request layer: what the viewer asks the bitmap backend, and what comes back.
//!
//! [`BitmapService`] is the seam between the session and the network. The
//! reqwest implementation lives in [`http`]; [`dispatcher`] runs jobs off the UI
//! thread and hands completions back over a channel.

pub mod dispatcher;
pub mod http;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::NaiveDateTime;

use crate::data::address::Address;
use crate::data::mapper::CellIndex;
use crate::data::readout::CellColour;
use crate::data::selection::SelectionRequest;
use crate::data::time::TimeIndex;
use crate::data::view::{BitmapType, ViewKind, ViewMode};
use crate::error::Result;

pub use dispatcher::Dispatcher;
pub use http::HttpBitmapService;

// ─────────────────────────────────────────────────────────────────────────────
// Decoded image
// ─────────────────────────────────────────────────────────────────────────────

/// RGBA pixels of one rendered bitmap.
#[derive(Clone, PartialEq, Eq)]
pub struct BitmapImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl std::fmt::Debug for BitmapImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitmapImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.rgba.len())
            .finish()
    }
}

impl BitmapImage {
    /// Decode a base64 response body holding a PNG.
    pub fn from_base64(body: &str) -> Result<Self> {
        let bytes = STANDARD.decode(body.trim())?;
        Self::from_png(&bytes)
    }

    pub fn from_png(bytes: &[u8]) -> Result<Self> {
        let decoded = image::load_from_memory_with_format(bytes, image::ImageFormat::Png)?.to_rgba8();
        Ok(Self {
            width: decoded.width(),
            height: decoded.height(),
            rgba: decoded.into_raw(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Requests
// ─────────────────────────────────────────────────────────────────────────────

/// Periodic refresh of the origin bitmap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub bitmap_type: BitmapType,
    /// Pixels per cell the backend renders with.
    pub scale: u32,
}

/// Why a cell is being looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupPurpose {
    /// Hover readout; only the newest one matters.
    Hover,
    /// Corner of a drag selection that cannot commit without it.
    Corner,
}

/// Resolve one cell into an address, a time and a colour.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRequest {
    pub view: ViewKind,
    /// Address of row 0 of that view.
    pub first_ip: Address,
    /// First time of that view, when its axis is timestamped.
    pub first_time: Option<TimeIndex>,
    pub cell: CellIndex,
    pub purpose: LookupPurpose,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobKind {
    Fetch(FetchRequest),
    ResolveIndex(IndexRequest),
    Select(SelectionRequest),
}

impl JobKind {
    pub fn label(&self) -> &'static str {
        match self {
            JobKind::Fetch(_) => "fetch",
            JobKind::ResolveIndex(_) => "resolve_index",
            JobKind::Select(_) => "select_area",
        }
    }

    /// A newer job of the same kind makes this one pointless to send.
    pub fn is_supersedable(&self) -> bool {
        matches!(
            self,
            JobKind::ResolveIndex(IndexRequest {
                purpose: LookupPurpose::Hover,
                ..
            })
        )
    }
}

/// One outgoing request, numbered by its stream's sequencer.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub seq: u64,
    pub kind: JobKind,
}

// ─────────────────────────────────────────────────────────────────────────────
// Responses
// ─────────────────────────────────────────────────────────────────────────────

/// Origin bitmap plus the metadata headers sent alongside it.
#[derive(Debug, Clone, PartialEq)]
pub struct BitmapResponse {
    pub image: BitmapImage,
    pub mode: Option<ViewMode>,
    /// Number of intervals collected so far (`Interval_range`).
    pub interval_range: Option<u64>,
    pub time_first: Option<NaiveDateTime>,
    /// Start of the newest interval (`Time_last`); bounds the column count.
    pub time_last: Option<NaiveDateTime>,
}

/// Answer to an [`IndexRequest`]; `None` where the backend said `undefined`.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexResponse {
    pub address: Option<Address>,
    pub time: Option<TimeIndex>,
    pub colour: CellColour,
}

/// Zoomed bitmap of a committed selection.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionResponse {
    pub image: BitmapImage,
    /// Pixels per IP row of the returned image.
    pub ip_unit: u32,
    /// Pixels per time column of the returned image.
    pub time_unit: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Bitmap(BitmapResponse),
    Index(IndexResponse),
    Selection(SelectionResponse),
}

/// A finished job: the job itself and what the backend made of it.
#[derive(Debug)]
pub struct Completion {
    pub job: Job,
    pub result: Result<Reply>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Service trait
// ─────────────────────────────────────────────────────────────────────────────

pub trait BitmapService: Send + Sync {
    fn fetch_bitmap(&self, request: &FetchRequest) -> Result<BitmapResponse>;
    fn resolve_index(&self, request: &IndexRequest) -> Result<IndexResponse>;
    fn select_area(&self, request: &SelectionRequest) -> Result<SelectionResponse>;

    /// Run one job to completion on the calling thread.
    fn execute(&self, job: Job) -> Completion {
        let result = match &job.kind {
            JobKind::Fetch(request) => self.fetch_bitmap(request).map(Reply::Bitmap),
            JobKind::ResolveIndex(request) => self.resolve_index(request).map(Reply::Index),
            JobKind::Select(request) => self.select_area(request).map(Reply::Selection),
        };
        Completion { job, result }
    }
}
