//! Description of one displayed bitmap.
//!
//! A [`BitmapView`] is built once from a backend response and replaced wholesale
//! on the next one; nothing mutates it in between. The mapper and the selection
//! machine only ever read from it.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::address::{Address, AddressRange};
use super::time::{TimeAxis, TimeIndex, TimeRange};
use crate::error::{Result, ViewerError};

// ─────────────────────────────────────────────────────────────────────────────
// Bitmap type / view kind / mode
// ─────────────────────────────────────────────────────────────────────────────

/// Which traffic direction a bitmap aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BitmapType {
    #[default]
    Source,
    Destination,
    Both,
}

impl BitmapType {
    pub const ALL: [BitmapType; 3] = [BitmapType::Source, BitmapType::Destination, BitmapType::Both];

    /// Short code used in file names and the `bitmap_type` query parameter.
    pub fn code(&self) -> &'static str {
        match self {
            BitmapType::Source => "s",
            BitmapType::Destination => "d",
            BitmapType::Both => "sd",
        }
    }

    /// Path of the rendered image on the backend (`image_s.png`, ...).
    pub fn image_path(&self) -> String {
        format!("image_{}.png", self.code())
    }

    pub fn label(&self) -> &'static str {
        match self {
            BitmapType::Source => "Source IPs",
            BitmapType::Destination => "Destination IPs",
            BitmapType::Both => "Both Directions",
        }
    }
}

impl std::str::FromStr for BitmapType {
    type Err = String;

    /// Accepts the short code (`s`, `d`, `sd`) or the long name.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s" | "source" => Ok(BitmapType::Source),
            "d" | "destination" => Ok(BitmapType::Destination),
            "sd" | "both" => Ok(BitmapType::Both),
            other => Err(format!("unknown bitmap type {other:?} (expected s, d or sd)")),
        }
    }
}

impl fmt::Display for BitmapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Full bitmap or a zoomed selection of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    Origin,
    Selected,
}

impl ViewKind {
    /// Value of the `bitmap_type` parameter of index-resolution requests.
    pub fn query_value(&self) -> &'static str {
        match self {
            ViewKind::Origin => "origin",
            ViewKind::Selected => "selected",
        }
    }
}

/// Whether the backend is still collecting data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Online,
    Offline,
}

impl ViewMode {
    /// Parse the `Mode` response header.
    pub fn from_header(value: &str) -> Option<Self> {
        match value.trim() {
            "online" => Some(ViewMode::Online),
            "offline" => Some(ViewMode::Offline),
            _ => None,
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewMode::Online => write!(f, "online"),
            ViewMode::Offline => write!(f, "offline"),
        }
    }
}

/// Where row 0 of the image sits relative to the origin address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IpAxisOrientation {
    /// Top pixel row is the origin address.
    #[default]
    OriginAtTop,
    /// Top pixel row is the highest address (how the backend renders images).
    OriginAtBottom,
}

/// Pixels per cell along each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelScale {
    pub ip: u32,
    pub time: u32,
}

impl PixelScale {
    pub fn uniform(pixels: u32) -> Self {
        Self {
            ip: pixels,
            time: pixels,
        }
    }
}

impl Default for PixelScale {
    fn default() -> Self {
        Self::uniform(1)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BitmapView
// ─────────────────────────────────────────────────────────────────────────────

/// Inputs for [`BitmapView::new`].
#[derive(Debug, Clone)]
pub struct ViewParams {
    pub kind: ViewKind,
    pub bitmap_type: BitmapType,
    pub addresses: AddressRange,
    /// Prefix length one row represents.
    pub granularity: u8,
    pub time_axis: TimeAxis,
    /// Declared number of rows; `None` derives it from the image height.
    pub ip_count: Option<u64>,
    /// Declared number of columns; `None` derives it from the image width.
    pub time_count: Option<u64>,
    pub width_px: u32,
    pub height_px: u32,
    pub scale: PixelScale,
    pub mode: ViewMode,
    pub orientation: IpAxisOrientation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BitmapView {
    kind: ViewKind,
    bitmap_type: BitmapType,
    addresses: AddressRange,
    granularity: u8,
    time_axis: TimeAxis,
    ip_count: u64,
    time_count: u64,
    width_px: u32,
    height_px: u32,
    scale: PixelScale,
    mode: ViewMode,
    orientation: IpAxisOrientation,
}

impl BitmapView {
    pub fn new(params: ViewParams) -> Result<Self> {
        if params.scale.ip == 0 || params.scale.time == 0 {
            return Err(ViewerError::InvalidView {
                reason: "pixel scale must be at least 1".to_string(),
            });
        }
        if params.granularity > params.addresses.version().bits() {
            return Err(ViewerError::InvalidView {
                reason: format!(
                    "granularity /{} exceeds {} address width",
                    params.granularity,
                    params.addresses.version()
                ),
            });
        }
        let ip_count = params
            .ip_count
            .unwrap_or(u64::from(params.height_px / params.scale.ip));
        let time_count = params
            .time_count
            .unwrap_or(u64::from(params.width_px / params.scale.time));
        if ip_count == 0 || time_count == 0 {
            return Err(ViewerError::MissingBitmap);
        }
        Ok(Self {
            kind: params.kind,
            bitmap_type: params.bitmap_type,
            addresses: params.addresses,
            granularity: params.granularity,
            time_axis: params.time_axis,
            ip_count,
            time_count,
            width_px: params.width_px,
            height_px: params.height_px,
            scale: params.scale,
            mode: params.mode,
            orientation: params.orientation,
        })
    }

    pub fn kind(&self) -> ViewKind {
        self.kind
    }

    pub fn bitmap_type(&self) -> BitmapType {
        self.bitmap_type
    }

    pub fn addresses(&self) -> &AddressRange {
        &self.addresses
    }

    /// Address of row 0 (`first_ip` in backend queries).
    pub fn origin_address(&self) -> &Address {
        self.addresses.low()
    }

    pub fn granularity(&self) -> u8 {
        self.granularity
    }

    pub fn time_axis(&self) -> &TimeAxis {
        &self.time_axis
    }

    pub fn interval_secs(&self) -> u32 {
        self.time_axis.interval_secs()
    }

    pub fn ip_count(&self) -> u64 {
        self.ip_count
    }

    pub fn time_count(&self) -> u64 {
        self.time_count
    }

    pub fn width_px(&self) -> u32 {
        self.width_px
    }

    pub fn height_px(&self) -> u32 {
        self.height_px
    }

    pub fn scale(&self) -> PixelScale {
        self.scale
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn orientation(&self) -> IpAxisOrientation {
        self.orientation
    }

    pub fn time_at(&self, ordinal: u64) -> TimeIndex {
        self.time_axis.at(ordinal.min(self.time_count - 1))
    }

    /// Declared time span: first column to last column.
    pub fn time_range(&self) -> TimeRange {
        TimeRange::new(self.time_axis.at(0), self.time_axis.at(self.time_count - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ViewParams {
        ViewParams {
            kind: ViewKind::Origin,
            bitmap_type: BitmapType::Source,
            addresses: AddressRange::new(
                Address::parse("10.0.0.0").unwrap(),
                Address::parse("10.0.0.255").unwrap(),
            )
            .unwrap(),
            granularity: 32,
            time_axis: TimeAxis::Intervals {
                first: 0,
                interval_secs: 60,
            },
            ip_count: None,
            time_count: None,
            width_px: 40,
            height_px: 512,
            scale: PixelScale::uniform(2),
            mode: ViewMode::Online,
            orientation: IpAxisOrientation::OriginAtTop,
        }
    }

    #[test]
    fn counts_default_to_image_size_over_scale() {
        let view = BitmapView::new(params()).unwrap();
        assert_eq!(view.ip_count(), 256);
        assert_eq!(view.time_count(), 20);
        assert_eq!(
            view.time_range(),
            TimeRange::new(TimeIndex::Interval(0), TimeIndex::Interval(19))
        );
    }

    #[test]
    fn zero_scale_is_rejected() {
        let mut p = params();
        p.scale = PixelScale { ip: 0, time: 1 };
        assert!(BitmapView::new(p).is_err());
    }

    #[test]
    fn bitmap_type_codes() {
        assert_eq!(BitmapType::Both.image_path(), "image_sd.png");
        assert_eq!(BitmapType::Destination.code(), "d");
        assert_eq!(ViewMode::from_header("offline"), Some(ViewMode::Offline));
        assert_eq!(ViewMode::from_header("sleeping"), None);
        assert_eq!("sd".parse::<BitmapType>(), Ok(BitmapType::Both));
        assert_eq!("Destination".parse::<BitmapType>(), Ok(BitmapType::Destination));
        assert!("x".parse::<BitmapType>().is_err());
    }
}
