#![allow(dead_code)]

use activity_viewer::client::BitmapImage;
use activity_viewer::data::address::{Address, AddressRange};
use activity_viewer::data::readout::AddressResolver;
use activity_viewer::data::selection::Endpoint;
use activity_viewer::data::time::TimeAxis;
use activity_viewer::data::view::{
    BitmapType, BitmapView, IpAxisOrientation, PixelScale, ViewKind, ViewMode, ViewParams,
};

pub fn addr(text: &str) -> Address {
    Address::parse(text).unwrap()
}

pub fn range(low: &str, high: &str) -> AddressRange {
    AddressRange::new(addr(low), addr(high)).unwrap()
}

/// Origin view over `low..=high`, one row per address, interval-counted columns.
pub fn view(low: &str, high: &str, width_px: u32, height_px: u32, scale: u32) -> BitmapView {
    BitmapView::new(ViewParams {
        kind: ViewKind::Origin,
        bitmap_type: BitmapType::Source,
        addresses: range(low, high),
        granularity: 32,
        time_axis: TimeAxis::Intervals {
            first: 0,
            interval_secs: 60,
        },
        ip_count: None,
        time_count: None,
        width_px,
        height_px,
        scale: PixelScale::uniform(scale),
        mode: ViewMode::Online,
        orientation: IpAxisOrientation::OriginAtTop,
    })
    .unwrap()
}

/// Resolves row `i` of an IPv4 view to `low + i` in the last octet.
pub struct LastOctetResolver;

impl AddressResolver for LastOctetResolver {
    fn address_at(&self, view: &BitmapView, ip_index: u64) -> Option<Endpoint<Address>> {
        let groups = view.origin_address().groups();
        let last = u64::from(groups[3]) + ip_index;
        if last > 255 {
            return Some(Endpoint::Undefined);
        }
        Some(Endpoint::Resolved(addr(&format!(
            "{}.{}.{}.{}",
            groups[0], groups[1], groups[2], last
        ))))
    }
}

/// Has not heard back from the backend about any row.
pub struct NothingResolved;

impl AddressResolver for NothingResolved {
    fn address_at(&self, _view: &BitmapView, _ip_index: u64) -> Option<Endpoint<Address>> {
        None
    }
}

pub fn blank_image(width: u32, height: u32) -> BitmapImage {
    BitmapImage {
        width,
        height,
        rgba: vec![0; (width * height * 4) as usize],
    }
}
