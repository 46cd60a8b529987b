//! Pixel offsets -> bitmap cell indices.
//!
//! The mapper stops at indices. Turning an IP index into an address needs the
//! subnet arithmetic the backend already does (`calculate_index`), so the
//! address itself is always resolved remotely.

use serde::{Deserialize, Serialize};

use super::time::TimeIndex;
use super::view::{BitmapView, IpAxisOrientation};
use crate::error::{Result, ViewerError};

/// Chrome around the rendered image that pointer coordinates still include.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Pixels to subtract from x before mapping.
    pub chrome_offset_x: i64,
    /// Pixels to subtract from y before mapping (height of a header band).
    pub chrome_offset_y: i64,
}

/// One bitmap cell as seen from the pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellIndex {
    /// Row offset from the view's origin address.
    pub ip_index: u64,
    /// Column offset from the first column of the view.
    pub time_ordinal: u64,
    /// Time value of that column.
    pub time: TimeIndex,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CoordinateMapper {
    config: MapperConfig,
}

impl CoordinateMapper {
    pub fn new(config: MapperConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> MapperConfig {
        self.config
    }

    /// Map a pixel position (relative to the image widget, chrome included) to a cell.
    pub fn pixel_to_index(&self, pixel_x: i64, pixel_y: i64, view: &BitmapView) -> Result<CellIndex> {
        let out_of_bounds = || ViewerError::OutOfBounds {
            x: pixel_x,
            y: pixel_y,
            width: view.width_px(),
            height: view.height_px(),
        };

        let x = pixel_x - self.config.chrome_offset_x;
        let y = pixel_y - self.config.chrome_offset_y;
        if x < 0 || y < 0 || x >= i64::from(view.width_px()) || y >= i64::from(view.height_px()) {
            return Err(out_of_bounds());
        }

        let scale = view.scale();
        let time_ordinal =
            axis_index(x as u64, scale.time, view.time_count()).ok_or_else(out_of_bounds)?;
        let row = axis_index(y as u64, scale.ip, view.ip_count()).ok_or_else(out_of_bounds)?;
        let ip_index = match view.orientation() {
            IpAxisOrientation::OriginAtTop => row,
            IpAxisOrientation::OriginAtBottom => view.ip_count() - 1 - row,
        };

        Ok(CellIndex {
            ip_index,
            time_ordinal,
            time: view.time_at(time_ordinal),
        })
    }
}

/// Free-function form of [`CoordinateMapper::pixel_to_index`].
pub fn pixel_to_index(
    pixel_x: i64,
    pixel_y: i64,
    view: &BitmapView,
    config: MapperConfig,
) -> Result<CellIndex> {
    CoordinateMapper::new(config).pixel_to_index(pixel_x, pixel_y, view)
}

/// Floor-divide and clamp the one-past-the-end index back onto the last cell.
fn axis_index(offset: u64, scale: u32, count: u64) -> Option<u64> {
    let index = offset / u64::from(scale.max(1));
    match index.cmp(&count) {
        std::cmp::Ordering::Less => Some(index),
        std::cmp::Ordering::Equal => count.checked_sub(1),
        std::cmp::Ordering::Greater => None,
    }
}
