//! Configuration for the viewer, loaded from YAML.
//!
//! Every field has a default, so an empty file (or no file at all) is a valid
//! configuration. Command-line flags override what the file says.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::address::{Address, AddressRange};
use crate::data::mapper::MapperConfig;
use crate::data::scheduler::ResponseOrdering;
use crate::data::time::{parse_timestamp, TimeAxis};
use crate::data::view::{BitmapType, IpAxisOrientation};
use crate::error::Result;

// ─────────────────────────────────────────────────────────────────────────────
// Backend
// ─────────────────────────────────────────────────────────────────────────────

/// Where the bitmap backend lives and how long to wait for it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL; image paths and query strings are appended to it.
    pub base_url: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Request worker threads; bounds how many requests are in flight.
    pub workers: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            connect_timeout_secs: 2,
            request_timeout_secs: 10,
            workers: crate::client::dispatcher::DEFAULT_WORKERS,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Bitmap description
// ─────────────────────────────────────────────────────────────────────────────

/// The monitored bitmap as the collector was configured to build it.
///
/// The backend only reports the time span and mode; the address range, the
/// granularity and the interval length have to be known up front.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BitmapSettings {
    pub first_ip: String,
    pub last_ip: String,
    /// Prefix length one row covers.
    pub granularity: u8,
    /// First interval start (`YYYY-MM-DD HH:MM:SS`). Used when the backend does not send `Time_first`.
    pub time_first: Option<String>,
    /// Length of one interval (column) in seconds.
    pub interval_secs: u32,
    /// Number of intervals kept in the window.
    pub window: u64,
    /// Bitmap shown at start-up.
    pub bitmap_type: BitmapType,
    /// Pixels per cell requested from the backend.
    pub scale: u32,
    pub orientation: IpAxisOrientation,
}

impl Default for BitmapSettings {
    fn default() -> Self {
        Self {
            first_ip: "192.168.0.0".to_string(),
            last_ip: "192.168.0.255".to_string(),
            granularity: 32,
            time_first: None,
            interval_secs: 60,
            window: 100,
            bitmap_type: BitmapType::Source,
            scale: 2,
            orientation: IpAxisOrientation::OriginAtBottom,
        }
    }
}

impl BitmapSettings {
    pub fn address_range(&self) -> Result<AddressRange> {
        AddressRange::new(Address::parse(&self.first_ip)?, Address::parse(&self.last_ip)?)
    }

    /// Time axis of the origin view when the backend did not say where it starts.
    pub fn fallback_time_axis(&self) -> Result<TimeAxis> {
        Ok(match &self.time_first {
            Some(text) => TimeAxis::Timestamps {
                first: parse_timestamp(text)?,
                interval_secs: self.interval_secs,
            },
            None => TimeAxis::Intervals {
                first: 0,
                interval_secs: self.interval_secs,
            },
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Interaction
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// Width of the chrome left of the image inside the bitmap widget.
    pub chrome_offset_x: i64,
    /// Height of the header band above the image inside the bitmap widget.
    pub chrome_offset_y: i64,
    /// How completions of overlapping requests are applied.
    pub response_ordering: ResponseOrdering,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            chrome_offset_x: 0,
            chrome_offset_y: 50,
            response_ordering: ResponseOrdering::LatestIssued,
        }
    }
}

impl InteractionConfig {
    pub fn mapper_config(&self) -> MapperConfig {
        MapperConfig {
            chrome_offset_x: self.chrome_offset_x,
            chrome_offset_y: self.chrome_offset_y,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging / window
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` takes precedence.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "activity_viewer=info".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: f32,
    pub height: f32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "IP Activity".to_string(),
            width: 1400.0,
            height: 900.0,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ViewerConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Top-level configuration.
///
/// | Field         | Purpose |
/// |---------------|---------|
/// | `backend`     | Backend URL and timeouts |
/// | `bitmap`      | Address range, granularity and time axis of the bitmap |
/// | `interaction` | Widget chrome offsets and response ordering |
/// | `logging`     | Log filter |
/// | `window`      | Native window title and size |
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub backend: BackendConfig,
    pub bitmap: BitmapSettings,
    pub interaction: InteractionConfig,
    pub logging: LoggingConfig,
    pub window: WindowConfig,
}

impl ViewerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}
