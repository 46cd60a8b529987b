//! Blocking reqwest client for the bitmap backend.
//!
//! Every call is a plain `GET` with a URL-encoded query string. The payload is
//! a base64 PNG in the body; everything else travels in response headers.

use std::str::FromStr;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;

use super::{
    BitmapImage, BitmapResponse, BitmapService, FetchRequest, IndexRequest, IndexResponse,
    SelectionResponse,
};
use crate::config::BackendConfig;
use crate::data::address::Address;
use crate::data::readout::CellColour;
use crate::data::selection::SelectionRequest;
use crate::data::time::{parse_timestamp, TimeIndex};
use crate::data::view::ViewMode;
use crate::error::{Result, ViewerError};

/// Response header names as the backend sends them (matched case-insensitively).
pub mod header {
    pub const BITMAP: &str = "bitmap";
    pub const MODE: &str = "mode";
    pub const INTERVAL_RANGE: &str = "interval_range";
    pub const TIME_FIRST: &str = "time_first";
    pub const TIME_LAST: &str = "time_last";
    pub const IP_INDEX: &str = "ip_index";
    pub const CELL_COLOUR: &str = "cell_colour";
    pub const TIME_INDEX: &str = "time_index";
    pub const IP_UNIT: &str = "ip_unit";
    pub const TIME_UNIT: &str = "time_unit";
}

/// Header value the backend uses for a cell outside the bitmap.
pub const UNDEFINED: &str = "undefined";

type Query = Vec<(&'static str, String)>;

#[derive(Debug, Clone)]
pub struct HttpBitmapService {
    client: Client,
    base_url: String,
}

impl HttpBitmapService {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get(&self, path: &str, query: &Query) -> Result<(HeaderMap, String)> {
        let url = format!("{}/{}", self.base_url, path);
        tracing::debug!(%url, ?query, "backend request");

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .map_err(|e| ViewerError::network(e.status().map(|s| s.as_u16()), format!("GET {path}: {e}")))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ViewerError::network(
                Some(status.as_u16()),
                format!("GET {path} returned {}", status.as_u16()),
            ));
        }
        let headers = response.headers().clone();
        let body = response
            .text()
            .map_err(|e| ViewerError::network(None, format!("GET {path}: {e}")))?;
        Ok((headers, body))
    }
}

impl BitmapService for HttpBitmapService {
    fn fetch_bitmap(&self, request: &FetchRequest) -> Result<BitmapResponse> {
        let (headers, body) = self.get(&request.bitmap_type.image_path(), &fetch_query(request))?;
        parse_bitmap_response(&headers, &body)
    }

    fn resolve_index(&self, request: &IndexRequest) -> Result<IndexResponse> {
        let (headers, _) = self.get("", &index_query(request))?;
        parse_index_response(&headers)
    }

    fn select_area(&self, request: &SelectionRequest) -> Result<SelectionResponse> {
        let (headers, body) = self.get("", &select_query(request))?;
        parse_selection_response(&headers, &body)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Query strings
// ─────────────────────────────────────────────────────────────────────────────

pub fn fetch_query(request: &FetchRequest) -> Query {
    vec![
        ("update", "true".to_string()),
        ("scale", request.scale.to_string()),
    ]
}

pub fn index_query(request: &IndexRequest) -> Query {
    let mut query = vec![
        ("calculate_index", "true".to_string()),
        ("bitmap_type", request.view.query_value().to_string()),
        ("first_ip", request.first_ip.as_str().to_string()),
        ("ip_index", request.cell.ip_index.to_string()),
        ("time_index", request.cell.time_ordinal.to_string()),
    ];
    if let Some(first_time) = &request.first_time {
        query.push(("first_time", first_time.to_string()));
    }
    query
}

pub fn select_query(request: &SelectionRequest) -> Query {
    vec![
        ("select_area", "true".to_string()),
        ("bitmap_type", request.bitmap_type.code().to_string()),
        ("first_ip", request.addresses.low().as_str().to_string()),
        ("last_ip", request.addresses.high().as_str().to_string()),
        ("first_int", request.times.first().to_string()),
        ("last_int", request.times.last().to_string()),
        ("subnet_size", request.granularity.to_string()),
    ]
}

// ─────────────────────────────────────────────────────────────────────────────
// Response parsing
// ─────────────────────────────────────────────────────────────────────────────

pub fn parse_bitmap_response(headers: &HeaderMap, body: &str) -> Result<BitmapResponse> {
    require_bitmap(headers)?;
    let mode = match header_str(headers, header::MODE)? {
        Some(value) => Some(ViewMode::from_header(value).ok_or_else(|| ViewerError::InvalidHeader {
            name: header::MODE,
            value: value.to_string(),
        })?),
        None => None,
    };
    Ok(BitmapResponse {
        image: BitmapImage::from_base64(body)?,
        mode,
        interval_range: header_number(headers, header::INTERVAL_RANGE)?,
        time_first: header_str(headers, header::TIME_FIRST)?
            .map(parse_timestamp)
            .transpose()?,
        time_last: header_str(headers, header::TIME_LAST)?
            .map(parse_timestamp)
            .transpose()?,
    })
}

pub fn parse_index_response(headers: &HeaderMap) -> Result<IndexResponse> {
    let address = match header_str(headers, header::IP_INDEX)? {
        None | Some(UNDEFINED) => None,
        Some(text) => Some(Address::parse(text)?),
    };
    let time = match header_str(headers, header::TIME_INDEX)? {
        None | Some(UNDEFINED) => None,
        Some(text) => Some(TimeIndex::parse(text)?),
    };
    let colour = header_str(headers, header::CELL_COLOUR)?
        .map(CellColour::from_header)
        .unwrap_or_default();
    Ok(IndexResponse {
        address,
        time,
        colour,
    })
}

pub fn parse_selection_response(headers: &HeaderMap, body: &str) -> Result<SelectionResponse> {
    require_bitmap(headers)?;
    // The backend floors original/selected size; a selection larger than the origin yields 0.
    let ip_unit = header_number::<u32>(headers, header::IP_UNIT)?.unwrap_or(1).max(1);
    let time_unit = header_number::<u32>(headers, header::TIME_UNIT)?.unwrap_or(1).max(1);
    Ok(SelectionResponse {
        image: BitmapImage::from_base64(body)?,
        ip_unit,
        time_unit,
    })
}

fn require_bitmap(headers: &HeaderMap) -> Result<()> {
    match header_str(headers, header::BITMAP)? {
        Some("ok") => Ok(()),
        _ => Err(ViewerError::MissingBitmap),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<Option<&'a str>> {
    match headers.get(name) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(|s| Some(s.trim()))
            .map_err(|_| ViewerError::InvalidHeader {
                name,
                value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
            }),
    }
}

fn header_number<T: FromStr>(headers: &HeaderMap, name: &'static str) -> Result<Option<T>> {
    match header_str(headers, name)? {
        None => Ok(None),
        Some(text) => text
            .parse::<T>()
            .map(Some)
            .map_err(|_| ViewerError::InvalidHeader {
                name,
                value: text.to_string(),
            }),
    }
}
