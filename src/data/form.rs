//! Manual selection form and the submit-time validation shared with drag commits.

use std::cmp::Ordering;

use super::address::{Address, AddressRange};
use super::selection::SelectionRequest;
use super::time::{TimeIndex, TimeRange};
use super::view::BitmapView;
use crate::error::{Result, ViewerError};

/// Reject a selection the backend could not cut out of `view`.
///
/// Checked synchronously before anything is sent: the range must lie inside the
/// bitmap and span at least two cells on both axes (`low != high`).
pub fn validate_selection(request: &SelectionRequest, view: &BitmapView) -> Result<()> {
    let bounds = view.addresses();
    if request.addresses.version() != bounds.version() {
        return Err(ViewerError::invalid_selection(format!(
            "{} range on an {} bitmap",
            request.addresses.version(),
            bounds.version()
        )));
    }
    if !bounds.contains(request.addresses.low())? || !bounds.contains(request.addresses.high())? {
        return Err(ViewerError::invalid_selection(format!(
            "address range {} is outside the bitmap range {}",
            request.addresses, bounds
        )));
    }
    if request.addresses.is_single() {
        return Err(ViewerError::invalid_selection("zero-width address range"));
    }

    let span = view.time_range();
    if !request.times.first().same_kind(&span.first()) {
        return Err(ViewerError::invalid_selection(
            "time values do not match the bitmap's time axis",
        ));
    }
    if !span.contains(&request.times.first()) || !span.contains(&request.times.last()) {
        return Err(ViewerError::invalid_selection(format!(
            "time range {} is outside the bitmap range {}",
            request.times, span
        )));
    }
    if request.times.is_single() {
        return Err(ViewerError::invalid_selection("zero-width time range"));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GranularityStep {
    Increment,
    Decrement,
}

/// Text fields of the selection form, edited in place by the UI.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionForm {
    pub first_ip: String,
    pub last_ip: String,
    pub first_time: String,
    pub last_time: String,
    pub granularity: String,
}

impl SelectionForm {
    /// Form pre-filled with the whole extent of `view`.
    pub fn from_view(view: &BitmapView) -> Self {
        let span = view.time_range();
        Self {
            first_ip: view.addresses().low().to_string(),
            last_ip: view.addresses().high().to_string(),
            first_time: span.first().to_string(),
            last_time: span.last().to_string(),
            granularity: view.granularity().to_string(),
        }
    }

    /// Copy a committed drag into the fields.
    pub fn fill_from_request(&mut self, request: &SelectionRequest) {
        self.first_ip = request.addresses.low().to_string();
        self.last_ip = request.addresses.high().to_string();
        self.first_time = request.times.first().to_string();
        self.last_time = request.times.last().to_string();
        self.granularity = request.granularity.to_string();
    }

    /// Bounded +/- stepper. Non-numeric input falls back to the view's granularity.
    pub fn step_granularity(&mut self, step: GranularityStep, view: &BitmapView) {
        let max = i64::from(view.addresses().version().bits());
        let value = self
            .granularity
            .trim()
            .parse::<i64>()
            .unwrap_or(i64::from(view.granularity()));
        let next = if value > max {
            max
        } else if value < 0 {
            0
        } else {
            match step {
                GranularityStep::Increment if value < max => value + 1,
                GranularityStep::Decrement if value > 0 => value - 1,
                _ => value,
            }
        };
        self.granularity = next.to_string();
    }

    /// Parse the fields into a request for `view`, rejecting anything invalid.
    pub fn to_request(&self, view: &BitmapView) -> Result<SelectionRequest> {
        let version = view.addresses().version();
        let first_ip = Address::parse_as(version, &self.first_ip)?;
        let last_ip = Address::parse_as(version, &self.last_ip)?;
        if first_ip.compare(&last_ip)? == Ordering::Greater {
            return Err(ViewerError::invalid_selection(format!(
                "first address {first_ip} is greater than last address {last_ip}"
            )));
        }

        let first_time = TimeIndex::parse(&self.first_time)?;
        let last_time = TimeIndex::parse(&self.last_time)?;
        if !first_time.same_kind(&last_time) {
            return Err(ViewerError::invalid_selection(
                "first and last time use different formats",
            ));
        }
        if first_time > last_time {
            return Err(ViewerError::invalid_selection(format!(
                "first time {first_time} is after last time {last_time}"
            )));
        }

        let granularity = match self.granularity.trim() {
            "" => view.granularity(),
            text => text
                .parse::<u8>()
                .ok()
                .filter(|g| *g <= version.bits())
                .ok_or_else(|| {
                    ViewerError::invalid_selection(format!(
                        "granularity {text:?} must be between 0 and {}",
                        version.bits()
                    ))
                })?,
        };

        let request = SelectionRequest {
            addresses: AddressRange::new(first_ip, last_ip)?,
            times: TimeRange::new(first_time, last_time),
            bitmap_type: view.bitmap_type(),
            granularity,
        };
        validate_selection(&request, view)?;
        Ok(request)
    }
}
