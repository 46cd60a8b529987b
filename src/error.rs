//! Crate-wide error type.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ViewerError>;

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("invalid address: {text:?} ({reason})")]
    InvalidAddress { text: String, reason: String },

    #[error("cannot compare IPv{left} address with IPv{right} address")]
    VersionMismatch { left: u8, right: u8 },

    #[error("pixel ({x}, {y}) is outside the rendered {width}x{height} bitmap")]
    OutOfBounds { x: i64, y: i64, width: u32, height: u32 },

    #[error("invalid time value: {text:?}")]
    InvalidTime { text: String },

    #[error("backend request failed: {message}")]
    NetworkFailure { status: Option<u16>, message: String },

    #[error("backend reported no bitmap for this request")]
    MissingBitmap,

    #[error("invalid response header {name}: {value:?}")]
    InvalidHeader { name: &'static str, value: String },

    #[error("inconsistent bitmap description: {reason}")]
    InvalidView { reason: String },

    #[error("selection rejected: {reason}")]
    InvalidSelection { reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("base64 payload could not be decoded: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("bitmap image could not be decoded: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("window system error: {message}")]
    Window { message: String },
}

impl ViewerError {
    #[must_use]
    pub fn invalid_address(text: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            text: text.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn invalid_selection(reason: impl Into<String>) -> Self {
        Self::InvalidSelection {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn network(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::NetworkFailure {
            status,
            message: message.into(),
        }
    }

    /// Errors the polling loop shrugs off: the next scheduled fetch simply tries again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NetworkFailure { .. } | Self::Http(_) | Self::MissingBitmap
        )
    }
}

#[cfg(test)]
mod tests {
    use super::ViewerError;

    #[test]
    fn network_failure_is_transient() {
        let error = ViewerError::network(Some(404), "GET image_s.png returned 404");
        assert!(error.is_transient());
        assert_eq!(
            error.to_string(),
            "backend request failed: GET image_s.png returned 404"
        );
    }

    #[test]
    fn selection_error_is_not_transient() {
        let error = ViewerError::invalid_selection("zero-width time range");
        assert!(!error.is_transient());
        assert_eq!(error.to_string(), "selection rejected: zero-width time range");
    }
}
