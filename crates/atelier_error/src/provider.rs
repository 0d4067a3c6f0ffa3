//! Provider adapter error types.

use std::fmt;

/// Structured error detail reported by a vendor API.
///
/// Renders as `message | type: t | code: c | param: p`, omitting absent parts.
///
/// # Examples
///
/// ```
/// use atelier_error::VendorDetail;
///
/// let detail = VendorDetail {
///     message: "Invalid API key".to_string(),
///     error_type: Some("invalid_request_error".to_string()),
///     code: Some("invalid_api_key".to_string()),
///     param: None,
/// };
/// assert_eq!(
///     detail.to_string(),
///     "Invalid API key | type: invalid_request_error | code: invalid_api_key"
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct VendorDetail {
    /// Human-readable message
    pub message: String,
    /// Vendor error type, e.g. `rate_limit_error`
    pub error_type: Option<String>,
    /// Vendor error code
    pub code: Option<String>,
    /// Request parameter the vendor rejected
    pub param: Option<String>,
}

impl VendorDetail {
    /// Detail carrying only a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }
}

impl fmt::Display for VendorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let Some(error_type) = &self.error_type {
            write!(f, " | type: {}", error_type)?;
        }
        if let Some(code) = &self.code {
            write!(f, " | code: {}", code)?;
        }
        if let Some(param) = &self.param {
            write!(f, " | param: {}", param)?;
        }
        Ok(())
    }
}

/// Provider-level error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ProviderErrorKind {
    /// Request could not be sent or the connection dropped
    #[display("Transport failure: {}", _0)]
    Transport(String),
    /// Vendor rejected the request with a non-success status
    #[display("{} (HTTP {})", detail, status)]
    Api {
        /// HTTP status code
        status: u16,
        /// Vendor-supplied detail
        detail: VendorDetail,
    },
    /// Vendor reported an error inside an open stream
    #[display("{}", _0)]
    Vendor(VendorDetail),
    /// Stream ended or broke before completion
    #[display("Stream interrupted: {}", _0)]
    Stream(String),
    /// Response body could not be decoded
    #[display("Malformed provider response: {}", _0)]
    Parse(String),
    /// No adapter registered under this provider id
    #[display("Unknown provider: {}", _0)]
    UnknownProvider(String),
    /// Credential missing for a provider that needs one
    #[display("Missing credential for provider {}", _0)]
    MissingCredential(String),
    /// Provider requires an explicit endpoint
    #[display("Provider {} requires an endpoint", _0)]
    MissingEndpoint(String),
}

impl ProviderErrorKind {
    /// HTTP status code, when the vendor returned one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderErrorKind::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Provider error with location tracking.
///
/// # Examples
///
/// ```
/// use atelier_error::{ProviderError, ProviderErrorKind};
///
/// let err = ProviderError::new(ProviderErrorKind::UnknownProvider("acme".to_string()));
/// assert!(format!("{}", err).contains("acme"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Provider Error: {} at line {} in {}", kind, line, file)]
pub struct ProviderError {
    /// The specific error kind
    pub kind: ProviderErrorKind,
    /// Line number where error occurred
    pub line: u32,
    /// Source file where error occurred
    pub file: &'static str,
}

impl ProviderError {
    /// Create a new provider error.
    #[track_caller]
    pub fn new(kind: ProviderErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
