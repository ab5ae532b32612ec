//! Normalized fetch result and its status codes.

use std::collections::BTreeMap;
use std::fmt;

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

use super::cookies::CookieRecord;

/// Status of one fetch attempt.
///
/// Holds either a real HTTP status code (100-999) or one of the sentinel
/// codes (1000 and up) that report a failure below the HTTP layer. Callers
/// branch on the status alone; fetches never return errors.
///
/// Serializes as a bare number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Status(u16);

impl Status {
    /// HTTP 200, the only status whose body is read.
    pub const OK: Self = Self(200);
    /// No status was ever recorded.
    pub const UNSET: Self = Self(1000);
    /// The body could not be read before the deadline (or the stream broke).
    pub const READ_TIMEOUT: Self = Self(1001);
    /// The body exceeded the transport's size cap.
    pub const BODY_TOO_BIG: Self = Self(1002);
    /// The request succeeded but produced an empty body.
    pub const EMPTY_RESULT: Self = Self(1003);
    /// The request could not be constructed (bad URL, bad header).
    pub const REQUEST_BUILD_FAILED: Self = Self(1004);
    /// The request failed before a response arrived (dial, TLS, timeout).
    pub const REQUEST_FAILED: Self = Self(1005);
    /// Resolving the remote address timed out.
    pub const RESOLVE_TIMEOUT: Self = Self(1006);

    const FIRST_SENTINEL: u16 = 1000;

    /// Wraps a raw status code.
    #[must_use]
    pub const fn from_code(code: u16) -> Self {
        Self(code)
    }

    /// Returns the raw numeric code.
    #[must_use]
    pub const fn code(self) -> u16 {
        self.0
    }

    /// Returns true for synthetic failure codes.
    #[must_use]
    pub const fn is_sentinel(self) -> bool {
        self.0 >= Self::FIRST_SENTINEL
    }

    /// Returns true for HTTP 200.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        self.0 == Self::OK.0
    }

    /// Returns true for real 3xx codes.
    #[must_use]
    pub const fn is_redirection(self) -> bool {
        self.0 >= 300 && self.0 < 400
    }

    /// Short description of a sentinel, `None` for real HTTP codes.
    #[must_use]
    pub fn sentinel_reason(self) -> Option<&'static str> {
        let reason = match self {
            Self::UNSET => "unset",
            Self::READ_TIMEOUT => "read timeout",
            Self::BODY_TOO_BIG => "body too big",
            Self::EMPTY_RESULT => "empty result",
            Self::REQUEST_BUILD_FAILED => "request build failed",
            Self::REQUEST_FAILED => "request failed",
            Self::RESOLVE_TIMEOUT => "address resolution timeout",
            _ => return None,
        };
        Some(reason)
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::UNSET
    }
}

impl From<reqwest::StatusCode> for Status {
    fn from(status: reqwest::StatusCode) -> Self {
        Self(status.as_u16())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sentinel_reason() {
            Some(reason) => write!(f, "{} ({reason})", self.0),
            None => write!(f, "{}", self.0),
        }
    }
}

/// Result of one fetch call.
///
/// Built once at the exit point of a fetch and handed to the caller; the
/// engine keeps no reference to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Real HTTP status or a sentinel.
    pub status: Status,
    /// Decoded body text. Empty unless the status is 200.
    pub body: String,
    /// Response headers by lower-case name, values in wire order.
    pub headers: BTreeMap<String, Vec<String>>,
    /// Cookies set by this response.
    pub cookies: Vec<CookieRecord>,
}

impl Response {
    /// A response carrying only a status, for failures before any headers arrived.
    pub(crate) fn failed(status: Status) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Returns the first value of a header, matching the name case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

/// Copies a header map into the owned, serializable representation.
pub(crate) fn header_map_to_owned(headers: &HeaderMap) -> BTreeMap<String, Vec<String>> {
    let mut owned: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        owned
            .entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    owned
}
