//! HTTP fetch engine.
//!
//! This module provides:
//! - Transport construction from a policy record (timeout, source address,
//!   proxy, redirects, cookie jar)
//! - GET and form POST with default browser-like headers
//! - Body decompression (gzip, deflate)
//! - Normalized responses with sentinel statuses for transport failures

mod client;
mod constants;
mod cookies;
mod decode;
mod error;
mod response;
mod transport;

pub use client::{Fetcher, GetMode, RequestOptions};
pub use constants::DEFAULT_TIMEOUT_SECS;
pub use cookies::{CookieJar, CookieRecord};
pub use decode::decode_body;
pub use error::TransportError;
pub use response::{Response, Status};
pub use transport::{DialMode, Transport, TransportConfig};
