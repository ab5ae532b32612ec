//! Fetcher Core Library
//!
//! This library provides an HTTP fetch engine: it issues GET/POST requests
//! under caller-controlled transport policy and returns a normalized
//! [`Response`] whose status is either a real HTTP code or a synthetic
//! sentinel describing a transport-layer failure.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`fetch`] - Transport builder, cookie jar, fetcher and body decoder
//! - [`user_agent`] - Desktop and mobile User-Agent strings
//!
//! # Example
//!
//! ```no_run
//! use fetcher_core::{Fetcher, GetMode, RequestOptions, Transport, TransportConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Transport::build(TransportConfig::new(30))?.with_cookie_jar()?;
//! let fetcher = Fetcher::new(transport);
//! let response = fetcher
//!     .get("https://example.com/", &RequestOptions::default(), GetMode::Pipeline)
//!     .await;
//! println!("{} {} bytes", response.status, response.body.len());
//! # Ok(())
//! # }
//! ```

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod fetch;
pub mod user_agent;

// Re-export commonly used types
pub use fetch::{
    CookieJar, CookieRecord, DEFAULT_TIMEOUT_SECS, DialMode, Fetcher, GetMode, RequestOptions,
    Response, Status, Transport, TransportConfig, TransportError, decode_body,
};
pub use user_agent::UserAgent;
