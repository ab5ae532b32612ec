//! Error types for the fetch module.
//!
//! Fetch calls never return errors: failures are encoded as sentinel statuses
//! on the [`Response`](super::Response). Only transport construction can fail,
//! and it does so with [`TransportError`].

use thiserror::Error;

/// Errors that can occur while building a [`Transport`](super::Transport).
#[derive(Debug, Error)]
pub enum TransportError {
    /// The proxy URL could not be parsed or is not usable as a proxy.
    #[error("invalid proxy URL {proxy}: {reason}")]
    InvalidProxy {
        /// The proxy string as supplied.
        proxy: String,
        /// Why the proxy was rejected.
        reason: String,
    },

    /// The fixed source address did not resolve to any local IP.
    #[error("cannot resolve source address {address}: {reason}")]
    SourceAddress {
        /// The source address as supplied.
        address: String,
        /// Why resolution failed.
        reason: String,
    },

    /// The underlying HTTP client rejected the configuration.
    #[error("failed to build HTTP client: {source}")]
    Build {
        /// The underlying client builder error.
        #[source]
        source: reqwest::Error,
    },
}

impl TransportError {
    /// Creates an invalid proxy error.
    pub fn invalid_proxy(proxy: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidProxy {
            proxy: proxy.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a source address resolution error.
    pub fn source_address(address: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceAddress {
            address: address.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a client build error.
    pub fn build(source: reqwest::Error) -> Self {
        Self::Build { source }
    }
}

// No `From<reqwest::Error>`: proxy and build failures both surface as
// reqwest errors but need different variants.
