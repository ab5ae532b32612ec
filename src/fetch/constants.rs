//! Constants for the fetch module (timeouts, default request headers).

/// Default transport timeout (30 seconds), covering connect, headers and body.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// `Accept` header sent with every request.
pub(crate) const ACCEPT_VALUE: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

/// `Accept-Encoding` header sent with every request.
///
/// Only gzip and deflate are decoded; `sdch` is advertised for parity with
/// older browsers and never appears in practice.
pub(crate) const ACCEPT_ENCODING_VALUE: &str = "gzip,deflate,sdch";

/// `Content-Type` for form-encoded POST bodies.
pub(crate) const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; param=value";

/// Non-standard two-byte prefix some servers put in front of raw deflate data.
pub(crate) const DEFLATE_ZLIB_PREFIX: [u8; 2] = [0x78, 0x9c];
