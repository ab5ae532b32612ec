//! Response body decompression.
//!
//! A body that claims an encoding but does not decode is returned untouched.

use std::io::Read;

use flate2::read::{DeflateDecoder, MultiGzDecoder};
use reqwest::header::{CONTENT_ENCODING, HeaderMap};
use tracing::warn;

use super::constants::DEFLATE_ZLIB_PREFIX;

/// Decodes a raw body according to its `Content-Encoding` header.
///
/// The gzip and deflate stages run independently and in that order, so a
/// header naming both applies both. Each stage falls back to its input when
/// decoding fails or yields nothing.
#[must_use]
pub fn decode_body(raw: Vec<u8>, headers: &HeaderMap) -> Vec<u8> {
    let encoding = content_encoding(headers);
    let mut body = raw;

    if encoding.contains("gzip") {
        body = gunzip(body);
    }

    if encoding.contains("deflate") {
        body = inflate(body);
    }

    body
}

/// Returns all `Content-Encoding` values joined, lower-cased.
fn content_encoding(headers: &HeaderMap) -> String {
    headers
        .get_all(CONTENT_ENCODING)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect::<Vec<_>>()
        .join(",")
        .to_ascii_lowercase()
}

/// Gunzips every member of a possibly multi-member gzip stream.
fn gunzip(raw: Vec<u8>) -> Vec<u8> {
    let mut decoded = Vec::new();
    let result = MultiGzDecoder::new(raw.as_slice()).read_to_end(&mut decoded);
    if let Err(e) = result {
        warn!(error = %e, raw_len = raw.len(), decoded_len = decoded.len(), "gzip decode failed, keeping raw body");
        return raw;
    }
    if decoded.is_empty() {
        return raw;
    }
    decoded
}

/// Inflates raw deflate data, skipping the zlib-style prefix when present.
fn inflate(raw: Vec<u8>) -> Vec<u8> {
    let stream = raw.strip_prefix(&DEFLATE_ZLIB_PREFIX).unwrap_or(&raw);
    let mut decoded = Vec::new();
    let result = DeflateDecoder::new(stream).read_to_end(&mut decoded);
    if let Err(e) = result {
        warn!(error = %e, raw_len = raw.len(), decoded_len = decoded.len(), "deflate decode failed, keeping raw body");
        return raw;
    }
    if decoded.is_empty() {
        return raw;
    }
    decoded
}
