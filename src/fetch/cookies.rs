//! Cookie records and the per-transport cookie jar.
//!
//! [`CookieRecord`] is the owned, serializable form of a cookie as set by a
//! server or supplied by a caller. [`CookieJar`] is the store a transport
//! consults on its full request pipeline.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

/// One cookie, as set by a server or attached by a caller.
///
/// Only `name` and `value` are sent when a record is attached to a request;
/// the remaining fields describe cookies received from a server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieRecord {
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: String,
    /// `Domain` attribute, if the server set one.
    pub domain: Option<String>,
    /// `Path` attribute, if the server set one.
    pub path: Option<String>,
    /// `Expires` attribute. Serialized as an HTTP date.
    #[serde(default, with = "http_date")]
    pub expires: Option<SystemTime>,
    /// `Max-Age` attribute in seconds.
    pub max_age: Option<u64>,
    /// `Secure` flag.
    pub secure: bool,
    /// `HttpOnly` flag.
    pub http_only: bool,
}

impl CookieRecord {
    /// Creates a record carrying only a name and value, for attaching to requests.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ..Self::default()
        }
    }

    /// Returns the `name=value` pair sent in a `Cookie` header.
    #[must_use]
    pub fn pair(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

impl From<reqwest::cookie::Cookie<'_>> for CookieRecord {
    fn from(cookie: reqwest::cookie::Cookie<'_>) -> Self {
        Self {
            name: cookie.name().to_string(),
            value: cookie.value().to_string(),
            domain: cookie.domain().map(str::to_string),
            path: cookie.path().map(str::to_string),
            expires: cookie.expires(),
            max_age: cookie.max_age().map(|age| age.as_secs()),
            secure: cookie.secure(),
            http_only: cookie.http_only(),
        }
    }
}

/// Serde adapter writing `Option<SystemTime>` as an RFC 7231 HTTP date.
mod http_date {
    use super::{Duration, SystemTime, UNIX_EPOCH};
    use serde::{Deserialize, Deserializer, Serializer};

    /// Latest instant an HTTP date can express (9999-12-31T23:59:59Z).
    const MAX_HTTP_DATE_SECS: u64 = 253_402_300_799;

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(value: &Option<SystemTime>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(time) => s.serialize_some(&httpdate::fmt_http_date(clamp(*time))),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<SystemTime>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        raw.map(|text| httpdate::parse_http_date(&text).map_err(serde::de::Error::custom))
            .transpose()
    }

    /// Keeps a time inside the range an HTTP date can represent.
    fn clamp(time: SystemTime) -> SystemTime {
        let secs = time
            .duration_since(UNIX_EPOCH)
            .map_or(0, |since| since.as_secs());
        UNIX_EPOCH + Duration::from_secs(secs.min(MAX_HTTP_DATE_SECS))
    }
}

/// Thread-safe, per-domain cookie store that refuses public-suffix domains.
///
/// Storage and matching (domain, path, secure, expiry) are delegated to
/// [`reqwest::cookie::Jar`]. On top of that, a `Set-Cookie` whose `Domain`
/// attribute names a public suffix (`com`, `co.uk`, ...) is dropped unless the
/// request host is that suffix itself.
#[derive(Debug, Default)]
pub struct CookieJar {
    inner: Jar,
}

impl CookieJar {
    /// Creates an empty jar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a single `Set-Cookie` string as if received from `url`.
    pub fn add_cookie_str(&self, cookie: &str, url: &Url) {
        if let Ok(value) = HeaderValue::from_str(cookie) {
            self.set_cookies(&mut std::iter::once(&value), url);
        }
    }

    /// Returns the `Cookie` header value the jar would send to `url`.
    #[must_use]
    pub fn cookie_header(&self, url: &Url) -> Option<String> {
        self.cookies(url)
            .and_then(|value| value.to_str().ok().map(str::to_string))
    }
}

impl CookieStore for CookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let mut accepted = cookie_headers.filter(|value| accepts(value, url));
        self.inner.set_cookies(&mut accepted, url);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.inner.cookies(url)
    }
}

fn accepts(value: &HeaderValue, url: &Url) -> bool {
    let Some(domain) = value.to_str().ok().and_then(domain_attribute) else {
        return true;
    };
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    if domain == host || !is_public_suffix(&domain) {
        return true;
    }
    debug!(domain = %domain, host = %host, "rejecting cookie scoped to a public suffix");
    false
}

/// Extracts the normalized `Domain` attribute from a `Set-Cookie` value.
fn domain_attribute(set_cookie: &str) -> Option<String> {
    set_cookie
        .split(';')
        .skip(1)
        .filter_map(|attribute| attribute.split_once('='))
        .filter(|(key, _)| key.trim().eq_ignore_ascii_case("domain"))
        .map(|(_, value)| value.trim().trim_start_matches('.').to_ascii_lowercase())
        .last()
        .filter(|domain| !domain.is_empty())
}

fn is_public_suffix(domain: &str) -> bool {
    psl::suffix_str(domain).is_some_and(|suffix| suffix.eq_ignore_ascii_case(domain))
}
