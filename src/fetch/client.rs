//! Fetcher: issues GET/POST requests over a [`Transport`].
//!
//! Every call resolves to exactly one [`Response`]. Failures are reported
//! through sentinel statuses, never as errors or panics.

use std::collections::BTreeMap;

use futures_util::StreamExt;
use reqwest::header::{
    ACCEPT, ACCEPT_ENCODING, CACHE_CONTROL, CONNECTION, CONTENT_TYPE, COOKIE, HOST, HeaderMap,
    HeaderName, HeaderValue, USER_AGENT,
};
use reqwest::{Client, Method};
use thiserror::Error;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, instrument, warn};
use url::Url;

use super::constants::{ACCEPT_ENCODING_VALUE, ACCEPT_VALUE, FORM_CONTENT_TYPE};
use super::cookies::{CookieJar, CookieRecord};
use super::decode::decode_body;
use super::response::{Response, Status, header_map_to_owned};
use super::transport::{Transport, is_resolve_timeout};
use crate::user_agent::UserAgent;

/// Which client a GET goes through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GetMode {
    /// Full pipeline: cookie jar and redirect policy of the transport apply.
    #[default]
    Pipeline,
    /// One raw round trip: no cookie jar, redirects never followed.
    RoundTrip,
}

impl From<bool> for GetMode {
    /// `true` selects the raw round trip.
    fn from(bypass: bool) -> Self {
        if bypass { Self::RoundTrip } else { Self::Pipeline }
    }
}

/// Per-call request parameters shared by GET and POST.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Extra headers in application order. Names are case-insensitive; a
    /// `host` entry replaces the Host header instead of adding a value.
    pub headers: Vec<(String, String)>,
    /// Cookies sent as `name=value` pairs in one `Cookie` header.
    pub cookies: Vec<CookieRecord>,
    /// User-Agent variant.
    pub user_agent: UserAgent,
}

impl RequestOptions {
    /// Empty options: no extra headers, no cookies, desktop User-Agent.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an extra header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Adds a cookie to attach.
    #[must_use]
    pub fn cookie(mut self, cookie: CookieRecord) -> Self {
        self.cookies.push(cookie);
        self
    }

    /// Selects the User-Agent variant.
    #[must_use]
    pub fn user_agent(mut self, user_agent: UserAgent) -> Self {
        self.user_agent = user_agent;
        self
    }
}

/// How caller headers combine with headers already on the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderMerge {
    /// Add another value next to existing ones.
    Append,
    /// Replace existing values.
    Replace,
}

/// Why a request could not be constructed.
#[derive(Debug, Error)]
enum BuildError {
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid header name {0:?}")]
    HeaderName(String),
    #[error("invalid value for header {0}")]
    HeaderValue(String),
    #[error("invalid cookie header")]
    Cookie,
    #[error("request build failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Why a 200 body could not be read.
#[derive(Debug, Error)]
enum BodyError {
    #[error("deadline elapsed while reading body")]
    Deadline,
    #[error("body stream failed: {0}")]
    Stream(#[source] reqwest::Error),
    #[error("body exceeds {limit} bytes")]
    TooBig { limit: usize },
}

/// Issues requests over one shared [`Transport`].
///
/// Cheap to clone; clones share the transport's connections policy and jar.
///
/// # Example
///
/// ```no_run
/// use fetcher_core::{Fetcher, GetMode, RequestOptions, Status, Transport, TransportConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let fetcher = Fetcher::new(Transport::build(TransportConfig::new(20))?);
/// let response = fetcher
///     .get("https://example.com/", &RequestOptions::new(), GetMode::Pipeline)
///     .await;
/// if response.status == Status::OK {
///     println!("{}", response.body);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Fetcher {
    transport: Transport,
}

impl Fetcher {
    /// Creates a fetcher over a built transport.
    #[must_use]
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    /// Transport this fetcher issues requests through.
    #[must_use]
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Performs a GET.
    ///
    /// Caller headers are appended next to the defaults. The body is read only
    /// for a 200; a failed read turns the status into
    /// [`Status::READ_TIMEOUT`], and an empty decoded body into
    /// [`Status::EMPTY_RESULT`].
    #[instrument(skip(self, options), fields(url = %url, mode = ?mode))]
    pub async fn get(&self, url: &str, options: &RequestOptions, mode: GetMode) -> Response {
        let (client, jar) = match mode {
            GetMode::Pipeline => (self.transport.pipeline_client(), self.jar()),
            GetMode::RoundTrip => (self.transport.round_trip_client(), None),
        };
        let request = match request_headers(options, &[], HeaderMerge::Append)
            .and_then(|headers| build_request(client, Method::GET, url, headers, jar, None))
        {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "cannot build GET request");
                return Response::failed(Status::REQUEST_BUILD_FAILED);
            }
        };

        let deadline = Instant::now() + self.transport.timeout();
        let response = match self.execute(client, request).await {
            Ok(response) => response,
            Err(status) => return Response::failed(status),
        };

        let status = Status::from(response.status());
        let cookies: Vec<CookieRecord> = response.cookies().map(CookieRecord::from).collect();
        let raw_headers = response.headers().clone();
        let headers = header_map_to_owned(&raw_headers);

        if status != Status::OK {
            debug!(status = %status, "non-200 status, body not read");
            return Response {
                status,
                body: String::new(),
                headers,
                cookies,
            };
        }

        let (status, body) = match read_body(response, deadline, self.body_limit()).await {
            Ok(raw) => finish_body(status, raw, &raw_headers),
            Err(e @ BodyError::TooBig { .. }) => {
                warn!(error = %e, "GET body rejected");
                (Status::BODY_TOO_BIG, String::new())
            }
            Err(e) => {
                warn!(error = %e, "GET body read failed");
                (Status::READ_TIMEOUT, String::new())
            }
        };

        Response {
            status,
            body,
            headers,
            cookies,
        }
    }

    /// Performs a form-encoded POST through the full pipeline.
    ///
    /// Caller headers replace same-named defaults. Form fields are sorted by
    /// key; a repeated key keeps its last value. Unlike [`get`](Self::get), a
    /// failed body read keeps the real status and returns an empty body.
    #[instrument(skip(self, form, options), fields(url = %url))]
    pub async fn post<K, V>(&self, url: &str, form: &[(K, V)], options: &RequestOptions) -> Response
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let client = self.transport.pipeline_client();
        let form_content_type = HeaderValue::from_static(FORM_CONTENT_TYPE);
        let request = match request_headers(
            options,
            &[(CONTENT_TYPE, form_content_type)],
            HeaderMerge::Replace,
        )
        .and_then(|headers| {
            build_request(
                client,
                Method::POST,
                url,
                headers,
                self.jar(),
                Some(encode_form(form)),
            )
        }) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "cannot build POST request");
                return Response::failed(Status::REQUEST_BUILD_FAILED);
            }
        };

        let deadline = Instant::now() + self.transport.timeout();
        let response = match self.execute(client, request).await {
            Ok(response) => response,
            Err(status) => return Response::failed(status),
        };

        let status = Status::from(response.status());
        let cookies: Vec<CookieRecord> = response.cookies().map(CookieRecord::from).collect();
        let raw_headers = response.headers().clone();
        let headers = header_map_to_owned(&raw_headers);

        if status != Status::OK {
            debug!(status = %status, "non-200 status, body not read");
            return Response {
                status,
                body: String::new(),
                headers,
                cookies,
            };
        }

        let (status, body) = match read_body(response, deadline, self.body_limit()).await {
            Ok(raw) => finish_body(status, raw, &raw_headers),
            Err(e @ BodyError::TooBig { .. }) => {
                warn!(error = %e, "POST body rejected");
                (Status::BODY_TOO_BIG, String::new())
            }
            Err(e) => {
                // Status stays as received.
                warn!(error = %e, "POST body read failed");
                (status, String::new())
            }
        };

        Response {
            status,
            body,
            headers,
            cookies,
        }
    }

    fn jar(&self) -> Option<&CookieJar> {
        self.transport.cookie_jar().map(|jar| &**jar)
    }

    fn body_limit(&self) -> Option<usize> {
        self.transport.config().body_limit()
    }

    /// Sends a request, bounding the wait for response headers by the timeout.
    async fn execute(
        &self,
        client: &Client,
        request: reqwest::Request,
    ) -> Result<reqwest::Response, Status> {
        let source_ip = self.transport.source_address();
        match timeout(self.transport.timeout(), client.execute(request)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) if is_resolve_timeout(&e) => {
                warn!(error = %e, source_ip = ?source_ip, "remote address resolution timed out");
                Err(Status::RESOLVE_TIMEOUT)
            }
            Ok(Err(e)) => {
                warn!(error = %e, timeout = e.is_timeout(), source_ip = ?source_ip, "request failed");
                Err(Status::REQUEST_FAILED)
            }
            Err(_) => {
                warn!(source_ip = ?source_ip, "no response headers before timeout");
                Err(Status::REQUEST_FAILED)
            }
        }
    }
}

/// Assembles request headers: defaults, then `extra_defaults`, then caller
/// headers merged per `merge`, then caller cookies.
fn request_headers(
    options: &RequestOptions,
    extra_defaults: &[(HeaderName, HeaderValue)],
    merge: HeaderMerge,
) -> Result<HeaderMap, BuildError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONNECTION, HeaderValue::from_static("close"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_VALUE));
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static(ACCEPT_ENCODING_VALUE));
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(options.user_agent.as_str()),
    );
    for (name, value) in extra_defaults {
        headers.insert(name.clone(), value.clone());
    }

    for (name, value) in &options.headers {
        let header_name = HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|_| BuildError::HeaderName(name.clone()))?;
        let header_value =
            HeaderValue::from_str(value).map_err(|_| BuildError::HeaderValue(name.clone()))?;
        if header_name == HOST || merge == HeaderMerge::Replace {
            headers.insert(header_name, header_value);
        } else {
            headers.append(header_name, header_value);
        }
    }

    if !options.cookies.is_empty() {
        let mut pairs: Vec<String> = headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok().map(str::to_string))
            .collect();
        pairs.extend(options.cookies.iter().map(CookieRecord::pair));
        let cookie = HeaderValue::from_str(&pairs.join("; ")).map_err(|_| BuildError::Cookie)?;
        headers.insert(COOKIE, cookie);
    }

    Ok(headers)
}

fn build_request(
    client: &Client,
    method: Method,
    url: &str,
    mut headers: HeaderMap,
    jar: Option<&CookieJar>,
    body: Option<String>,
) -> Result<reqwest::Request, BuildError> {
    let url = Url::parse(url)?;
    if let Some(jar) = jar {
        merge_jar_cookies(&mut headers, jar, &url)?;
    }
    let mut builder = client.request(method, url).headers(headers);
    if let Some(body) = body {
        builder = builder.body(body);
    }
    Ok(builder.build()?)
}

/// Puts the jar's cookies for `url` in front of an explicit `Cookie` header.
///
/// The client only consults its jar when a request has no `Cookie` header, so
/// once the caller supplies one the jar cookies are added here instead.
fn merge_jar_cookies(headers: &mut HeaderMap, jar: &CookieJar, url: &Url) -> Result<(), BuildError> {
    let Some(explicit) = headers.get(COOKIE) else {
        return Ok(());
    };
    let Some(stored) = jar.cookie_header(url) else {
        return Ok(());
    };
    let explicit = explicit.to_str().map_err(|_| BuildError::Cookie)?;
    let merged = HeaderValue::from_str(&format!("{stored}; {explicit}"))
        .map_err(|_| BuildError::Cookie)?;
    headers.insert(COOKIE, merged);
    Ok(())
}

/// URL-encodes form fields sorted by key; a repeated key keeps its last value.
fn encode_form<K: AsRef<str>, V: AsRef<str>>(form: &[(K, V)]) -> String {
    let fields: BTreeMap<&str, &str> = form
        .iter()
        .map(|(key, value)| (key.as_ref(), value.as_ref()))
        .collect();
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields)
        .finish()
}

/// Streams the whole body before `deadline`, enforcing the optional size cap.
///
/// The response is owned here, so the connection is released on every return.
async fn read_body(
    response: reqwest::Response,
    deadline: Instant,
    limit: Option<usize>,
) -> Result<Vec<u8>, BodyError> {
    if let Some(limit) = limit
        && response
            .content_length()
            .is_some_and(|length| length > limit as u64)
    {
        return Err(BodyError::TooBig { limit });
    }

    let mut stream = response.bytes_stream();
    let mut body = Vec::new();
    loop {
        let next = timeout_at(deadline, stream.next())
            .await
            .map_err(|_| BodyError::Deadline)?;
        let Some(chunk) = next else {
            break;
        };
        let chunk = chunk.map_err(BodyError::Stream)?;
        if let Some(limit) = limit
            && body.len() + chunk.len() > limit
        {
            return Err(BodyError::TooBig { limit });
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// Decodes a 200 body and applies the empty-result rule.
fn finish_body(status: Status, raw: Vec<u8>, headers: &HeaderMap) -> (Status, String) {
    let decoded = decode_body(raw, headers);
    if decoded.is_empty() {
        debug!("decoded body is empty");
        return (Status::EMPTY_RESULT, String::new());
    }
    let body = String::from_utf8(decoded)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned());
    (status, body)
}
