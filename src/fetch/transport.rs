//! Transport construction.
//!
//! A [`Transport`] bundles every connection-level policy a fetch runs under:
//! deadline, source address, proxy, redirect handling and cookie jar. All
//! variants come from one [`TransportConfig`] consumed by [`Transport::build`].
//!
//! Every transport:
//! - bounds connect and the whole request (headers and body) by its timeout
//! - never reuses connections (idle pool size 0)
//! - skips TLS certificate verification
//! - ignores system proxy settings unless a proxy is configured
//! - leaves bodies compressed so the fetcher decodes them itself

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use reqwest::redirect::Policy;
use reqwest::{Client, ClientBuilder, Proxy};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::constants::DEFAULT_TIMEOUT_SECS;
use super::cookies::CookieJar;
use super::error::TransportError;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Looks up the socket addresses of a remote host name.
type LookupFn = dyn Fn(String) -> BoxFuture<'static, io::Result<Vec<SocketAddr>>> + Send + Sync;

/// Remote host lookup used by source-bound transports.
#[derive(Clone)]
pub(crate) struct RemoteLookup(Arc<LookupFn>);

impl RemoteLookup {
    /// System resolver via `tokio::net::lookup_host`.
    fn system() -> Self {
        Self(Arc::new(
            |host: String| -> BoxFuture<'static, io::Result<Vec<SocketAddr>>> {
                Box::pin(async move {
                    let addrs = tokio::net::lookup_host((host, 0)).await?;
                    Ok::<Vec<SocketAddr>, io::Error>(addrs.collect())
                })
            },
        ))
    }

    #[cfg(test)]
    pub(crate) fn from_fn<F>(lookup: F) -> Self
    where
        F: Fn(String) -> BoxFuture<'static, io::Result<Vec<SocketAddr>>> + Send + Sync + 'static,
    {
        Self(Arc::new(lookup))
    }

    fn lookup(&self, host: String) -> BoxFuture<'static, io::Result<Vec<SocketAddr>>> {
        (self.0)(host)
    }
}

impl fmt::Debug for RemoteLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RemoteLookup")
    }
}

/// How connections pick their local address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DialMode {
    /// Let the OS choose the local address.
    #[default]
    Direct,
    /// Bind every connection to this local address (IP literal or host name).
    SourceAddress(String),
}

/// Policy record consumed by [`Transport::build`].
///
/// ```
/// use fetcher_core::TransportConfig;
///
/// let config = TransportConfig::new(10)
///     .source_address("127.0.0.1")
///     .no_redirect();
/// assert!(!config.follows_redirects());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    timeout: Duration,
    dial: DialMode,
    proxy: Option<String>,
    follow_redirects: bool,
    max_body_bytes: Option<usize>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT_SECS)
    }
}

impl TransportConfig {
    /// Plain transport: direct dial, no proxy, redirects followed.
    #[must_use]
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
            dial: DialMode::Direct,
            proxy: None,
            follow_redirects: true,
            max_body_bytes: None,
        }
    }

    /// Overrides the timeout with sub-second precision.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Binds outbound connections to a fixed local address.
    #[must_use]
    pub fn source_address(mut self, address: impl Into<String>) -> Self {
        self.dial = DialMode::SourceAddress(address.into());
        self
    }

    /// Routes every request through an upstream proxy.
    #[must_use]
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Returns redirect responses to the caller instead of following them.
    #[must_use]
    pub fn no_redirect(mut self) -> Self {
        self.follow_redirects = false;
        self
    }

    /// Caps the raw body size a fetch will read.
    #[must_use]
    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = Some(limit);
        self
    }

    /// Configured timeout.
    #[must_use]
    pub fn timeout_duration(&self) -> Duration {
        self.timeout
    }

    /// Configured dial mode.
    #[must_use]
    pub fn dial_mode(&self) -> &DialMode {
        &self.dial
    }

    /// Configured proxy, if any.
    #[must_use]
    pub fn proxy_url(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    /// Whether the full pipeline follows redirects.
    #[must_use]
    pub fn follows_redirects(&self) -> bool {
        self.follow_redirects
    }

    /// Configured body cap, if any.
    #[must_use]
    pub fn body_limit(&self) -> Option<usize> {
        self.max_body_bytes
    }
}

/// Immutable bundle of connection policy, shared by any number of fetches.
///
/// Holds two clients built from the same policy: the pipeline client (cookie
/// jar and redirect policy applied) and the round-trip client (neither).
/// Cloning is cheap and clones share the cookie jar.
#[derive(Debug, Clone)]
pub struct Transport {
    config: TransportConfig,
    source: Option<IpAddr>,
    cookie_jar: Option<Arc<CookieJar>>,
    lookup: RemoteLookup,
    pipeline: Client,
    round_trip: Client,
}

impl Transport {
    /// Builds a transport from a policy record.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if:
    /// - the proxy URL does not parse
    /// - the source address does not resolve to a local IP
    /// - the HTTP client rejects the configuration
    #[instrument(level = "debug", skip(config), fields(timeout = ?config.timeout, proxy = ?config.proxy))]
    pub fn build(config: TransportConfig) -> Result<Self, TransportError> {
        let source = match &config.dial {
            DialMode::Direct => None,
            DialMode::SourceAddress(address) => Some(resolve_source_address(address)?),
        };
        Self::assemble(config, source, None, RemoteLookup::system())
    }

    /// Returns an equivalent transport that does not follow redirects.
    ///
    /// The cookie jar, if any, and the resolved source address are carried over.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if rebuilding the clients fails.
    pub fn with_no_redirect(self) -> Result<Self, TransportError> {
        Self::assemble(
            self.config.no_redirect(),
            self.source,
            self.cookie_jar,
            self.lookup,
        )
    }

    /// Returns an equivalent transport with a fresh, empty cookie jar.
    ///
    /// Any jar already installed is replaced, not merged.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if rebuilding the clients fails.
    pub fn with_cookie_jar(self) -> Result<Self, TransportError> {
        Self::assemble(
            self.config,
            self.source,
            Some(Arc::new(CookieJar::new())),
            self.lookup,
        )
    }

    /// Policy this transport was built from.
    #[must_use]
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Resolved local address connections are bound to, if any.
    #[must_use]
    pub fn source_address(&self) -> Option<IpAddr> {
        self.source
    }

    /// Installed cookie jar, if any.
    #[must_use]
    pub fn cookie_jar(&self) -> Option<&Arc<CookieJar>> {
        self.cookie_jar.as_ref()
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.config.timeout
    }

    pub(crate) fn pipeline_client(&self) -> &Client {
        &self.pipeline
    }

    pub(crate) fn round_trip_client(&self) -> &Client {
        &self.round_trip
    }

    /// Builds both clients around an already resolved source address.
    pub(crate) fn assemble(
        config: TransportConfig,
        source: Option<IpAddr>,
        cookie_jar: Option<Arc<CookieJar>>,
        lookup: RemoteLookup,
    ) -> Result<Self, TransportError> {
        let proxy = config.proxy.as_deref().map(parse_proxy).transpose()?;

        let redirect = if config.follow_redirects {
            Policy::default()
        } else {
            Policy::none()
        };
        let mut pipeline =
            base_client_builder(&config, source, proxy.clone(), &lookup).redirect(redirect);
        if let Some(jar) = &cookie_jar {
            pipeline = pipeline.cookie_provider(Arc::clone(jar));
        }
        let pipeline = pipeline.build().map_err(TransportError::build)?;

        let round_trip = base_client_builder(&config, source, proxy, &lookup)
            .redirect(Policy::none())
            .build()
            .map_err(TransportError::build)?;

        debug!(
            source = ?source,
            follow_redirects = config.follow_redirects,
            cookie_jar = cookie_jar.is_some(),
            "transport built"
        );

        Ok(Self {
            config,
            source,
            cookie_jar,
            lookup,
            pipeline,
            round_trip,
        })
    }
}

fn base_client_builder(
    config: &TransportConfig,
    source: Option<IpAddr>,
    proxy: Option<Proxy>,
    lookup: &RemoteLookup,
) -> ClientBuilder {
    let mut builder = Client::builder()
        .connect_timeout(config.timeout)
        .timeout(config.timeout)
        .pool_max_idle_per_host(0)
        .danger_accept_invalid_certs(true)
        .no_gzip();

    builder = match proxy {
        Some(proxy) => builder.proxy(proxy),
        None => builder.no_proxy(),
    };

    if let Some(local) = source {
        builder = builder
            .local_address(local)
            .dns_resolver(Arc::new(SourceAddressResolver {
                local,
                budget: resolve_budget(config.timeout),
                lookup: lookup.clone(),
            }));
    }

    builder
}

fn parse_proxy(proxy: &str) -> Result<Proxy, TransportError> {
    let url = Url::parse(proxy).map_err(|e| {
        warn!(proxy = %proxy, error = %e, "invalid proxy URL");
        TransportError::invalid_proxy(proxy, e)
    })?;
    if url.host_str().is_none() {
        warn!(proxy = %proxy, "proxy URL has no host");
        return Err(TransportError::invalid_proxy(proxy, "missing host"));
    }
    Proxy::all(url.as_str()).map_err(|e| TransportError::invalid_proxy(proxy, e))
}

/// Resolves the configured source address to a single local IP.
fn resolve_source_address(address: &str) -> Result<IpAddr, TransportError> {
    let ip = match address.parse::<IpAddr>() {
        Ok(ip) => ip,
        Err(_) => (address, 0)
            .to_socket_addrs()
            .map_err(|e| TransportError::source_address(address, e))?
            .next()
            .map(|addr| addr.ip())
            .ok_or_else(|| TransportError::source_address(address, "no addresses"))?,
    };
    info!(local_ip = %ip, "transport bound to source address");
    Ok(ip)
}

/// Share of the transport timeout remote resolution may use.
///
/// Strictly shorter than the connect and request timeouts, so a stalled lookup
/// fails as a resolution timeout before the outer timers fire.
fn resolve_budget(timeout: Duration) -> Duration {
    timeout / 2
}

/// Remote address resolution for source-bound transports.
///
/// Resolves under its budget and keeps only addresses of the same family as
/// the local address when any exist.
#[derive(Debug)]
struct SourceAddressResolver {
    local: IpAddr,
    budget: Duration,
    lookup: RemoteLookup,
}

impl Resolve for SourceAddressResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(resolve_remote(
            self.lookup.clone(),
            name.as_str().to_string(),
            self.local,
            self.budget,
        ))
    }
}

async fn resolve_remote(
    lookup: RemoteLookup,
    host: String,
    local: IpAddr,
    budget: Duration,
) -> Result<Addrs, BoxError> {
    let resolved = match tokio::time::timeout(budget, lookup.lookup(host.clone())).await {
        Ok(addrs) => addrs?,
        Err(_) => {
            warn!(host = %host, budget = ?budget, "remote address resolution timed out");
            return Err(Box::new(ResolveTimeout { host }));
        }
    };

    let remote = prefer_family(resolved, local);
    if let Some(first) = remote.first() {
        debug!(local_ip = %local, remote_ip = %first.ip(), host = %host, "dial pair resolved");
    }
    Ok(Box::new(remote.into_iter()))
}

fn prefer_family(addrs: Vec<SocketAddr>, local: IpAddr) -> Vec<SocketAddr> {
    let same: Vec<SocketAddr> = addrs
        .iter()
        .copied()
        .filter(|addr| addr.is_ipv4() == local.is_ipv4())
        .collect();
    if same.is_empty() { addrs } else { same }
}

/// Remote address resolution exceeded the transport timeout.
#[derive(Debug, Error)]
#[error("resolving {host} timed out")]
pub(crate) struct ResolveTimeout {
    host: String,
}

/// Returns true if `error` or anything in its source chain is a [`ResolveTimeout`].
pub(crate) fn is_resolve_timeout(error: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(err) = current {
        if err.is::<ResolveTimeout>() {
            return true;
        }
        // io::Error::source skips the wrapped error itself.
        if let Some(inner) = err.downcast_ref::<io::Error>().and_then(io::Error::get_ref)
            && is_resolve_timeout(inner)
        {
            return true;
        }
        current = err.source();
    }
    false
}
