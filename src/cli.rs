//! CLI argument definitions using clap derive macros.

use clap::Parser;

use fetcher_core::DEFAULT_TIMEOUT_SECS;

/// Fetch one URL and print the normalized response as JSON.
///
/// Transport failures never abort the fetch: they show up as sentinel
/// statuses (1000 and up) in the printed response.
#[derive(Parser, Debug)]
#[command(name = "fetcher")]
#[command(author, version, about)]
pub struct Args {
    /// URL to fetch
    pub url: String,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Connect and read deadline in seconds (1-3600)
    #[arg(short = 't', long, default_value_t = DEFAULT_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub timeout: u64,

    /// Bind outbound connections to this local IP or host name
    #[arg(long, value_name = "IP")]
    pub source_ip: Option<String>,

    /// Send every request through this upstream proxy
    #[arg(long, value_name = "URL")]
    pub proxy: Option<String>,

    /// Return redirect responses instead of following them
    #[arg(long)]
    pub no_redirect: bool,

    /// Keep cookies set during the fetch (including across redirects)
    #[arg(long)]
    pub cookie_jar: bool,

    /// Send the mobile User-Agent instead of the desktop one
    #[arg(long)]
    pub mobile: bool,

    /// Single round trip: skip the cookie jar and never follow redirects (GET only)
    #[arg(long, conflicts_with = "form")]
    pub raw: bool,

    /// Reject bodies larger than this many bytes
    #[arg(long, value_name = "BYTES")]
    pub max_body: Option<usize>,

    /// Extra request header, repeatable
    #[arg(short = 'H', long = "header", value_name = "NAME: VALUE", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Form field; any field switches the request to POST (repeatable)
    #[arg(long, value_name = "KEY=VALUE", value_parser = parse_form_field)]
    pub form: Vec<(String, String)>,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected 'Name: value', got {raw:?}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in {raw:?}"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

fn parse_form_field(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected 'key=value', got {raw:?}"))?;
    Ok((key.to_string(), value.to_string()))
}
