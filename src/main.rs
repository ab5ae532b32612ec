//! CLI entry point for the fetcher tool.

use anyhow::{Context, Result};
use clap::Parser;
use fetcher_core::{
    Fetcher, GetMode, RequestOptions, Transport, TransportConfig, UserAgent,
};
use tracing::{debug, info};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // Logs go to stderr; stdout carries only the JSON response.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let transport = build_transport(&args)?;
    let fetcher = Fetcher::new(transport);

    let mut options = RequestOptions::new().user_agent(UserAgent::from(args.mobile));
    for (name, value) in &args.headers {
        options = options.header(name, value);
    }

    let response = if args.form.is_empty() {
        fetcher
            .get(&args.url, &options, GetMode::from(args.raw))
            .await
    } else {
        fetcher.post(&args.url, &args.form, &options).await
    };

    info!(
        status = %response.status,
        body_len = response.body.len(),
        cookies = response.cookies.len(),
        "Fetch complete"
    );

    let json = serde_json::to_string_pretty(&response).context("failed to serialize response")?;
    println!("{json}");

    Ok(())
}

fn build_transport(args: &Args) -> Result<Transport> {
    let mut config = TransportConfig::new(args.timeout);
    if let Some(source_ip) = &args.source_ip {
        config = config.source_address(source_ip);
    }
    if let Some(proxy) = &args.proxy {
        config = config.proxy(proxy);
    }
    if args.no_redirect {
        config = config.no_redirect();
    }
    if let Some(limit) = args.max_body {
        config = config.max_body_bytes(limit);
    }

    let mut transport = Transport::build(config).context("invalid transport configuration")?;
    if args.cookie_jar {
        transport = transport
            .with_cookie_jar()
            .context("failed to attach cookie jar")?;
    }
    Ok(transport)
}
