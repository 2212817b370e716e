//! Tracing setup for the `codewarden` binary.
//!
//! The filter is picked in this order: a valid, non-empty `RUST_LOG`, then
//! `--log-level`, then `[general] log_level`. `main` folds the flag into the
//! config before calling [`init_tracing`], so this module only sees the
//! config value and the environment.
//!
//! Everything is written to stderr. Stdout carries only the rendered report,
//! which keeps `--output json` parseable even at `debug` level.

use anyhow::{Result, anyhow, bail};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use codewarden_core::config::GeneralConfig;

/// Install the global subscriber for this process.
///
/// `log_format` selects `"json"` lines or the `"pretty"` multi-line layout;
/// anything else is rejected before a subscriber is installed.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let output = match config.log_format.as_str() {
        "json" => fmt::layer().json().with_writer(std::io::stderr).boxed(),
        "pretty" => fmt::layer().pretty().with_writer(std::io::stderr).boxed(),
        other => bail!("unknown log format '{other}', expected 'json' or 'pretty'"),
    };

    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::registry()
        .with(select_filter(rust_log.as_deref(), &config.log_level))
        .with(output)
        .try_init()
        .map_err(|e| anyhow!("failed to initialize tracing subscriber: {e}"))
}

/// `RUST_LOG` wins when it parses; a blank or malformed value falls back to `level`.
fn select_filter(rust_log: Option<&str>, level: &str) -> EnvFilter {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(level))
}
