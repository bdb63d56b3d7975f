//! Tracing subscriber setup for the binary.
//!
//! Logs go to stderr so command output on stdout stays parseable. `RUST_LOG`
//! wins when set; otherwise the level is `info`, or `debug` with
//! `--verbose` / `VERBOSE=true` (which also logs every agent step).

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Output format for log lines.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// True when `VERBOSE` is set to `true` or `1`.
pub fn verbose_from_env() -> bool {
    std::env::var("VERBOSE")
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(false)
}

fn filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "docent=debug,info"
        } else {
            "info"
        })
    })
}

/// Install the global subscriber. Later calls are ignored.
pub fn init(verbose: bool, format: LogFormat) {
    let layer = match format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(filter(verbose))
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(filter(verbose))
            .boxed(),
    };

    let _ = tracing_subscriber::registry().with(layer).try_init();
}
