//! Tracing initialization.

use std::sync::Once;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Set to emit one JSON object per event instead of compact text.
pub const JSON_LOG_ENV: &str = "RUSTDOC_SEARCH_LOG_JSON";

/// Installs the subscriber. Safe to call multiple times.
///
/// Output goes to stderr so the MCP stdio transport keeps stdout. Under a test
/// runner the level drops to DEBUG and output goes through the test writer.
pub fn init() {
    INIT.call_once(|| {
        let is_test =
            std::env::var("NEXTEST").is_ok() || std::env::var("CARGO_TARGET_TMPDIR").is_ok();
        let filter = EnvFilter::from_default_env().add_directive(
            if is_test {
                tracing::Level::DEBUG
            } else {
                tracing::Level::INFO
            }
            .into(),
        );

        let result = if is_test {
            let subscriber = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_span_events(FmtSpan::NONE)
                .compact()
                .with_test_writer()
                .finish();
            // leaked so the default outlives this closure
            std::mem::forget(subscriber.set_default());
            Ok(())
        } else if std::env::var_os(JSON_LOG_ENV).is_some() {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .json()
                .try_init()
        } else {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_target(true)
                .with_span_events(FmtSpan::NONE)
                .compact()
                .with_writer(std::io::stderr)
                .try_init()
        };
        if let Err(e) = result {
            eprintln!("rustdoc-search: failed to initialize tracing: {e}");
        }
    });
}
