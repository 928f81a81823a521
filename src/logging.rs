//! Process-wide log sink.
//!
//! Everything in the crate logs through `tracing`; this module installs the
//! subscriber that writes those events either to a file or to stderr.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::Result;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber.
///
/// Events go to `log_file` (created if missing, appended to) or to stderr
/// when no file is given. The filter comes from `RUST_LOG`, defaulting to
/// [`DEFAULT_FILTER`]. If a global subscriber is already installed this is
/// a no-op.
///
/// # Errors
///
/// Returns [`crate::Error::Io`] if the log file cannot be opened.
pub fn init(log_file: Option<&Path>) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(env_filter);

    let fmt_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(Mutex::new(file))
                .boxed()
        }
        None => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    // A subscriber set by the host application takes precedence.
    let _ = registry.with(fmt_layer).try_init();

    Ok(())
}

/// Write a single informational line to the log sink.
pub fn log(message: &str) {
    tracing::info!("{message}");
}
