//! Log output setup.
//!
//! Builds a [`Dispatch`] from [`LoggingConfig`] instead of installing a
//! process-global subscriber. The CLI attaches it to the command future with
//! [`tracing::instrument::WithSubscriber`], and the extractor carries it into
//! its blocking workers.
//!
//! Output always goes to stderr so stdout stays parseable. `RUST_LOG`, when
//! set, takes precedence over `logging.level`.
//!
//! ## Fields
//!
//! | Field | Meaning |
//! |-------|---------|
//! | `run_id` | UUID of one pipeline run (on the `run` span) |
//! | `stage` | `locate`, `fetch`, `extract`, `enrich`, `persist` |
//! | `file_id` | External attachment id |

use anyhow::{anyhow, Result};
use tracing::Dispatch;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

pub fn build_dispatch(config: &LoggingConfig) -> Result<Dispatch> {
    dispatch_with_writer(config, std::io::stderr, true)
}

fn dispatch_with_writer<W>(config: &LoggingConfig, writer: W, ansi: bool) -> Result<Dispatch>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| anyhow!("Invalid logging.level '{}': {}", config.level, e))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(false);

    let dispatch = match config.format.as_str() {
        "json" => Dispatch::new(builder.json().finish()),
        _ => Dispatch::new(builder.pretty().finish()),
    };
    Ok(dispatch)
}

/// Dispatch used before the configuration has been read.
pub fn fallback_dispatch() -> Dispatch {
    build_dispatch(&LoggingConfig::default())
        .unwrap_or_else(|_| Dispatch::new(tracing_subscriber::fmt().with_writer(std::io::stderr).finish()))
}
