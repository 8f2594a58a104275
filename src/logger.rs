//! Logging initialization and error formatting.
//!
//! The crate logs through `tracing` macros only. Nothing is printed until the
//! application installs a subscriber, usually with [`init`] at the very start
//! of `main`:
//!
//! ```rust,no_run
//! minihttpd::logger::init("info").unwrap();
//! ```
//!
//! The level is controlled by the `RUST_LOG` environment variable when set;
//! the argument of [`init`] is only the fallback:
//!
//! ```bash
//! # Per-request debug logs, including errors swallowed by LogError
//! RUST_LOG=minihttpd=debug cargo run --example tasks
//! ```

use std::error::Error as StdError;
use std::fmt::Write as _;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::Error;

/// Installs a formatted stdout subscriber filtered by `RUST_LOG`, falling back
/// to `default_directive` (e.g. `"info"` or `"minihttpd=debug"`).
///
/// Fails if a global subscriber is already installed.
pub fn init(default_directive: &str) -> Result<(), Error> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(Error::internal)
}

/// Renders an error with its whole `source()` chain, one cause per line:
///
/// ```text
/// io error
/// Caused by: permission denied
/// ```
pub fn format_error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let _ = write!(out, "\nCaused by: {cause}");
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("loading tasks failed")]
    struct LoadTasks(#[source] io::Error);

    #[test]
    fn chain_lists_every_cause() {
        let err = Error::internal(LoadTasks(io::Error::other("disk on fire")));
        let text = format_error_chain(&err);
        assert_eq!(text, "loading tasks failed\nCaused by: disk on fire");
    }

    #[test]
    fn io_errors_name_their_cause_once() {
        let err = Error::from(io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"));
        assert_eq!(format_error_chain(&err), "io error\nCaused by: permission denied");
    }

    #[test]
    fn single_error_has_no_cause_line() {
        let err = Error::config("no renderer");
        assert_eq!(format_error_chain(&err), "configuration: no renderer");
    }
}
