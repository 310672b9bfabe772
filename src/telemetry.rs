//! Logging setup for the gherkube binary
//!
//! Plain `tracing` output on stderr so it does not interleave with the
//! scenario summary printed on stdout.
//!
//! # Example
//!
//! ```no_run
//! use gherkube::telemetry::init_logging;
//!
//! init_logging("info");
//! ```

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Initialize logging with tracing-subscriber
///
/// `RUST_LOG` wins over `default_filter`. Calling it again is a no-op.
pub fn init_logging(default_filter: &str) {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice() {
        init_logging("debug");
        init_logging("info");
    }
}
