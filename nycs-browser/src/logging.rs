//! Tracing setup for the binary
//!
//! The subscriber is installed before configuration is read, so config
//! loading can already log. `RUST_LOG` wins when set; otherwise the
//! configured level replaces the startup filter once it is known.

use nycs_common::{Error, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

/// Filter in effect until the configured level is applied
pub const STARTUP_FILTER: &str = "info";

/// Handle for swapping the active filter after startup
pub struct LogHandle {
    handle: reload::Handle<EnvFilter, Registry>,
    from_env: bool,
}

impl LogHandle {
    /// Switch to the configured `level`
    ///
    /// Returns `false` without changing anything when `RUST_LOG` is set.
    pub fn apply_level(&self, level: &str) -> Result<bool> {
        if self.from_env {
            return Ok(false);
        }

        let filter = EnvFilter::try_new(level)
            .map_err(|e| Error::Config(format!("Invalid log level '{}': {}", level, e)))?;
        self.handle
            .reload(filter)
            .map_err(|e| Error::Config(format!("Failed to apply log level: {}", e)))?;
        Ok(true)
    }
}

fn filter_layer(env: Option<String>) -> (reload::Layer<EnvFilter, Registry>, LogHandle) {
    let from_env = env.as_deref().and_then(|value| EnvFilter::try_new(value).ok());
    let is_env = from_env.is_some();
    let filter = from_env.unwrap_or_else(|| EnvFilter::new(STARTUP_FILTER));

    let (layer, handle) = reload::Layer::new(filter);
    (
        layer,
        LogHandle {
            handle,
            from_env: is_env,
        },
    )
}

/// Install the global subscriber, writing to stderr
pub fn init() -> LogHandle {
    let (filter, logs) = filter_layer(std::env::var(EnvFilter::DEFAULT_ENV).ok());

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    logs
}
