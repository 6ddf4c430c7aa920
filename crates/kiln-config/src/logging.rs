//! Structured logging utilities for Kiln components.
//!
//! Provides consistent logging with component prefixes and structured fields.
//!
//! # Usage
//!
//! ```ignore
//! use kiln_config::{log_migrate_debug, log_rebuild_info};
//!
//! log_migrate_debug!("Using cached upgraded payload", version = 3465);
//! log_rebuild_info!("Rebuild finished", items = 1024_u64);
//! ```

/// Component identifiers for log filtering
pub struct Component;

impl Component {
    pub const MIGRATE: &'static str = "MIGRATE";
    pub const LISTING: &'static str = "LISTING";
    pub const REBUILD: &'static str = "REBUILD";
    pub const CLI: &'static str = "CLI";
}

/// Log levels for runtime configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Map a `-v` count to a level (0 = warn).
    pub fn from_verbosity(count: u8) -> Self {
        match count {
            0 => LogLevel::Warn,
            1 => LogLevel::Info,
            2 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

// === MIGRATE logging macros ===

#[macro_export]
macro_rules! log_migrate_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "MIGRATE", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_migrate_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "MIGRATE", $($key = $value,)* $msg)
    };
}

// === LISTING logging macros ===

#[macro_export]
macro_rules! log_listing_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "LISTING", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_listing_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "LISTING", $($key = $value,)* $msg)
    };
}

// === REBUILD logging macros ===

#[macro_export]
macro_rules! log_rebuild_error {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::error!(component = "REBUILD", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_rebuild_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "REBUILD", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_rebuild_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "REBUILD", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_rebuild_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "REBUILD", $($key = $value,)* $msg)
    };
}

/// Initialize logging with the given level filter.
/// Call this once at application startup.
pub fn init_logging(level: LogLevel) {
    use tracing_subscriber::EnvFilter;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter()));

    // A host may already have installed a subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_constants() {
        assert_eq!(Component::MIGRATE, "MIGRATE");
        assert_eq!(Component::LISTING, "LISTING");
        assert_eq!(Component::REBUILD, "REBUILD");
    }

    #[test]
    fn test_verbosity_mapping() {
        assert_eq!(LogLevel::from_verbosity(0), LogLevel::Warn);
        assert_eq!(LogLevel::from_verbosity(2), LogLevel::Debug);
        assert_eq!(LogLevel::from_verbosity(9), LogLevel::Trace);
    }

    #[test]
    fn test_macros_expand() {
        log_migrate_debug!("migrate", version = 3_u32);
        log_listing_warn!("listing", namespace = "ns");
        log_rebuild_info!("rebuild", items = 1_u64, cancelled = false);
    }
}
