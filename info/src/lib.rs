//! Build identity, reported by the logger and the health check.

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const REVISION: Option<&str> = option_env!("MEETLY_REVISION");

pub const BUILD_TIMESTAMP: Option<&str> = option_env!("MEETLY_BUILD_TIMESTAMP");
