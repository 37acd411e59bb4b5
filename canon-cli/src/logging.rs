//! Logging setup for the `canon` binary.
//!
//! # Environment Variables
//!
//! - `CANON_LOG_LEVEL=trace|debug|info|warn|error` - Set the log level (default: warn)
//! - `CANON_LOG_FORMAT=pretty|compact|json` - Set the output format (default: compact)
//!
//! Logs go to stderr so that command output on stdout stays machine-readable.

use std::env;

use tracing_subscriber::EnvFilter;

/// Log level environment variable
pub const LOG_LEVEL_ENV: &str = "CANON_LOG_LEVEL";

/// Log format environment variable
pub const LOG_FORMAT_ENV: &str = "CANON_LOG_FORMAT";

/// Get the configured log level from `CANON_LOG_LEVEL`.
pub fn get_log_level() -> &'static str {
    parse_level(env::var(LOG_LEVEL_ENV).ok().as_deref())
}

/// Get the configured log format from `CANON_LOG_FORMAT`.
pub fn get_log_format() -> &'static str {
    parse_format(env::var(LOG_FORMAT_ENV).ok().as_deref())
}

fn parse_level(value: Option<&str>) -> &'static str {
    match value.map(str::to_lowercase).as_deref() {
        Some("trace") => "trace",
        Some("debug") => "debug",
        Some("info") => "info",
        Some("error") => "error",
        _ => "warn",
    }
}

fn parse_format(value: Option<&str>) -> &'static str {
    match value.map(str::to_lowercase).as_deref() {
        Some("pretty") => "pretty",
        Some("json") => "json",
        _ => "compact",
    }
}

/// Install the global subscriber. Subsequent calls are no-ops.
pub fn init() {
    let level = get_log_level();
    let filter = EnvFilter::try_new(format!(
        "canon={},canon_cli={},canon_registry={},canon_migrate={}",
        level, level, level, level
    ))
    .unwrap_or_else(|_| EnvFilter::new("warn"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = match get_log_format() {
        "json" => builder.json().try_init(),
        "pretty" => builder.pretty().try_init(),
        _ => builder.compact().try_init(),
    };

    if installed.is_ok() {
        tracing::debug!(level = level, format = get_log_format(), "Canon logging initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level(None), "warn");
        assert_eq!(parse_level(Some("DEBUG")), "debug");
        assert_eq!(parse_level(Some("verbose")), "warn");
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(parse_format(None), "compact");
        assert_eq!(parse_format(Some("json")), "json");
        assert_eq!(parse_format(Some("Pretty")), "pretty");
    }
}
