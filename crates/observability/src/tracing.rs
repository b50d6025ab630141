//! Subscriber initialization.
//!
//! Logs are JSON lines on stdout, filtered by `RUST_LOG` (default `info`).
//! `LOG_FORMAT=pretty` switches to human-readable output for local runs.

use tracing_subscriber::EnvFilter;

/// Output format of the fmt subscriber.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    fn from_env_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    let format = LogFormat::from_env_value(std::env::var("LOG_FORMAT").ok().as_deref());
    init_with(format);
}

pub fn init_with(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false);

    let _ = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_is_the_default_format() {
        assert_eq!(LogFormat::from_env_value(None), LogFormat::Json);
        assert_eq!(LogFormat::from_env_value(Some("json")), LogFormat::Json);
        assert_eq!(LogFormat::from_env_value(Some(" Pretty ")), LogFormat::Pretty);
    }

    #[test]
    fn repeated_init_is_harmless() {
        init_with(LogFormat::Json);
        init_with(LogFormat::Pretty);
    }
}
