use std::env;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use crate::{LogConfig, LogFormat};

/// All crates in this workspace, which receive the configured log level.
const CRATE_NAMES: &[&str] = &[
    "tracepipe_config",
    "tracepipe_kafka",
    "tracepipe_log",
    "tracepipe_model",
    "tracepipe_zipkin",
];

/// Builds the default filter directives used when `RUST_LOG` is not set.
///
/// Third-party crates log at INFO, while all internal crates use the configured level.
fn default_directives(config: &LogConfig) -> String {
    let level = config.level.as_str();
    let mut directives = String::from("info");
    for name in CRATE_NAMES {
        directives.push_str(&format!(",{name}={level}"));
    }
    directives
}

fn env_filter(config: &LogConfig) -> EnvFilter {
    match env::var(EnvFilter::DEFAULT_ENV) {
        Ok(value) if !value.is_empty() => EnvFilter::new(value),
        _ => EnvFilter::new(default_directives(config)),
    }
}

/// Initialize the logging system.
///
/// Calling this function more than once has no effect after the first successful call.
///
/// # Example
///
/// ```
/// let log_config = tracepipe_log::LogConfig {
///     enable_backtraces: true,
///     ..Default::default()
/// };
///
/// tracepipe_log::init(&log_config);
/// ```
pub fn init(config: &LogConfig) {
    if config.enable_backtraces {
        // SAFETY: Called during startup before any threads are spawned.
        unsafe { env::set_var("RUST_BACKTRACE", "full") };
    }

    let subscriber = tracing_subscriber::fmt::layer().with_target(true);
    let format = match (config.format, console::user_attended()) {
        (LogFormat::Auto, true) | (LogFormat::Pretty, _) => {
            subscriber.compact().without_time().boxed()
        }
        (LogFormat::Auto, false) | (LogFormat::Simplified, _) => {
            subscriber.with_ansi(false).boxed()
        }
        (LogFormat::Json, _) => subscriber
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(format.with_filter(env_filter(config)))
        .try_init()
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LogLevel;

    #[test]
    fn test_default_directives() {
        let config = LogConfig {
            level: LogLevel::Debug,
            ..Default::default()
        };

        let directives = default_directives(&config);
        assert!(directives.starts_with("info,"));
        assert!(directives.contains("tracepipe_kafka=debug"));
        assert!(directives.contains("tracepipe_zipkin=debug"));
    }
}
