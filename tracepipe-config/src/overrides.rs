//! Overrides of the configuration file from environment variables.

use std::env;

/// Environment variable overriding the comma-separated list of Kafka brokers.
pub const BROKERS_VAR: &str = "TRACEPIPE_KAFKA_BROKERS";
/// Environment variable overriding the consumed topic.
pub const TOPIC_VAR: &str = "TRACEPIPE_KAFKA_TOPIC";
/// Environment variable overriding the consumer group id.
pub const GROUP_ID_VAR: &str = "TRACEPIPE_KAFKA_GROUP_ID";
/// Environment variable overriding the message encoding.
pub const ENCODING_VAR: &str = "TRACEPIPE_KAFKA_ENCODING";
/// Environment variable overriding the log level.
pub const LOG_LEVEL_VAR: &str = "TRACEPIPE_LOG_LEVEL";

/// Raw configuration values that take precedence over the configuration file.
///
/// Values are kept as strings and only parsed in [`Config::apply_override`], so that errors can
/// name the offending field.
///
/// [`Config::apply_override`]: crate::Config::apply_override
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OverridableConfig {
    /// Comma-separated broker addresses.
    pub brokers: Option<String>,
    /// The topic to consume spans from.
    pub topic: Option<String>,
    /// The consumer group id.
    pub group_id: Option<String>,
    /// The name of the message encoding, such as `zipkin-thrift`.
    pub encoding: Option<String>,
    /// The name of the log level, such as `debug`.
    pub log_level: Option<String>,
}

impl OverridableConfig {
    /// Collects overrides from the environment of the current process.
    pub fn from_env() -> Self {
        Self::from_vars(env::vars())
    }

    /// Collects overrides from the given environment variables.
    ///
    /// Variables that do not configure the ingester are ignored.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut overrides = Self::default();

        for (key, value) in vars {
            let slot = match key.as_ref() {
                BROKERS_VAR => &mut overrides.brokers,
                TOPIC_VAR => &mut overrides.topic,
                GROUP_ID_VAR => &mut overrides.group_id,
                ENCODING_VAR => &mut overrides.encoding,
                LOG_LEVEL_VAR => &mut overrides.log_level,
                _ => continue,
            };
            *slot = Some(value.into());
        }

        overrides
    }

    /// Returns `true` if no value is overridden.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vars() {
        let overrides = OverridableConfig::from_vars([
            ("PATH", "/usr/bin"),
            ("TRACEPIPE_KAFKA_BROKERS", "kafka-1:9092,kafka-2:9092"),
            ("TRACEPIPE_KAFKA_ENCODING", "zipkin-thrift"),
        ]);

        assert_eq!(
            overrides,
            OverridableConfig {
                brokers: Some("kafka-1:9092,kafka-2:9092".to_owned()),
                encoding: Some("zipkin-thrift".to_owned()),
                ..Default::default()
            }
        );
        assert!(!overrides.is_empty());
    }

    #[test]
    fn test_no_vars() {
        let overrides = OverridableConfig::from_vars([("HOME", "/root")]);
        assert!(overrides.is_empty());
    }
}
