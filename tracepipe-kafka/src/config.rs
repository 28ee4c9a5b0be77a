//! Configuration of the span consumer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kafka consumer configuration errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// No broker address was configured.
    #[error("at least one kafka broker is required")]
    NoBrokers,
    /// The topic name is empty.
    #[error("kafka topic must not be empty")]
    EmptyTopic,
    /// The consumer group id is empty.
    #[error("kafka consumer group id must not be empty")]
    EmptyGroupId,
    /// Messages could never be processed.
    #[error("parallelism must be greater than zero")]
    ZeroParallelism,
}

/// Wire format of the messages on the consumed topic.
///
/// Each variant selects one decoding strategy, see [`Encoding::decode`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Encoding {
    /// A binary protobuf `jaeger.api_v2.Span`.
    #[default]
    Protobuf,
    /// The canonical JSON mapping of a `jaeger.api_v2.Span`.
    Json,
    /// A Thrift binary protocol list of Zipkin v1 spans.
    ZipkinThrift,
    /// A JSON array of Zipkin v2 spans.
    ZipkinJsonV2,
}

impl Encoding {
    /// All supported encodings.
    pub const ALL: [Self; 4] = [
        Self::Protobuf,
        Self::Json,
        Self::ZipkinThrift,
        Self::ZipkinJsonV2,
    ];

    /// Returns the configuration name of the encoding.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Protobuf => "protobuf",
            Self::Json => "json",
            Self::ZipkinThrift => "zipkin-thrift",
            Self::ZipkinJsonV2 => "zipkin-json-v2",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing an [`Encoding`] from its name.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown encoding {0:?}, expected one of protobuf, json, zipkin-thrift, zipkin-json-v2")]
pub struct ParseEncodingError(String);

impl FromStr for Encoding {
    type Err = ParseEncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|encoding| encoding.as_str() == s)
            .ok_or_else(|| ParseEncodingError(s.to_owned()))
    }
}

/// Configuration of the consumer reading spans from Kafka.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KafkaConsumerConfig {
    /// Bootstrap broker addresses.
    pub brokers: Vec<String>,
    /// Topic to consume spans from.
    pub topic: String,
    /// Consumer group id.
    pub group_id: String,
    /// Client id reported to the brokers.
    pub client_id: String,
    /// Wire format of the messages on the topic.
    pub encoding: Encoding,
    /// Maximum number of messages processed concurrently.
    pub parallelism: usize,
}

impl KafkaConsumerConfig {
    /// Checks that the configuration can be used to start a consumer.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.brokers.iter().all(|broker| broker.trim().is_empty()) {
            return Err(ConfigError::NoBrokers);
        }
        if self.topic.is_empty() {
            return Err(ConfigError::EmptyTopic);
        }
        if self.group_id.is_empty() {
            return Err(ConfigError::EmptyGroupId);
        }
        if self.parallelism == 0 {
            return Err(ConfigError::ZeroParallelism);
        }
        Ok(())
    }
}

impl Default for KafkaConsumerConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["127.0.0.1:9092".to_owned()],
            topic: "jaeger-spans".to_owned(),
            group_id: "jaeger-ingester".to_owned(),
            client_id: "jaeger-ingester".to_owned(),
            encoding: Encoding::default(),
            parallelism: 1000,
        }
    }
}
