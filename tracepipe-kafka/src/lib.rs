//! Decoding of span messages consumed from Kafka.
//!
//! Producers write spans to the topic in one of several wire formats, selected by [`Encoding`] in
//! the [`KafkaConsumerConfig`]. [`Encoding::decode`] turns a raw message payload into domain
//! spans, and a [`SpanProcessor`] hands the decoded spans to a [`SpanWriter`].
//!
//! # Usage
//!
//! ```
//! use tracepipe_kafka::Encoding;
//!
//! let spans = Encoding::ZipkinJsonV2.decode(b"[]").unwrap();
//! assert!(spans.is_empty());
//! ```
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

mod config;
mod decoder;
mod error;
mod processor;

pub use config::*;
pub use error::*;
pub use processor::*;
