//! Codecs for the legacy Zipkin span formats and their conversion into domain spans.
//!
//! Two wire formats are supported:
//!
//!  - A Thrift binary protocol list of Zipkin v1 spans, see [`deserialize_thrift`].
//!  - A JSON array of Zipkin v2 spans, see [`v2::Span`]. These are first translated into the v1
//!    model with [`spans_v2_to_thrift`].
//!
//! Both end up as [`thrift::Span`] values, which [`to_domain_span`] turns into
//! [`tracepipe_model::Span`]s.

#![warn(missing_docs)]

mod error;
mod to_domain;
mod v2_to_thrift;

pub mod thrift;
pub mod v2;

pub use self::error::*;
pub use self::thrift::{deserialize_thrift, serialize_thrift};
pub use self::to_domain::to_domain_span;
pub use self::v2_to_thrift::{span_v2_to_thrift, spans_v2_to_thrift};
