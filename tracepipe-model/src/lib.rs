//! The domain span model that every wire format decodes into.
//!
//! [`Span`] and its nested messages follow the `jaeger.api_v2` protobuf schema. They encode and
//! decode with [`prost`], and implement `serde` with the canonical proto3 JSON mapping (see
//! [`json`]). Typed identifiers are available through [`TraceId`] and [`SpanId`].

mod ids;
mod macros;
mod span;

pub mod json;

pub use self::ids::*;
pub use self::span::*;

pub use prost_types::{Duration, Timestamp};
