use std::string::FromUtf8Error;

use thiserror::Error;
use tracepipe_model::{IdError, SpanId, TraceId};

/// An error reading the Thrift binary protocol.
#[derive(Debug, Error)]
pub enum ThriftError {
    /// The input ended in the middle of a value.
    #[error("unexpected end of input")]
    UnexpectedEof,
    /// A container or string declared a negative size.
    #[error("negative size {0}")]
    NegativeSize(i32),
    /// A type id that the binary protocol does not define.
    #[error("invalid field type {0}")]
    InvalidFieldType(u8),
    /// A container holds elements of a different type than the schema declares.
    #[error("expected elements of type {expected}, found {found}")]
    UnexpectedType {
        /// The type id declared by the schema.
        expected: u8,
        /// The type id found in the input.
        found: u8,
    },
    /// A string field does not hold valid UTF-8.
    #[error("invalid utf-8 string")]
    InvalidUtf8(#[from] FromUtf8Error),
    /// Structs are nested deeper than the reader allows.
    #[error("struct nesting exceeds depth limit")]
    DepthLimit,
    /// An enum field holds a value outside of its declared range.
    #[error("invalid value {value} for enum {name}")]
    InvalidEnumValue {
        /// Name of the enum type.
        name: &'static str,
        /// The numeric value read from the input.
        value: i32,
    },
    /// The payload is a list without any spans.
    #[error("no spans in thrift list")]
    EmptyList,
}

/// An error converting Zipkin spans into another representation.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// The span id is not a valid hex identifier.
    #[error("invalid span id {value:?}")]
    InvalidSpanId {
        /// The offending value.
        value: String,
        /// The parse error.
        source: IdError,
    },
    /// The trace id is not a valid hex identifier.
    #[error("invalid trace id {value:?}")]
    InvalidTraceId {
        /// The offending value.
        value: String,
        /// The parse error.
        source: IdError,
    },
    /// The parent id is not a valid hex identifier.
    #[error("invalid parent id {value:?}")]
    InvalidParentId {
        /// The offending value.
        value: String,
        /// The parse error.
        source: IdError,
    },
    /// An endpoint carries an unparseable IPv4 address.
    #[error("invalid ipv4 address {0:?}")]
    InvalidIpv4(String),
    /// An endpoint carries an unparseable IPv6 address.
    #[error("invalid ipv6 address {0:?}")]
    InvalidIpv6(String),
    /// None of the span's annotations name the emitting service.
    #[error("cannot find service name in Zipkin span [traceID={trace_id}, spanID={span_id}]")]
    MissingServiceName {
        /// Trace id of the span.
        trace_id: TraceId,
        /// Id of the span.
        span_id: SpanId,
    },
}
