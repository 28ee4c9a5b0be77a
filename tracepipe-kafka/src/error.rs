use std::fmt;

use serde_json::error::Category;
use thiserror::Error;
use tracepipe_zipkin::{ConversionError, ThriftError};

/// Broad classification of a [`DecodeError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DecodeErrorKind {
    /// The payload does not parse under the grammar of its format.
    MalformedInput,
    /// The payload parses, but its fields do not fit the target schema.
    SchemaMismatch,
    /// An intermediate record parsed but cannot be mapped to a domain span.
    ConversionFailure,
}

impl DecodeErrorKind {
    /// Returns the name of the kind for use in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MalformedInput => "malformed_input",
            Self::SchemaMismatch => "schema_mismatch",
            Self::ConversionFailure => "conversion_failure",
        }
    }
}

impl fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error decoding a message payload.
///
/// Every variant is transparent: its message and source are exactly the ones of the codec or
/// converter that failed.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The protobuf decoder rejected the payload.
    #[error(transparent)]
    Protobuf(#[from] prost::DecodeError),
    /// The JSON parser rejected the payload.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// The Thrift deserializer rejected the payload.
    #[error(transparent)]
    Thrift(#[from] ThriftError),
    /// A legacy record could not be converted into domain spans.
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

impl DecodeError {
    /// Classifies the error.
    pub fn kind(&self) -> DecodeErrorKind {
        match self {
            Self::Protobuf(_) => DecodeErrorKind::MalformedInput,
            Self::Json(error) => match error.classify() {
                Category::Data => DecodeErrorKind::SchemaMismatch,
                Category::Io | Category::Syntax | Category::Eof => DecodeErrorKind::MalformedInput,
            },
            Self::Thrift(
                ThriftError::UnexpectedType { .. }
                | ThriftError::InvalidUtf8(_)
                | ThriftError::InvalidEnumValue { .. },
            ) => DecodeErrorKind::SchemaMismatch,
            Self::Thrift(_) => DecodeErrorKind::MalformedInput,
            Self::Conversion(_) => DecodeErrorKind::ConversionFailure,
        }
    }
}
