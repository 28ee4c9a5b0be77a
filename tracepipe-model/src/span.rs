//! Protobuf messages of the domain span schema (`jaeger.api_v2`).
//!
//! The message structs are laid out the way `prost-build` would emit them, with additional serde
//! attributes that implement the canonical JSON mapping. Every field accepts both its
//! lowerCamelCase JSON name and the original field name as declared in the schema.

use prost_types::{Duration, Timestamp};
use serde::{Deserialize, Serialize};

use crate::ids::{IdError, SpanId, TraceId};
use crate::json::{self, JsonEnum};

/// Tag key carrying the span kind.
pub const SPAN_KIND_KEY: &str = "span.kind";

/// Type of the value held by a [`KeyValue`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ValueType {
    String = 0,
    Bool = 1,
    Int64 = 2,
    Float64 = 3,
    Binary = 4,
}

impl ValueType {
    /// String value of the enum field names used in the protobuf definition.
    pub fn as_str_name(&self) -> &'static str {
        match self {
            ValueType::String => "STRING",
            ValueType::Bool => "BOOL",
            ValueType::Int64 => "INT64",
            ValueType::Float64 => "FLOAT64",
            ValueType::Binary => "BINARY",
        }
    }

    /// Creates an enum from field names used in the protobuf definition.
    pub fn from_str_name(value: &str) -> Option<Self> {
        match value {
            "STRING" => Some(Self::String),
            "BOOL" => Some(Self::Bool),
            "INT64" => Some(Self::Int64),
            "FLOAT64" => Some(Self::Float64),
            "BINARY" => Some(Self::Binary),
            _ => None,
        }
    }
}

impl JsonEnum for ValueType {
    fn json_name(value: i32) -> Option<&'static str> {
        Self::try_from(value).ok().map(|v| v.as_str_name())
    }

    fn from_json_name(name: &str) -> Option<i32> {
        Self::from_str_name(name).map(i32::from)
    }
}

/// Relationship between two spans.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum SpanRefType {
    ChildOf = 0,
    FollowsFrom = 1,
}

impl SpanRefType {
    /// String value of the enum field names used in the protobuf definition.
    pub fn as_str_name(&self) -> &'static str {
        match self {
            SpanRefType::ChildOf => "CHILD_OF",
            SpanRefType::FollowsFrom => "FOLLOWS_FROM",
        }
    }

    /// Creates an enum from field names used in the protobuf definition.
    pub fn from_str_name(value: &str) -> Option<Self> {
        match value {
            "CHILD_OF" => Some(Self::ChildOf),
            "FOLLOWS_FROM" => Some(Self::FollowsFrom),
            _ => None,
        }
    }
}

impl JsonEnum for SpanRefType {
    fn json_name(value: i32) -> Option<&'static str> {
        Self::try_from(value).ok().map(|v| v.as_str_name())
    }

    fn from_json_name(name: &str) -> Option<i32> {
        Self::from_str_name(name).map(i32::from)
    }
}

/// A typed tag or log field.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct KeyValue {
    #[prost(string, tag = "1")]
    #[serde(deserialize_with = "json::nullable")]
    pub key: String,
    #[prost(enumeration = "ValueType", tag = "2")]
    #[serde(
        with = "json::value_type",
        alias = "v_type",
        skip_serializing_if = "is_zero_i32"
    )]
    pub v_type: i32,
    #[prost(string, tag = "3")]
    #[serde(
        alias = "v_str",
        deserialize_with = "json::nullable",
        skip_serializing_if = "String::is_empty"
    )]
    pub v_str: String,
    #[prost(bool, tag = "4")]
    #[serde(
        alias = "v_bool",
        deserialize_with = "json::nullable",
        skip_serializing_if = "is_false"
    )]
    pub v_bool: bool,
    #[prost(int64, tag = "5")]
    #[serde(with = "json::int64", alias = "v_int64", skip_serializing_if = "is_zero_i64")]
    pub v_int64: i64,
    #[prost(double, tag = "6")]
    #[serde(
        with = "json::float64",
        alias = "v_float64",
        skip_serializing_if = "is_zero_f64"
    )]
    pub v_float64: f64,
    #[prost(bytes = "vec", tag = "7")]
    #[serde(with = "json::base64", alias = "v_binary", skip_serializing_if = "Vec::is_empty")]
    pub v_binary: Vec<u8>,
}

impl KeyValue {
    /// Creates a string-typed key value.
    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            v_type: ValueType::String.into(),
            v_str: value.into(),
            ..Default::default()
        }
    }

    /// Creates a bool-typed key value.
    pub fn bool(key: impl Into<String>, value: bool) -> Self {
        Self {
            key: key.into(),
            v_type: ValueType::Bool.into(),
            v_bool: value,
            ..Default::default()
        }
    }

    /// Creates an int64-typed key value.
    pub fn int64(key: impl Into<String>, value: i64) -> Self {
        Self {
            key: key.into(),
            v_type: ValueType::Int64.into(),
            v_int64: value,
            ..Default::default()
        }
    }

    /// Creates a float64-typed key value.
    pub fn float64(key: impl Into<String>, value: f64) -> Self {
        Self {
            key: key.into(),
            v_type: ValueType::Float64.into(),
            v_float64: value,
            ..Default::default()
        }
    }

    /// Creates a binary-typed key value.
    pub fn binary(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            v_type: ValueType::Binary.into(),
            v_binary: value.into(),
            ..Default::default()
        }
    }

    /// Returns the string value if this key value is string-typed.
    pub fn as_str(&self) -> Option<&str> {
        (self.v_type() == ValueType::String).then_some(self.v_str.as_str())
    }
}

/// A timestamped event attached to a span.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct Log {
    #[prost(message, optional, tag = "1")]
    #[serde(with = "json::timestamp", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    #[prost(message, repeated, tag = "2")]
    #[serde(deserialize_with = "json::nullable")]
    pub fields: Vec<KeyValue>,
}

/// A reference from one span to another.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct SpanRef {
    #[prost(bytes = "vec", tag = "1")]
    #[serde(with = "json::base64", alias = "trace_id")]
    pub trace_id: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    #[serde(with = "json::base64", alias = "span_id")]
    pub span_id: Vec<u8>,
    #[prost(enumeration = "SpanRefType", tag = "3")]
    #[serde(with = "json::span_ref_type", alias = "ref_type")]
    pub ref_type: i32,
}

impl SpanRef {
    /// Creates a `CHILD_OF` reference to the given parent.
    pub fn child_of(trace_id: TraceId, span_id: SpanId) -> Self {
        Self {
            trace_id: trace_id.to_bytes().to_vec(),
            span_id: span_id.to_bytes().to_vec(),
            ref_type: SpanRefType::ChildOf.into(),
        }
    }
}

/// The service emitting a span.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct Process {
    #[prost(string, tag = "1")]
    #[serde(alias = "service_name", deserialize_with = "json::nullable")]
    pub service_name: String,
    #[prost(message, repeated, tag = "2")]
    #[serde(deserialize_with = "json::nullable", skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<KeyValue>,
}

impl Process {
    /// Creates a process for the given service.
    pub fn new(service_name: impl Into<String>, tags: Vec<KeyValue>) -> Self {
        Self {
            service_name: service_name.into(),
            tags,
        }
    }
}

/// The canonical span representation all wire formats converge to.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct Span {
    #[prost(bytes = "vec", tag = "1")]
    #[serde(with = "json::base64", alias = "trace_id")]
    pub trace_id: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    #[serde(with = "json::base64", alias = "span_id")]
    pub span_id: Vec<u8>,
    #[prost(string, tag = "3")]
    #[serde(alias = "operation_name", deserialize_with = "json::nullable")]
    pub operation_name: String,
    #[prost(message, repeated, tag = "4")]
    #[serde(deserialize_with = "json::nullable", skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<SpanRef>,
    #[prost(uint32, tag = "5")]
    #[serde(with = "json::uint32", skip_serializing_if = "is_zero_u32")]
    pub flags: u32,
    #[prost(message, optional, tag = "6")]
    #[serde(
        with = "json::timestamp",
        alias = "start_time",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_time: Option<Timestamp>,
    #[prost(message, optional, tag = "7")]
    #[serde(with = "json::duration", skip_serializing_if = "Option::is_none")]
    pub duration: Option<Duration>,
    #[prost(message, repeated, tag = "8")]
    #[serde(deserialize_with = "json::nullable", skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<KeyValue>,
    #[prost(message, repeated, tag = "9")]
    #[serde(deserialize_with = "json::nullable", skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<Log>,
    #[prost(message, optional, tag = "10")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process: Option<Process>,
    #[prost(string, tag = "11")]
    #[serde(
        alias = "process_id",
        deserialize_with = "json::nullable",
        skip_serializing_if = "String::is_empty"
    )]
    pub process_id: String,
    #[prost(string, repeated, tag = "12")]
    #[serde(deserialize_with = "json::nullable", skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl Span {
    /// Decodes the binary trace id.
    pub fn trace_id(&self) -> Result<TraceId, IdError> {
        TraceId::from_bytes(&self.trace_id)
    }

    /// Decodes the binary span id.
    pub fn span_id(&self) -> Result<SpanId, IdError> {
        SpanId::from_bytes(&self.span_id)
    }

    /// Returns the id of the first `CHILD_OF` reference, if any.
    pub fn parent_span_id(&self) -> Option<SpanId> {
        self.references
            .iter()
            .find(|r| r.ref_type() == SpanRefType::ChildOf)
            .and_then(|r| SpanId::from_bytes(&r.span_id).ok())
    }

    /// Returns the span's flags.
    pub fn flags(&self) -> Flags {
        Flags(self.flags)
    }

    /// Returns the first tag with the given key.
    pub fn tag(&self, key: &str) -> Option<&KeyValue> {
        self.tags.iter().find(|tag| tag.key == key)
    }

    /// Returns `true` if the span is tagged as the client side of an RPC.
    pub fn is_rpc_client(&self) -> bool {
        self.tag(SPAN_KIND_KEY).and_then(KeyValue::as_str) == Some("client")
    }
}

/// Bit flags carried by a [`Span`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Flags(pub u32);

impl Flags {
    /// The span was sampled.
    pub const SAMPLED: u32 = 1;
    /// The span was force-sampled for debugging.
    pub const DEBUG: u32 = 2;
    /// The span should bypass indexing.
    pub const FIREHOSE: u32 = 8;

    /// Marks the span as debug.
    pub fn set_debug(&mut self) {
        self.0 |= Self::DEBUG;
    }

    /// Returns `true` if the sampled bit is set.
    pub fn is_sampled(self) -> bool {
        self.0 & Self::SAMPLED != 0
    }

    /// Returns `true` if the debug bit is set.
    pub fn is_debug(self) -> bool {
        self.0 & Self::DEBUG != 0
    }
}

impl From<Flags> for u32 {
    fn from(flags: Flags) -> Self {
        flags.0
    }
}

/// Converts microseconds since the Unix epoch into a timestamp.
pub fn epoch_micros_to_timestamp(micros: i64) -> Timestamp {
    Timestamp {
        seconds: micros.div_euclid(1_000_000),
        nanos: (micros.rem_euclid(1_000_000) * 1_000) as i32,
    }
}

/// Converts a number of microseconds into a duration.
pub fn micros_to_duration(micros: i64) -> Duration {
    Duration {
        seconds: micros / 1_000_000,
        nanos: ((micros % 1_000_000) * 1_000) as i32,
    }
}

fn is_zero_i32(value: &i32) -> bool {
    *value == 0
}

fn is_zero_i64(value: &i64) -> bool {
    *value == 0
}

fn is_zero_u32(value: &u32) -> bool {
    *value == 0
}

fn is_zero_f64(value: &f64) -> bool {
    *value == 0.0
}

fn is_false(value: &bool) -> bool {
    !*value
}
