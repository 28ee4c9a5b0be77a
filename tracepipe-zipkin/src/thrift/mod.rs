//! The Zipkin v1 span model (`zipkincore.thrift`) and its binary protocol encoding.

use std::fmt;

use crate::ThriftError;

mod protocol;

use self::protocol::{Reader, Writer};

/// The client sent a request.
pub const CLIENT_SEND: &str = "cs";
/// The client received a response.
pub const CLIENT_RECV: &str = "cr";
/// The server sent a response.
pub const SERVER_SEND: &str = "ss";
/// The server received a request.
pub const SERVER_RECV: &str = "sr";
/// A producer sent a message.
pub const MESSAGE_SEND: &str = "ms";
/// A consumer received a message.
pub const MESSAGE_RECV: &str = "mr";
/// Binary annotation naming the local component of a span without RPC annotations.
pub const LOCAL_COMPONENT: &str = "lc";
/// Binary annotation describing the calling client.
pub const CLIENT_ADDR: &str = "ca";
/// Binary annotation describing the called server.
pub const SERVER_ADDR: &str = "sa";
/// Binary annotation describing the message broker.
pub const MESSAGE_ADDR: &str = "ma";

/// The network context of a service recording an annotation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Endpoint {
    /// IPv4 address packed into four big-endian bytes.
    pub ipv4: i32,
    /// Port, with values above 32767 wrapped into the negative range.
    pub port: i16,
    /// Lowercase name of the service.
    pub service_name: String,
    /// IPv6 address as 16 bytes.
    pub ipv6: Option<Vec<u8>>,
}

/// A timestamped event, such as one of the core RPC annotations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Annotation {
    /// Epoch microseconds of the event.
    pub timestamp: i64,
    /// Usually a short tag such as [`CLIENT_SEND`].
    pub value: String,
    /// The endpoint that recorded the event.
    pub host: Option<Endpoint>,
}

/// The type of a [`BinaryAnnotation`] value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AnnotationType {
    /// One byte, `1` for true.
    #[default]
    Bool,
    /// Opaque bytes.
    Bytes,
    /// Big-endian 16-bit integer.
    I16,
    /// Big-endian 32-bit integer.
    I32,
    /// Big-endian 64-bit integer.
    I64,
    /// Big-endian IEEE 754 double.
    Double,
    /// UTF-8 text.
    String,
}

impl AnnotationType {
    /// Returns the name of the annotation type as declared in the schema.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "BOOL",
            Self::Bytes => "BYTES",
            Self::I16 => "I16",
            Self::I32 => "I32",
            Self::I64 => "I64",
            Self::Double => "DOUBLE",
            Self::String => "STRING",
        }
    }
}

impl fmt::Display for AnnotationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<i32> for AnnotationType {
    type Error = ThriftError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Bool,
            1 => Self::Bytes,
            2 => Self::I16,
            3 => Self::I32,
            4 => Self::I64,
            5 => Self::Double,
            6 => Self::String,
            _ => {
                return Err(ThriftError::InvalidEnumValue {
                    name: "AnnotationType",
                    value,
                });
            }
        })
    }
}

impl From<AnnotationType> for i32 {
    fn from(value: AnnotationType) -> Self {
        value as i32
    }
}

/// A typed tag attached to a span.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BinaryAnnotation {
    /// Name of the tag.
    pub key: String,
    /// Raw value, interpreted according to `annotation_type`.
    pub value: Vec<u8>,
    /// Type of the value.
    pub annotation_type: AnnotationType,
    /// The endpoint that recorded the tag.
    pub host: Option<Endpoint>,
}

/// A Zipkin v1 span.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Span {
    /// Lower 64 bits of the trace id.
    pub trace_id: i64,
    /// Span name.
    pub name: String,
    /// Span id.
    pub id: i64,
    /// Id of the parent span, absent for root spans.
    pub parent_id: Option<i64>,
    /// Timestamped events.
    pub annotations: Vec<Annotation>,
    /// Typed tags.
    pub binary_annotations: Vec<BinaryAnnotation>,
    /// Whether the span was force-sampled.
    pub debug: bool,
    /// Epoch microseconds of the span start.
    pub timestamp: Option<i64>,
    /// Duration in microseconds.
    pub duration: Option<i64>,
    /// Upper 64 bits of the trace id.
    pub trace_id_high: Option<i64>,
}

impl Span {
    /// Returns the first annotation with the given value.
    pub fn find_annotation(&self, value: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.value == value)
    }
}

impl Endpoint {
    fn read(reader: &mut Reader<'_>) -> Result<Self, ThriftError> {
        reader.nested(|reader| {
            let mut endpoint = Self::default();
            while let Some((field_type, id)) = reader.read_field_begin()? {
                match (id, field_type) {
                    (1, protocol::I32) => endpoint.ipv4 = reader.read_i32()?,
                    (2, protocol::I16) => endpoint.port = reader.read_i16()?,
                    (3, protocol::STRING) => endpoint.service_name = reader.read_string()?,
                    (4, protocol::STRING) => endpoint.ipv6 = Some(reader.read_binary()?),
                    _ => reader.skip(field_type)?,
                }
            }
            Ok(endpoint)
        })
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_field_begin(protocol::I32, 1);
        writer.write_i32(self.ipv4);
        writer.write_field_begin(protocol::I16, 2);
        writer.write_i16(self.port);
        writer.write_field_begin(protocol::STRING, 3);
        writer.write_string(&self.service_name);
        if let Some(ref ipv6) = self.ipv6 {
            writer.write_field_begin(protocol::STRING, 4);
            writer.write_binary(ipv6);
        }
        writer.write_field_stop();
    }
}

impl Annotation {
    fn read(reader: &mut Reader<'_>) -> Result<Self, ThriftError> {
        reader.nested(|reader| {
            let mut annotation = Self::default();
            while let Some((field_type, id)) = reader.read_field_begin()? {
                match (id, field_type) {
                    (1, protocol::I64) => annotation.timestamp = reader.read_i64()?,
                    (2, protocol::STRING) => annotation.value = reader.read_string()?,
                    (3, protocol::STRUCT) => annotation.host = Some(Endpoint::read(reader)?),
                    _ => reader.skip(field_type)?,
                }
            }
            Ok(annotation)
        })
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_field_begin(protocol::I64, 1);
        writer.write_i64(self.timestamp);
        writer.write_field_begin(protocol::STRING, 2);
        writer.write_string(&self.value);
        if let Some(ref host) = self.host {
            writer.write_field_begin(protocol::STRUCT, 3);
            host.write(writer);
        }
        writer.write_field_stop();
    }
}

impl BinaryAnnotation {
    fn read(reader: &mut Reader<'_>) -> Result<Self, ThriftError> {
        reader.nested(|reader| {
            let mut annotation = Self::default();
            while let Some((field_type, id)) = reader.read_field_begin()? {
                match (id, field_type) {
                    (1, protocol::STRING) => annotation.key = reader.read_string()?,
                    (2, protocol::STRING) => annotation.value = reader.read_binary()?,
                    (3, protocol::I32) => {
                        annotation.annotation_type = reader.read_i32()?.try_into()?
                    }
                    (4, protocol::STRUCT) => annotation.host = Some(Endpoint::read(reader)?),
                    _ => reader.skip(field_type)?,
                }
            }
            Ok(annotation)
        })
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_field_begin(protocol::STRING, 1);
        writer.write_string(&self.key);
        writer.write_field_begin(protocol::STRING, 2);
        writer.write_binary(&self.value);
        writer.write_field_begin(protocol::I32, 3);
        writer.write_i32(self.annotation_type.into());
        if let Some(ref host) = self.host {
            writer.write_field_begin(protocol::STRUCT, 4);
            host.write(writer);
        }
        writer.write_field_stop();
    }
}

impl Span {
    fn read(reader: &mut Reader<'_>) -> Result<Self, ThriftError> {
        reader.nested(|reader| {
            let mut span = Self::default();
            while let Some((field_type, id)) = reader.read_field_begin()? {
                match (id, field_type) {
                    (1, protocol::I64) => span.trace_id = reader.read_i64()?,
                    (3, protocol::STRING) => span.name = reader.read_string()?,
                    (4, protocol::I64) => span.id = reader.read_i64()?,
                    (5, protocol::I64) => span.parent_id = Some(reader.read_i64()?),
                    (6, protocol::LIST) => {
                        span.annotations = reader.read_list(protocol::STRUCT, Annotation::read)?
                    }
                    (8, protocol::LIST) => {
                        span.binary_annotations =
                            reader.read_list(protocol::STRUCT, BinaryAnnotation::read)?
                    }
                    (9, protocol::BOOL) => span.debug = reader.read_bool()?,
                    (10, protocol::I64) => span.timestamp = Some(reader.read_i64()?),
                    (11, protocol::I64) => span.duration = Some(reader.read_i64()?),
                    (12, protocol::I64) => span.trace_id_high = Some(reader.read_i64()?),
                    _ => reader.skip(field_type)?,
                }
            }
            Ok(span)
        })
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_field_begin(protocol::I64, 1);
        writer.write_i64(self.trace_id);
        writer.write_field_begin(protocol::STRING, 3);
        writer.write_string(&self.name);
        writer.write_field_begin(protocol::I64, 4);
        writer.write_i64(self.id);
        if let Some(parent_id) = self.parent_id {
            writer.write_field_begin(protocol::I64, 5);
            writer.write_i64(parent_id);
        }
        writer.write_field_begin(protocol::LIST, 6);
        writer.write_list(protocol::STRUCT, &self.annotations, |w, a| a.write(w));
        writer.write_field_begin(protocol::LIST, 8);
        writer.write_list(protocol::STRUCT, &self.binary_annotations, |w, a| {
            a.write(w)
        });
        if self.debug {
            writer.write_field_begin(protocol::BOOL, 9);
            writer.write_bool(self.debug);
        }
        for (id, value) in [
            (10, self.timestamp),
            (11, self.duration),
            (12, self.trace_id_high),
        ] {
            if let Some(value) = value {
                writer.write_field_begin(protocol::I64, id);
                writer.write_i64(value);
            }
        }
        writer.write_field_stop();
    }
}

/// Decodes a Thrift binary protocol list of Zipkin spans.
///
/// Unknown fields are skipped. Bytes following the list are ignored.
pub fn deserialize_thrift(payload: &[u8]) -> Result<Vec<Span>, ThriftError> {
    Reader::new(payload).read_list(protocol::STRUCT, Span::read)
}

/// Encodes Zipkin spans as a Thrift binary protocol list.
pub fn serialize_thrift(spans: &[Span]) -> Vec<u8> {
    let mut writer = Writer::new();
    writer.write_list(protocol::STRUCT, spans, |w, span| span.write(w));
    writer.into_bytes()
}
