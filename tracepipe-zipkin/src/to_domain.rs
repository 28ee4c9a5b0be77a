use std::collections::BTreeMap;

use data_encoding::BASE64;
use thiserror::Error;
use tracepipe_model::{
    Flags, KeyValue, Log, Process, SPAN_KIND_KEY, Span, SpanId, SpanRef, TraceId,
    epoch_micros_to_timestamp, micros_to_duration,
};

use crate::ConversionError;
use crate::thrift::{
    self, AnnotationType, CLIENT_ADDR, CLIENT_RECV, CLIENT_SEND, LOCAL_COMPONENT, MESSAGE_ADDR,
    MESSAGE_RECV, MESSAGE_SEND, SERVER_ADDR, SERVER_RECV, SERVER_SEND,
};

/// Log field key for annotations that are not structured.
const DEFAULT_LOG_FIELD_KEY: &str = "event";
/// Process tag holding the IPv4 address of the service.
const IP_TAG_KEY: &str = "ip";

/// A binary annotation value that is too short for its declared type.
#[derive(Debug, Error)]
#[error("expected {expected} bytes, found {found}")]
struct ValueLengthError {
    expected: usize,
    found: usize,
}

/// Returns the canonical process tag key for binary annotations that describe the process.
fn process_tag_key(key: &str) -> Option<&'static str> {
    match key {
        "jaeger.version" => Some("jaeger.version"),
        "jaeger.hostname" => Some("hostname"),
        IP_TAG_KEY => Some(IP_TAG_KEY),
        _ => None,
    }
}

/// Returns the span kind implied by a core annotation.
fn core_span_kind(value: &str) -> Option<&'static str> {
    match value {
        CLIENT_SEND | CLIENT_RECV => Some("client"),
        SERVER_RECV | SERVER_SEND => Some("server"),
        MESSAGE_SEND => Some("producer"),
        MESSAGE_RECV => Some("consumer"),
        _ => None,
    }
}

/// Converts a Zipkin v1 span into domain spans.
///
/// Most spans convert into exactly one domain span. A span that was reported by both sides of an
/// RPC, that is one carrying both `cs` and `sr` annotations, is split into a client and a server
/// span sharing the same ids. The primary span comes first.
///
/// Binary annotations that describe the emitting process (such as `jaeger.hostname`) are moved
/// into the [`Process`]. The conversion fails if no annotation names the service.
pub fn to_domain_span(span: &thrift::Span) -> Result<Vec<Span>, ConversionError> {
    let trace_id = TraceId::new(span.trace_id_high.unwrap_or(0) as u64, span.trace_id as u64);
    let span_id = SpanId(span.id as u64);

    let process = convert_process(span, trace_id, span_id)?;

    let mut spans = convert_spans(span, trace_id, span_id);
    for converted in &mut spans {
        converted.process = Some(process.clone());
    }

    Ok(spans)
}

fn convert_spans(span: &thrift::Span, trace_id: TraceId, span_id: SpanId) -> Vec<Span> {
    let mut tags = convert_tags(&span.binary_annotations, |key| {
        process_tag_key(key).is_none()
    });
    if let Some(kind) = span
        .annotations
        .iter()
        .find_map(|annotation| core_span_kind(&annotation.value))
    {
        tags.push(KeyValue::string(SPAN_KIND_KEY, kind));
    }

    let references = match span.parent_id {
        Some(parent_id) if parent_id != 0 => {
            vec![SpanRef::child_of(trace_id, SpanId(parent_id as u64))]
        }
        _ => Vec::new(),
    };

    let mut flags = Flags::default();
    if span.debug {
        flags.set_debug();
    }

    let (start_time, duration) = start_time_and_duration(span);

    let primary = Span {
        trace_id: trace_id.to_bytes().to_vec(),
        span_id: span_id.to_bytes().to_vec(),
        operation_name: span.name.clone(),
        references,
        flags: flags.into(),
        start_time: Some(epoch_micros_to_timestamp(start_time)),
        duration: Some(micros_to_duration(duration)),
        tags,
        logs: convert_logs(&span.annotations),
        ..Default::default()
    };

    let (Some(cs), Some(sr)) = (
        span.find_annotation(CLIENT_SEND),
        span.find_annotation(SERVER_RECV),
    ) else {
        return vec![primary];
    };

    // Both sides of the RPC reported into one span, so the other side is split off.
    let (kind, start, end) = if primary.is_rpc_client() {
        ("server", sr, span.find_annotation(SERVER_SEND))
    } else {
        ("client", cs, span.find_annotation(CLIENT_RECV))
    };

    let duration = end.map_or(0, |end| end.timestamp.saturating_sub(start.timestamp));
    let derived = Span {
        trace_id: primary.trace_id.clone(),
        span_id: primary.span_id.clone(),
        operation_name: primary.operation_name.clone(),
        references: primary.references.clone(),
        flags: primary.flags,
        start_time: Some(epoch_micros_to_timestamp(start.timestamp)),
        duration: Some(micros_to_duration(duration)),
        tags: vec![KeyValue::string(SPAN_KIND_KEY, kind)],
        ..Default::default()
    };

    vec![primary, derived]
}

/// Returns the start time and duration in microseconds.
///
/// Spans without a timestamp are timed from their `cs`/`cr` or `sr`/`ss` annotations.
fn start_time_and_duration(span: &thrift::Span) -> (i64, i64) {
    let mut timestamp = span.timestamp.unwrap_or(0);
    let mut duration = span.duration.unwrap_or(0);

    if timestamp == 0 {
        let bounds = match span.find_annotation(CLIENT_SEND) {
            Some(cs) => Some((cs, span.find_annotation(CLIENT_RECV))),
            None => span
                .find_annotation(SERVER_RECV)
                .map(|sr| (sr, span.find_annotation(SERVER_SEND))),
        };

        if let Some((start, end)) = bounds {
            timestamp = start.timestamp;
            if let Some(end) = end {
                if duration == 0 {
                    duration = end.timestamp.saturating_sub(start.timestamp);
                }
            }
        }
    }

    (timestamp, duration)
}

fn convert_tags(
    annotations: &[thrift::BinaryAnnotation],
    include: impl Fn(&str) -> bool,
) -> Vec<KeyValue> {
    let mut tags = Vec::new();

    for annotation in annotations.iter().filter(|a| include(&a.key)) {
        match annotation.key.as_str() {
            LOCAL_COMPONENT => tags.push(KeyValue::string(
                "component",
                String::from_utf8_lossy(&annotation.value),
            )),
            SERVER_ADDR | CLIENT_ADDR | MESSAGE_ADDR => {
                push_peer_tags(annotation.host.as_ref(), &mut tags)
            }
            _ => tags.push(convert_binary_annotation(annotation)),
        }
    }

    tags
}

fn push_peer_tags(host: Option<&thrift::Endpoint>, tags: &mut Vec<KeyValue>) {
    let Some(host) = host else {
        return;
    };

    tags.push(KeyValue::string("peer.service", &host.service_name));
    if host.ipv4 != 0 {
        tags.push(KeyValue::int64("peer.ipv4", i64::from(host.ipv4 as u32)));
    }
    if let Some(ref ipv6) = host.ipv6 {
        tags.push(KeyValue::binary("peer.ipv6", ipv6.clone()));
    }
    if host.port != 0 {
        tags.push(KeyValue::int64("peer.port", i64::from(host.port as u16)));
    }
}

fn convert_binary_annotation(annotation: &thrift::BinaryAnnotation) -> KeyValue {
    match parse_binary_value(annotation) {
        Ok(tag) => tag,
        Err(error) => {
            let encoded = BASE64.encode(&annotation.value);
            tracepipe_log::debug!(
                key = %annotation.key,
                annotation_type = %annotation.annotation_type,
                error = %error,
                "cannot parse zipkin binary annotation"
            );
            KeyValue::string(
                &annotation.key,
                format!(
                    "Cannot parse Zipkin value {encoded} of type {}: {error}",
                    annotation.annotation_type
                ),
            )
        }
    }
}

fn read_be<const N: usize>(value: &[u8]) -> Result<[u8; N], ValueLengthError> {
    value
        .get(..N)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(ValueLengthError {
            expected: N,
            found: value.len(),
        })
}

fn parse_binary_value(annotation: &thrift::BinaryAnnotation) -> Result<KeyValue, ValueLengthError> {
    let key = annotation.key.as_str();
    let value = annotation.value.as_slice();

    Ok(match annotation.annotation_type {
        AnnotationType::Bool => KeyValue::bool(key, value == [1]),
        AnnotationType::Bytes => KeyValue::binary(key, value),
        AnnotationType::I16 => KeyValue::int64(key, i16::from_be_bytes(read_be(value)?).into()),
        AnnotationType::I32 => KeyValue::int64(key, i32::from_be_bytes(read_be(value)?).into()),
        AnnotationType::I64 => KeyValue::int64(key, i64::from_be_bytes(read_be(value)?)),
        AnnotationType::Double => KeyValue::float64(key, f64::from_be_bytes(read_be(value)?)),
        AnnotationType::String => KeyValue::string(key, String::from_utf8_lossy(value)),
    })
}

fn convert_logs(annotations: &[thrift::Annotation]) -> Vec<Log> {
    annotations
        .iter()
        .filter(|annotation| core_span_kind(&annotation.value).is_none())
        .map(|annotation| Log {
            timestamp: Some(epoch_micros_to_timestamp(annotation.timestamp)),
            fields: log_fields(&annotation.value),
        })
        .collect()
}

/// Annotations holding a JSON object of strings become one field per entry.
fn log_fields(value: &str) -> Vec<KeyValue> {
    match serde_json::from_str::<BTreeMap<String, String>>(value) {
        Ok(fields) => fields
            .into_iter()
            .map(|(key, value)| KeyValue::string(key, value))
            .collect(),
        Err(_) => vec![KeyValue::string(DEFAULT_LOG_FIELD_KEY, value)],
    }
}

fn convert_process(
    span: &thrift::Span,
    trace_id: TraceId,
    span_id: SpanId,
) -> Result<Process, ConversionError> {
    let mut tags = convert_tags(&span.binary_annotations, |key| {
        process_tag_key(key).is_some()
    });
    for tag in &mut tags {
        if let Some(key) = process_tag_key(&tag.key) {
            tag.key = key.to_owned();
        }
    }

    let host = find_service_host(span)
        .ok_or(ConversionError::MissingServiceName { trace_id, span_id })?;

    if host.ipv4 != 0 && !tags.iter().any(|tag| tag.key == IP_TAG_KEY) {
        tags.push(KeyValue::int64(IP_TAG_KEY, i64::from(host.ipv4 as u32)));
    }

    Ok(Process::new(host.service_name.clone(), tags))
}

fn named_host(host: &Option<thrift::Endpoint>) -> Option<&thrift::Endpoint> {
    host.as_ref().filter(|host| !host.service_name.is_empty())
}

/// Finds the endpoint naming the service, preferring core annotations over `lc` over any other.
fn find_service_host(span: &thrift::Span) -> Option<&thrift::Endpoint> {
    span.annotations
        .iter()
        .filter(|annotation| core_span_kind(&annotation.value).is_some())
        .find_map(|annotation| named_host(&annotation.host))
        .or_else(|| {
            span.binary_annotations
                .iter()
                .filter(|annotation| annotation.key == LOCAL_COMPONENT)
                .find_map(|annotation| named_host(&annotation.host))
        })
        .or_else(|| {
            span.annotations
                .iter()
                .find_map(|annotation| named_host(&annotation.host))
        })
}
