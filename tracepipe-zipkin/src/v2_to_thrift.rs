use std::net::{Ipv4Addr, Ipv6Addr};

use tracepipe_model::{IdError, SpanId, TraceId};

use crate::ConversionError;
use crate::thrift::{self, AnnotationType};
use crate::v2::{self, Kind};

/// Translates a batch of Zipkin v2 spans into the Zipkin v1 Thrift model.
///
/// Spans are translated in order and the first failure aborts the batch.
pub fn spans_v2_to_thrift(spans: &[v2::Span]) -> Result<Vec<thrift::Span>, ConversionError> {
    spans.iter().map(span_v2_to_thrift).collect()
}

/// Translates a single Zipkin v2 span.
///
/// * The span kind becomes the matching core annotations, e.g. `cs` and `cr` for clients.
/// * Tags become `STRING` binary annotations hosted on the local endpoint.
/// * The remote endpoint becomes an address annotation (`sa`, `ca` or `ma`) if the kind is known.
/// * A span that ends up without annotations gets an `lc` binary annotation so that its service
///   name remains discoverable.
pub fn span_v2_to_thrift(span: &v2::Span) -> Result<thrift::Span, ConversionError> {
    let id = parse_span_id(&span.id).map_err(|source| ConversionError::InvalidSpanId {
        value: span.id.clone(),
        source,
    })?;

    let trace_id: TraceId = span
        .trace_id
        .parse()
        .map_err(|source| ConversionError::InvalidTraceId {
            value: span.trace_id.clone(),
            source,
        })?;

    let parent_id = match span.parent_id.as_deref() {
        Some(parent_id) if !parent_id.is_empty() => {
            let parsed =
                parse_span_id(parent_id).map_err(|source| ConversionError::InvalidParentId {
                    value: parent_id.to_owned(),
                    source,
                })?;
            Some(parsed.0 as i64)
        }
        _ => None,
    };

    let local_endpoint = span.local_endpoint.as_ref().map(endpoint_to_thrift).transpose()?;

    let mut annotations: Vec<_> = span
        .annotations
        .iter()
        .map(|annotation| thrift::Annotation {
            timestamp: annotation.timestamp,
            value: annotation.value.clone(),
            host: local_endpoint.clone(),
        })
        .collect();

    let mut binary_annotations: Vec<_> = span
        .tags
        .iter()
        .map(|(key, value)| thrift::BinaryAnnotation {
            key: key.clone(),
            value: value.as_bytes().to_vec(),
            annotation_type: AnnotationType::String,
            host: local_endpoint.clone(),
        })
        .collect();

    if let Some(kind) = span.kind {
        annotations.extend(kind_annotations(span, kind, local_endpoint.as_ref()));
    }

    if let Some(ref remote) = span.remote_endpoint {
        if let Some(annotation) = remote_endpoint_annotation(remote, span.kind)? {
            binary_annotations.push(annotation);
        }
    }

    if let Some(ref local) = local_endpoint {
        if annotations.is_empty() && binary_annotations.is_empty() {
            binary_annotations.push(thrift::BinaryAnnotation {
                key: thrift::LOCAL_COMPONENT.to_owned(),
                value: Vec::new(),
                annotation_type: AnnotationType::String,
                host: Some(local.clone()),
            });
        }
    }

    Ok(thrift::Span {
        trace_id: trace_id.low as i64,
        name: span.name.clone(),
        id: id.0 as i64,
        parent_id,
        annotations,
        binary_annotations,
        debug: span.debug,
        timestamp: Some(span.timestamp),
        duration: Some(span.duration),
        trace_id_high: (trace_id.high != 0).then_some(trace_id.high as i64),
    })
}

/// Parses a span id, keeping only the last 16 hex digits of longer ids.
fn parse_span_id(id: &str) -> Result<SpanId, IdError> {
    let start = id.len().saturating_sub(16);
    match id.get(start..) {
        Some(tail) => tail.parse(),
        None => id.parse(),
    }
}

fn kind_annotations(
    span: &v2::Span,
    kind: Kind,
    host: Option<&thrift::Endpoint>,
) -> Vec<thrift::Annotation> {
    let annotation = |value: &str, timestamp: i64| thrift::Annotation {
        timestamp,
        value: value.to_owned(),
        host: host.cloned(),
    };

    let end = span.timestamp.saturating_add(span.duration);
    match kind {
        Kind::Server => vec![
            annotation(thrift::SERVER_RECV, span.timestamp),
            annotation(thrift::SERVER_SEND, end),
        ],
        Kind::Client => vec![
            annotation(thrift::CLIENT_SEND, span.timestamp),
            annotation(thrift::CLIENT_RECV, end),
        ],
        Kind::Producer => vec![annotation(thrift::MESSAGE_SEND, span.timestamp)],
        Kind::Consumer => vec![annotation(thrift::MESSAGE_RECV, span.timestamp)],
    }
}

fn remote_endpoint_annotation(
    remote: &v2::Endpoint,
    kind: Option<Kind>,
) -> Result<Option<thrift::BinaryAnnotation>, ConversionError> {
    let key = match kind {
        Some(Kind::Client) => thrift::SERVER_ADDR,
        Some(Kind::Server) => thrift::CLIENT_ADDR,
        Some(Kind::Producer | Kind::Consumer) => thrift::MESSAGE_ADDR,
        None => return Ok(None),
    };

    Ok(Some(thrift::BinaryAnnotation {
        key: key.to_owned(),
        value: Vec::new(),
        annotation_type: AnnotationType::Bool,
        host: Some(endpoint_to_thrift(remote)?),
    }))
}

fn endpoint_to_thrift(endpoint: &v2::Endpoint) -> Result<thrift::Endpoint, ConversionError> {
    let ipv4 = match endpoint.ipv4.as_deref() {
        None | Some("") => 0,
        Some(ipv4) => {
            let addr: Ipv4Addr = ipv4
                .parse()
                .map_err(|_| ConversionError::InvalidIpv4(ipv4.to_owned()))?;
            u32::from(addr) as i32
        }
    };

    let ipv6 = match endpoint.ipv6.as_deref() {
        None | Some("") => None,
        Some(ipv6) => {
            let addr: Ipv6Addr = ipv6
                .parse()
                .map_err(|_| ConversionError::InvalidIpv6(ipv6.to_owned()))?;
            Some(addr.octets().to_vec())
        }
    };

    Ok(thrift::Endpoint {
        ipv4,
        // The Thrift port is a signed 16-bit field. Larger values keep their low 16 bits.
        port: endpoint.port.unwrap_or(0) as u16 as i16,
        service_name: endpoint.service_name.clone().unwrap_or_default(),
        ipv6,
    })
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    fn parse(json: &str) -> Vec<v2::Span> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_client_span() {
        let spans = parse(
            r#"[{
                "traceId": "463ac35c9f6413ad48485a3953bb6124",
                "parentId": "6b221d5bc9e6496c",
                "id": "a2fb4a1d1a96d312",
                "kind": "CLIENT",
                "name": "get",
                "timestamp": 1000,
                "duration": 50,
                "debug": true,
                "localEndpoint": {"serviceName": "frontend", "ipv4": "127.0.0.1", "port": 8080},
                "remoteEndpoint": {"serviceName": "backend", "ipv6": "::1", "port": 65535},
                "tags": {"http.path": "/api"}
            }]"#,
        );

        let converted = spans_v2_to_thrift(&spans).unwrap();
        assert_eq!(converted.len(), 1);
        let span = &converted[0];

        assert_eq!(span.trace_id, 0x48485a3953bb6124);
        assert_eq!(span.trace_id_high, Some(0x463ac35c9f6413ad));
        assert_eq!(span.id, 0xa2fb4a1d1a96d312u64 as i64);
        assert_eq!(span.parent_id, Some(0x6b221d5bc9e6496c));
        assert!(span.debug);
        assert_eq!(span.timestamp, Some(1000));
        assert_eq!(span.duration, Some(50));

        let local = thrift::Endpoint {
            ipv4: 0x7f000001,
            port: 8080,
            service_name: "frontend".to_owned(),
            ipv6: None,
        };

        assert_eq!(
            span.annotations,
            vec![
                thrift::Annotation {
                    timestamp: 1000,
                    value: "cs".to_owned(),
                    host: Some(local.clone()),
                },
                thrift::Annotation {
                    timestamp: 1050,
                    value: "cr".to_owned(),
                    host: Some(local.clone()),
                },
            ]
        );

        let mut loopback = vec![0; 16];
        loopback[15] = 1;
        assert_eq!(
            span.binary_annotations,
            vec![
                thrift::BinaryAnnotation {
                    key: "http.path".to_owned(),
                    value: b"/api".to_vec(),
                    annotation_type: AnnotationType::String,
                    host: Some(local),
                },
                thrift::BinaryAnnotation {
                    key: "sa".to_owned(),
                    value: Vec::new(),
                    annotation_type: AnnotationType::Bool,
                    host: Some(thrift::Endpoint {
                        ipv4: 0,
                        port: -1,
                        service_name: "backend".to_owned(),
                        ipv6: Some(loopback),
                    }),
                },
            ]
        );
    }

    #[test]
    fn test_kind_annotations() {
        let values = |kind: &str| {
            let json = format!(
                r#"[{{"traceId": "1", "id": "2", "kind": "{kind}", "timestamp": 10, "duration": 5,
                     "remoteEndpoint": {{"serviceName": "peer"}}}}]"#
            );
            let span = spans_v2_to_thrift(&parse(&json)).unwrap().remove(0);
            let annotations: Vec<_> = span
                .annotations
                .iter()
                .map(|a| (a.value.clone(), a.timestamp))
                .collect();
            let remote = span.binary_annotations[0].key.clone();
            (annotations, remote)
        };

        assert_eq!(
            values("SERVER"),
            (vec![("sr".to_owned(), 10), ("ss".to_owned(), 15)], "ca".to_owned())
        );
        assert_eq!(
            values("PRODUCER"),
            (vec![("ms".to_owned(), 10)], "ma".to_owned())
        );
        assert_eq!(
            values("CONSUMER"),
            (vec![("mr".to_owned(), 10)], "ma".to_owned())
        );
    }

    #[test]
    fn test_local_component() {
        let spans = parse(
            r#"[{"traceId": "1", "id": "2", "localEndpoint": {"serviceName": "batch"}}]"#,
        );
        let span = spans_v2_to_thrift(&spans).unwrap().remove(0);
        assert!(span.annotations.is_empty());
        assert_eq!(span.binary_annotations.len(), 1);
        assert_eq!(span.binary_annotations[0].key, "lc");
        assert_eq!(
            span.binary_annotations[0]
                .host
                .as_ref()
                .map(|h| h.service_name.as_str()),
            Some("batch")
        );
    }

    #[test]
    fn test_remote_endpoint_without_kind() {
        let spans =
            parse(r#"[{"traceId": "1", "id": "2", "remoteEndpoint": {"serviceName": "db"}}]"#);
        let span = spans_v2_to_thrift(&spans).unwrap().remove(0);
        assert!(span.binary_annotations.is_empty());
    }

    #[test]
    fn test_long_span_id() {
        let spans = parse(r#"[{"traceId": "1", "id": "ffff0000000000000002"}]"#);
        let span = spans_v2_to_thrift(&spans).unwrap().remove(0);
        assert_eq!(span.id, 2);
        assert_eq!(span.trace_id_high, None);
    }

    #[test]
    fn test_invalid_ids() {
        let result = spans_v2_to_thrift(&parse(r#"[{"traceId": "1", "id": "zz"}]"#));
        assert!(matches!(result, Err(ConversionError::InvalidSpanId { .. })));

        let result = spans_v2_to_thrift(&parse(r#"[{"traceId": "", "id": "1"}]"#));
        assert!(matches!(result, Err(ConversionError::InvalidTraceId { .. })));

        let result =
            spans_v2_to_thrift(&parse(r#"[{"traceId": "1", "id": "1", "parentId": "x"}]"#));
        assert!(matches!(result, Err(ConversionError::InvalidParentId { .. })));
    }

    #[test]
    fn test_invalid_address() {
        let result = spans_v2_to_thrift(&parse(
            r#"[{"traceId": "1", "id": "1", "localEndpoint": {"ipv4": "300.0.0.1"}}]"#,
        ));
        assert!(matches!(result, Err(ConversionError::InvalidIpv4(_))));

        let result = spans_v2_to_thrift(&parse(
            r#"[{"traceId": "1", "id": "1", "localEndpoint": {"ipv6": "::g"}}]"#,
        ));
        assert!(matches!(result, Err(ConversionError::InvalidIpv6(_))));
    }

    #[test]
    fn test_port_keeps_low_16_bits() {
        let port = |port| {
            let endpoint = v2::Endpoint {
                port,
                ..Default::default()
            };
            endpoint_to_thrift(&endpoint).unwrap().port
        };

        assert_eq!(port(None), 0);
        assert_eq!(port(Some(8080)), 8080);
        assert_eq!(port(Some(65535)), -1);
        assert_eq!(port(Some(70000)), 4464);
        assert_eq!(port(Some(-1)), -1);
    }

    #[test]
    fn test_first_failure_aborts() {
        let spans = parse(r#"[{"traceId": "1", "id": "1"}, {"traceId": "1", "id": "?"}]"#);
        assert!(spans_v2_to_thrift(&spans).is_err());
    }
}
