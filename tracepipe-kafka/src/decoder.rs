use prost::Message;
use tracepipe_model::Span;
use tracepipe_zipkin::{ThriftError, thrift, v2};

use crate::{DecodeError, Encoding};

impl Encoding {
    /// Decodes a message payload into domain spans.
    ///
    /// The payload is handed to the codec of this encoding without any prior validation. On
    /// success, the spans are returned in the order in which their source records appear in the
    /// payload:
    ///
    ///  - [`Protobuf`](Self::Protobuf) and [`Json`](Self::Json) always yield exactly one span.
    ///  - [`ZipkinThrift`](Self::ZipkinThrift) converts the first span of the Thrift list.
    ///  - [`ZipkinJsonV2`](Self::ZipkinJsonV2) converts every span of the JSON array. If any of
    ///    them fails to convert, the entire payload fails.
    ///
    /// On error, no spans are returned.
    pub fn decode(self, payload: &[u8]) -> Result<Vec<Span>, DecodeError> {
        match self {
            Self::Protobuf => decode_protobuf(payload),
            Self::Json => decode_json(payload),
            Self::ZipkinThrift => decode_zipkin_thrift(payload),
            Self::ZipkinJsonV2 => decode_zipkin_json_v2(payload),
        }
    }
}

fn decode_protobuf(payload: &[u8]) -> Result<Vec<Span>, DecodeError> {
    Ok(vec![Span::decode(payload)?])
}

fn decode_json(payload: &[u8]) -> Result<Vec<Span>, DecodeError> {
    Ok(vec![serde_json::from_slice(payload)?])
}

fn decode_zipkin_thrift(payload: &[u8]) -> Result<Vec<Span>, DecodeError> {
    let records = tracepipe_zipkin::deserialize_thrift(payload)?;
    // Producers write one span per message, anything after the first record is ignored.
    let record = records.first().ok_or(ThriftError::EmptyList)?;
    Ok(tracepipe_zipkin::to_domain_span(record)?)
}

fn decode_zipkin_json_v2(payload: &[u8]) -> Result<Vec<Span>, DecodeError> {
    let envelopes: Vec<v2::Span> = serde_json::from_slice(payload)?;
    let records = tracepipe_zipkin::spans_v2_to_thrift(&envelopes)?;
    convert_records(&records, tracepipe_zipkin::to_domain_span)
}

/// Converts all records in order, discarding every converted span if any record fails.
fn convert_records<E>(
    records: &[thrift::Span],
    mut convert: impl FnMut(&thrift::Span) -> Result<Vec<Span>, E>,
) -> Result<Vec<Span>, DecodeError>
where
    DecodeError: From<E>,
{
    let mut spans = Vec::with_capacity(records.len());
    for record in records {
        spans.extend(convert(record)?);
    }
    Ok(spans)
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;
    use tracepipe_model::{KeyValue, Process, SpanId, TraceId};
    use tracepipe_zipkin::ConversionError;

    use super::*;
    use crate::DecodeErrorKind;

    fn domain_span(id: u64) -> Span {
        Span {
            trace_id: TraceId::new(0, 1).to_bytes().to_vec(),
            span_id: SpanId(id).to_bytes().to_vec(),
            operation_name: "query".to_owned(),
            tags: vec![KeyValue::int64("rows", 12)],
            process: Some(Process::new("db", Vec::new())),
            ..Default::default()
        }
    }

    fn zipkin_v1_span(id: i64, service_name: &str) -> thrift::Span {
        thrift::Span {
            trace_id: 1,
            name: "send".to_owned(),
            id,
            annotations: vec![thrift::Annotation {
                timestamp: 100,
                value: thrift::MESSAGE_SEND.to_owned(),
                host: Some(thrift::Endpoint {
                    service_name: service_name.to_owned(),
                    ..Default::default()
                }),
            }],
            ..Default::default()
        }
    }

    const ZIPKIN_V2_BATCH: &str = r#"[
        {
            "traceId": "1",
            "id": "a",
            "name": "local",
            "timestamp": 100,
            "duration": 10,
            "localEndpoint": {"serviceName": "frontend"}
        },
        {
            "traceId": "1",
            "parentId": "a",
            "id": "b",
            "kind": "CLIENT",
            "name": "get",
            "timestamp": 105,
            "duration": 3,
            "localEndpoint": {"serviceName": "frontend"},
            "tags": {"http.path": "/api"}
        }
    ]"#;

    #[test]
    fn test_protobuf() {
        let payload = domain_span(7).encode_to_vec();

        let spans = Encoding::Protobuf.decode(&payload).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].span_id(), Ok(SpanId(7)));
        assert_eq!(spans[0], domain_span(7));
    }

    #[test]
    fn test_protobuf_garbage() {
        let error = Encoding::Protobuf.decode(&[0xff, 0xff, 0xff]).unwrap_err();
        assert!(matches!(error, DecodeError::Protobuf(_)));
        assert_eq!(error.kind(), DecodeErrorKind::MalformedInput);
    }

    #[test]
    fn test_protobuf_truncated() {
        let payload = domain_span(7).encode_to_vec();
        let result = Encoding::Protobuf.decode(&payload[..payload.len() - 1]);
        assert!(result.is_err());
    }

    #[test]
    fn test_json() {
        let payload = serde_json::to_vec(&domain_span(7)).unwrap();

        let spans = Encoding::Json.decode(&payload).unwrap();
        assert_eq!(spans, vec![domain_span(7)]);
    }

    #[test]
    fn test_json_malformed() {
        let error = Encoding::Json.decode(b"{").unwrap_err();
        assert!(matches!(error, DecodeError::Json(_)));
        assert_eq!(error.kind(), DecodeErrorKind::MalformedInput);
        // The codec's error surfaces unchanged.
        let expected = serde_json::from_slice::<Span>(b"{").unwrap_err();
        assert_eq!(error.to_string(), expected.to_string());
    }

    #[test]
    fn test_json_schema_mismatch() {
        let error = Encoding::Json.decode(br#"{"spanId": 7}"#).unwrap_err();
        assert_eq!(error.kind(), DecodeErrorKind::SchemaMismatch);
    }

    #[test]
    fn test_zipkin_thrift() {
        let payload = tracepipe_zipkin::serialize_thrift(&[zipkin_v1_span(7, "producer")]);

        let spans = Encoding::ZipkinThrift.decode(&payload).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].span_id(), Ok(SpanId(7)));
        assert_eq!(
            spans[0].process.as_ref().map(|p| p.service_name.as_str()),
            Some("producer")
        );
    }

    #[test]
    fn test_zipkin_thrift_only_first_record() {
        let payload = tracepipe_zipkin::serialize_thrift(&[
            zipkin_v1_span(1, "first"),
            zipkin_v1_span(2, "second"),
        ]);

        let spans = Encoding::ZipkinThrift.decode(&payload).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].span_id(), Ok(SpanId(1)));
    }

    #[test]
    fn test_zipkin_thrift_empty_list() {
        let payload = tracepipe_zipkin::serialize_thrift(&[]);
        let error = Encoding::ZipkinThrift.decode(&payload).unwrap_err();
        assert!(matches!(error, DecodeError::Thrift(ThriftError::EmptyList)));
    }

    #[test]
    fn test_zipkin_thrift_garbage() {
        let error = Encoding::ZipkinThrift.decode(b"\x0c\x00").unwrap_err();
        assert!(matches!(error, DecodeError::Thrift(ThriftError::UnexpectedEof)));
        assert_eq!(error.kind(), DecodeErrorKind::MalformedInput);
    }

    #[test]
    fn test_zipkin_thrift_missing_service_name() {
        let payload = tracepipe_zipkin::serialize_thrift(&[zipkin_v1_span(7, "")]);
        let error = Encoding::ZipkinThrift.decode(&payload).unwrap_err();
        assert_eq!(error.kind(), DecodeErrorKind::ConversionFailure);
    }

    #[test]
    fn test_zipkin_json_v2() {
        let spans = Encoding::ZipkinJsonV2
            .decode(ZIPKIN_V2_BATCH.as_bytes())
            .unwrap();

        let ids: Vec<_> = spans.iter().map(|span| span.span_id()).collect();
        assert_eq!(ids, [Ok(SpanId(0xa)), Ok(SpanId(0xb))]);
        assert!(spans[1].is_rpc_client());
        assert_eq!(spans[1].parent_span_id(), Some(SpanId(0xa)));
    }

    #[test]
    fn test_zipkin_json_v2_empty() {
        let spans = Encoding::ZipkinJsonV2.decode(b"[]").unwrap();
        assert!(spans.is_empty());
    }

    #[test]
    fn test_zipkin_json_v2_malformed() {
        let payloads: [&[u8]; 4] = [b"{", b"[{]", b"", b"\x00\x01"];
        for payload in payloads {
            let error = Encoding::ZipkinJsonV2.decode(payload).unwrap_err();
            assert!(matches!(error, DecodeError::Json(_)));
        }

        let error = Encoding::ZipkinJsonV2.decode(b"{}").unwrap_err();
        assert_eq!(error.kind(), DecodeErrorKind::SchemaMismatch);
    }

    #[test]
    fn test_zipkin_json_v2_translation_failure() {
        let payload = br#"[{"traceId": "1", "id": "not hex"}]"#;
        let error = Encoding::ZipkinJsonV2.decode(payload).unwrap_err();
        assert!(matches!(
            error,
            DecodeError::Conversion(ConversionError::InvalidSpanId { .. })
        ));
    }

    #[test]
    fn test_zipkin_json_v2_non_ascii_trace_id() {
        let payload = r#"[
            {"traceId": "€€€€€€", "id": "1", "localEndpoint": {"serviceName": "a"}}
        ]"#;
        let error = Encoding::ZipkinJsonV2.decode(payload.as_bytes()).unwrap_err();
        assert_eq!(error.kind(), DecodeErrorKind::ConversionFailure);
        assert!(matches!(
            error,
            DecodeError::Conversion(ConversionError::InvalidTraceId { .. })
        ));

        let payload = br#"[{"traceId": "+1", "id": "1", "localEndpoint": {"serviceName": "a"}}]"#;
        let error = Encoding::ZipkinJsonV2.decode(payload).unwrap_err();
        assert!(matches!(
            error,
            DecodeError::Conversion(ConversionError::InvalidTraceId { .. })
        ));
    }

    #[test]
    fn test_zipkin_json_v2_all_or_nothing() {
        // The second span names no service anywhere.
        let payload = br#"[
            {"traceId": "1", "id": "a", "localEndpoint": {"serviceName": "frontend"}},
            {"traceId": "1", "id": "b", "kind": "CLIENT"},
            {"traceId": "1", "id": "c", "localEndpoint": {"serviceName": "frontend"}}
        ]"#;

        let error = Encoding::ZipkinJsonV2.decode(payload).unwrap_err();
        assert!(matches!(
            error,
            DecodeError::Conversion(ConversionError::MissingServiceName {
                span_id: SpanId(0xb),
                ..
            })
        ));
    }

    #[test]
    fn test_convert_records_order() {
        let records = [
            zipkin_v1_span(1, "a"),
            zipkin_v1_span(2, "b"),
            zipkin_v1_span(3, "c"),
        ];

        let spans = convert_records(&records, |record| {
            Ok::<_, ConversionError>(match record.id {
                1 => vec![domain_span(0xa)],
                2 => vec![],
                _ => vec![domain_span(0xb), domain_span(0xc)],
            })
        })
        .unwrap();

        assert_eq!(
            spans,
            vec![domain_span(0xa), domain_span(0xb), domain_span(0xc)]
        );
    }

    #[test]
    fn test_convert_records_failure_discards() {
        let records = [
            zipkin_v1_span(1, "a"),
            zipkin_v1_span(2, "b"),
            zipkin_v1_span(3, "c"),
        ];

        let mut converted = Vec::new();
        let result = convert_records(&records, |record| {
            converted.push(record.id);
            match record.id {
                2 => Err(ConversionError::MissingServiceName {
                    trace_id: TraceId::new(0, 1),
                    span_id: SpanId(2),
                }),
                _ => Ok(vec![domain_span(record.id as u64)]),
            }
        });

        assert!(matches!(result, Err(DecodeError::Conversion(_))));
        // Conversion stops at the first failure.
        assert_eq!(converted, [1, 2]);
    }

    #[test]
    fn test_idempotent() {
        let payloads = [
            (Encoding::Protobuf, domain_span(7).encode_to_vec()),
            (Encoding::Json, serde_json::to_vec(&domain_span(7)).unwrap()),
            (
                Encoding::ZipkinThrift,
                tracepipe_zipkin::serialize_thrift(&[zipkin_v1_span(7, "producer")]),
            ),
            (Encoding::ZipkinJsonV2, ZIPKIN_V2_BATCH.as_bytes().to_vec()),
        ];

        for (encoding, payload) in payloads {
            let first = encoding.decode(&payload).unwrap();
            let second = encoding.decode(&payload).unwrap();
            assert_eq!(first, second, "{encoding}");
        }
    }

    #[test]
    fn test_garbage_fails_for_all_encodings() {
        for encoding in Encoding::ALL {
            assert!(encoding.decode(b"\xde\xad\xbe\xef garbage").is_err(), "{encoding}");
        }
    }
}
