use std::error::Error as StdError;

use thiserror::Error;
use tracepipe_log::LogError;
use tracepipe_model::Span;

use crate::{DecodeError, Encoding};

/// A destination for decoded spans, such as a span storage backend.
pub trait SpanWriter {
    /// The error returned when a span cannot be written.
    type Error: StdError + 'static;

    /// Writes a single span.
    fn write_span(&self, span: Span) -> Result<(), Self::Error>;
}

/// An error processing a consumed message.
#[derive(Debug, Error)]
pub enum ProcessError<E> {
    /// The message payload could not be decoded.
    #[error("failed to decode message")]
    Decode(#[source] DecodeError),
    /// A decoded span could not be written.
    #[error("failed to write span")]
    Write(#[source] E),
}

/// Decodes consumed messages and hands their spans to a [`SpanWriter`].
#[derive(Debug)]
pub struct SpanProcessor<W> {
    encoding: Encoding,
    writer: W,
}

impl<W: SpanWriter> SpanProcessor<W> {
    /// Creates a processor decoding messages in the given encoding.
    pub fn new(encoding: Encoding, writer: W) -> Self {
        Self { encoding, writer }
    }

    /// Returns the encoding of the consumed messages.
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Returns the writer receiving the decoded spans.
    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Decodes a message payload and writes its spans in order.
    ///
    /// Nothing is written if the payload fails to decode. Writing stops at the first span that
    /// fails to be written. Returns the number of written spans.
    pub fn process(&self, payload: &[u8]) -> Result<usize, ProcessError<W::Error>> {
        let spans = self.encoding.decode(payload).map_err(|error| {
            tracepipe_log::warn!(
                encoding = %self.encoding,
                kind = %error.kind(),
                error = &error as &dyn StdError,
                "failed to decode message"
            );
            ProcessError::Decode(error)
        })?;

        let count = spans.len();
        for span in spans {
            self.writer.write_span(span).map_err(|error| {
                tracepipe_log::error!(
                    encoding = %self.encoding,
                    "failed to write span: {}",
                    LogError(&error)
                );
                ProcessError::Write(error)
            })?;
        }

        tracepipe_log::trace!(encoding = %self.encoding, count, "processed message");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use prost::Message;
    use similar_asserts::assert_eq;
    use tracepipe_model::SpanId;

    use super::*;

    #[derive(Debug, Error)]
    #[error("storage is full")]
    struct StorageFull;

    #[derive(Debug, Default)]
    struct MemoryWriter {
        spans: RefCell<Vec<Span>>,
        capacity: Option<usize>,
    }

    impl SpanWriter for MemoryWriter {
        type Error = StorageFull;

        fn write_span(&self, span: Span) -> Result<(), Self::Error> {
            let mut spans = self.spans.borrow_mut();
            if self.capacity.is_some_and(|capacity| spans.len() >= capacity) {
                return Err(StorageFull);
            }
            spans.push(span);
            Ok(())
        }
    }

    fn span_ids(writer: &MemoryWriter) -> Vec<SpanId> {
        writer
            .spans
            .borrow()
            .iter()
            .filter_map(|span| span.span_id().ok())
            .collect()
    }

    const BATCH: &[u8] = br#"[
        {"traceId": "1", "id": "1", "localEndpoint": {"serviceName": "a"}},
        {"traceId": "1", "id": "2", "localEndpoint": {"serviceName": "a"}},
        {"traceId": "1", "id": "3", "localEndpoint": {"serviceName": "a"}}
    ]"#;

    #[test]
    fn test_process_writes_in_order() {
        let processor = SpanProcessor::new(Encoding::ZipkinJsonV2, MemoryWriter::default());

        assert_eq!(processor.process(BATCH).unwrap(), 3);
        assert_eq!(
            span_ids(processor.writer()),
            [SpanId(1), SpanId(2), SpanId(3)]
        );
    }

    #[test]
    fn test_process_protobuf() {
        let span = Span {
            span_id: SpanId(7).to_bytes().to_vec(),
            ..Default::default()
        };

        let processor = SpanProcessor::new(Encoding::Protobuf, MemoryWriter::default());
        assert_eq!(processor.encoding(), Encoding::Protobuf);
        assert_eq!(processor.process(&span.encode_to_vec()).unwrap(), 1);
        assert_eq!(span_ids(processor.writer()), [SpanId(7)]);
    }

    #[test]
    fn test_decode_failure_writes_nothing() {
        tracepipe_log::init_test!();

        let processor = SpanProcessor::new(Encoding::Json, MemoryWriter::default());
        let error = processor.process(b"{").unwrap_err();

        assert!(matches!(error, ProcessError::Decode(DecodeError::Json(_))));
        assert!(processor.writer().spans.borrow().is_empty());
    }

    #[test]
    fn test_write_failure_stops() {
        tracepipe_log::init_test!();

        let writer = MemoryWriter {
            capacity: Some(2),
            ..Default::default()
        };
        let processor = SpanProcessor::new(Encoding::ZipkinJsonV2, writer);

        let error = processor.process(BATCH).unwrap_err();
        assert!(matches!(error, ProcessError::Write(StorageFull)));
        assert_eq!(span_ids(processor.writer()), [SpanId(1), SpanId(2)]);
    }
}
