//! SSE stream decoder: raw bytes -> GLM chunk objects
//!
//! Records are separated by a blank line (`"\n\n"`). Within a record only
//! `data:` lines matter; `[DONE]` payloads are ignored and the stream ends when
//! the byte source does. A record that is not valid JSON is logged and skipped.

use futures::stream::Stream;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use super::wire::ChatCompletionChunk;
use crate::core::{AdapterError, AdapterResult};

const DATA_PREFIX: &str = "data:";
const DONE_MARKER: &str = "[DONE]";

/// Incremental decoder; feed it byte slices as they arrive
#[derive(Debug, Default)]
pub struct SseDecoder {
    /// Trailing bytes of an incomplete UTF-8 sequence
    pending_bytes: Vec<u8>,
    /// Decoded text not yet terminated by a record boundary
    buffer: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes, returning every chunk completed by them
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<ChatCompletionChunk> {
        self.decode_utf8(bytes);
        self.drain_records()
    }

    /// Flush whatever is left once the byte source is exhausted
    pub fn finish(&mut self) -> Vec<ChatCompletionChunk> {
        if !self.pending_bytes.is_empty() {
            let tail = String::from_utf8_lossy(&self.pending_bytes).into_owned();
            self.buffer.push_str(&tail);
            self.pending_bytes.clear();
        }

        let mut chunks = self.drain_records();
        let rest = std::mem::take(&mut self.buffer);
        if !rest.trim().is_empty() {
            chunks.extend(parse_record(&rest));
        }
        chunks
    }

    fn decode_utf8(&mut self, bytes: &[u8]) {
        self.pending_bytes.extend_from_slice(bytes);

        loop {
            match std::str::from_utf8(&self.pending_bytes) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    self.pending_bytes.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    self.buffer
                        .push_str(&String::from_utf8_lossy(&self.pending_bytes[..valid]));
                    match e.error_len() {
                        // Incomplete sequence at the end: wait for more bytes
                        None => {
                            self.pending_bytes.drain(..valid);
                            break;
                        }
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            self.pending_bytes.drain(..valid + len);
                        }
                    }
                }
            }
        }

        if self.buffer.contains("\r\n") {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }
    }

    fn drain_records(&mut self) -> Vec<ChatCompletionChunk> {
        let mut chunks = Vec::new();
        while let Some(pos) = self.buffer.find("\n\n") {
            let record: String = self.buffer.drain(..pos + 2).collect();
            chunks.extend(parse_record(&record[..pos]));
        }
        chunks
    }
}

/// Parse one SSE record into zero or more chunks
pub fn parse_record(record: &str) -> Vec<ChatCompletionChunk> {
    let mut chunks = Vec::new();

    for line in record.split('\n') {
        let Some(rest) = line.strip_prefix(DATA_PREFIX) else {
            continue;
        };
        let payload = rest.trim();
        if payload.is_empty() || payload == DONE_MARKER {
            continue;
        }

        match serde_json::from_str::<ChatCompletionChunk>(payload) {
            Ok(chunk) => chunks.push(chunk),
            Err(e) => {
                tracing::warn!("[GLM] Failed to parse streaming chunk: {}", e);
                tracing::debug!("[GLM] Offending payload: {}", payload);
            }
        }
    }

    chunks
}

async fn next_or_cancel<S>(
    stream: &mut S,
    cancel: Option<&CancellationToken>,
) -> AdapterResult<Option<S::Item>>
where
    S: Stream + Unpin,
{
    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(AdapterError::Cancelled),
            item = stream.next() => Ok(item),
        },
        None => Ok(stream.next().await),
    }
}

/// Decode a byte stream into a lazy stream of chunks
///
/// The byte source is owned by the returned stream and dropped with it, on
/// normal completion, on error and on cancellation alike.
pub fn decode_stream<S, B, E>(
    bytes: S,
    cancel: Option<CancellationToken>,
) -> impl Stream<Item = AdapterResult<ChatCompletionChunk>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Send,
    AdapterError: From<E>,
{
    async_stream::try_stream! {
        let mut bytes = Box::pin(bytes);
        let mut decoder = SseDecoder::new();
        let mut records: usize = 0;

        while let Some(item) = next_or_cancel(&mut bytes, cancel.as_ref()).await? {
            let data = item.map_err(AdapterError::from)?;
            for chunk in decoder.feed(data.as_ref()) {
                records += 1;
                yield chunk;
            }
        }

        for chunk in decoder.finish() {
            records += 1;
            yield chunk;
        }

        tracing::debug!("[GLM] Stream: byte source ended after {} chunks", records);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn text_of(chunk: &ChatCompletionChunk) -> Option<&str> {
        chunk.choices.first().and_then(|c| c.delta.content.as_deref())
    }

    #[test]
    fn test_decodes_complete_records() {
        let mut decoder = SseDecoder::new();
        let chunks = decoder.feed(
            b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n\n",
        );
        assert_eq!(chunks.len(), 2);
        assert_eq!(text_of(&chunks[0]), Some("a"));
        assert_eq!(text_of(&chunks[1]), Some("b"));
    }

    #[test]
    fn test_record_split_across_feeds() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: {\"choices\":[{\"delta\":").is_empty());
        assert!(decoder.feed(b"{\"content\":\"hi\"}}]}\n").is_empty());
        let chunks = decoder.feed(b"\n");
        assert_eq!(chunks.len(), 1);
        assert_eq!(text_of(&chunks[0]), Some("hi"));
    }

    #[test]
    fn test_multibyte_char_straddles_reads() {
        let payload = "data: {\"choices\":[{\"delta\":{\"content\":\"你好\"}}]}\n\n".as_bytes();
        // Split inside the first three-byte character
        let split = payload.iter().position(|b| *b >= 0x80).unwrap() + 1;

        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(&payload[..split]).is_empty());
        let chunks = decoder.feed(&payload[split..]);
        assert_eq!(chunks.len(), 1);
        assert_eq!(text_of(&chunks[0]), Some("你好"));
    }

    #[test]
    fn test_done_and_non_data_lines_ignored() {
        let mut decoder = SseDecoder::new();
        let chunks = decoder.feed(
            b": keep-alive\n\nevent: message\ndata: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n\ndata: [DONE]\n\n",
        );
        assert_eq!(chunks.len(), 1);
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_malformed_record_is_skipped() {
        let mut decoder = SseDecoder::new();
        let chunks = decoder.feed(
            b"data: {not json\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n\n",
        );
        assert_eq!(chunks.len(), 1);
        assert_eq!(text_of(&chunks[0]), Some("ok"));
    }

    #[test]
    fn test_tail_without_boundary_is_flushed() {
        let mut decoder = SseDecoder::new();
        assert!(decoder
            .feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}")
            .is_empty());
        let chunks = decoder.finish();
        assert_eq!(chunks.len(), 1);
        assert_eq!(text_of(&chunks[0]), Some("tail"));

        let mut blank = SseDecoder::new();
        blank.feed(b"\n  ");
        assert!(blank.finish().is_empty());
    }

    #[test]
    fn test_crlf_boundaries() {
        let mut decoder = SseDecoder::new();
        let chunks = decoder.feed(b"data: {\"id\":\"1\"}\r\n\r\ndata: {\"id\":\"2\"}\r");
        assert_eq!(chunks.len(), 1);
        let chunks = decoder.feed(b"\n\r\n");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_decode_stream_yields_chunks() {
        let parts: Vec<Result<Vec<u8>, AdapterError>> = vec![
            Ok(b"data: {\"id\":\"a\"}\n".to_vec()),
            Ok(b"\ndata: garbage\n\n".to_vec()),
            Ok(b"data: {\"id\":\"b\"}".to_vec()),
        ];
        let chunks: Vec<_> = decode_stream(stream::iter(parts), None).collect().await;
        let ids: Vec<_> = chunks
            .into_iter()
            .map(|c| c.unwrap().id.unwrap())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_decode_stream_propagates_read_error() {
        let parts: Vec<Result<Vec<u8>, AdapterError>> = vec![
            Ok(b"data: {\"id\":\"a\"}\n\n".to_vec()),
            Err(AdapterError::MissingBody),
        ];
        let results: Vec<_> = decode_stream(stream::iter(parts), None).collect().await;
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(AdapterError::MissingBody)));
    }

    #[tokio::test]
    async fn test_decode_stream_honors_cancellation() {
        let token = CancellationToken::new();
        token.cancel();
        let parts: Vec<Result<Vec<u8>, AdapterError>> =
            vec![Ok(b"data: {\"id\":\"a\"}\n\n".to_vec())];
        let results: Vec<_> = decode_stream(stream::iter(parts), Some(token)).collect().await;
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(AdapterError::Cancelled)));
    }
}
