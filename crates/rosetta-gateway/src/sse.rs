//! Incremental SSE data-line decoder.
//!
//! The raw-SSE transport consumes a byte stream with no message-boundary
//! guarantees: a provider write may end mid-line, and a single logical
//! line may span several network reads. This decoder owns that
//! reassembly:
//!
//! - buffers arbitrary byte chunks, splitting on `\n` (trailing `\r`
//!   stripped) and carrying the incomplete tail forward into the next read
//! - yields the payload of each `data:` line (marker with or without the
//!   following space)
//! - treats the literal `data: [DONE]` payload as end-of-stream — nothing
//!   after it is yielded
//! - skips blank lines, `:` comments, other SSE fields, and lines that are
//!   not valid UTF-8
//! - flushes a trailing unterminated `data:` line when the byte stream
//!   ends without the sentinel
//!
//! No payload is ever lost or duplicated regardless of how the bytes were
//! chunked. JSON decoding of the payloads belongs to the caller.

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use tracing::debug;

use crate::error::{GatewayError, GatewayResult};

/// Sentinel payload signalling normal end-of-stream.
const TERMINATOR: &str = "[DONE]";

/// What one decoded line means.
enum DataLine {
    /// A `data:` payload to yield.
    Payload(String),
    /// The `[DONE]` sentinel.
    Terminator,
    /// Anything else (blank, comment, other field, empty payload).
    Skip,
}

/// Decode `data:` payloads from a chunked byte stream.
///
/// Read failures surface as a single `Err` item, after which the stream
/// ends. Dropping the returned stream drops the byte stream with it,
/// closing the underlying connection.
pub fn decode_data_lines<S, E>(byte_stream: S) -> impl Stream<Item = GatewayResult<String>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin + 'static,
    E: std::fmt::Display,
{
    futures::stream::unfold(
        (byte_stream, BytesMut::with_capacity(8192), false),
        |(mut stream, mut buffer, done)| async move {
            if done {
                return None;
            }

            loop {
                // Drain complete lines already in the buffer.
                if let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                    let mut line_bytes = buffer.split_to(newline_pos + 1);
                    line_bytes.truncate(line_bytes.len() - 1);
                    if line_bytes.last() == Some(&b'\r') {
                        line_bytes.truncate(line_bytes.len() - 1);
                    }

                    let Ok(line) = std::str::from_utf8(&line_bytes) else {
                        debug!("skipping non-UTF-8 line in event stream");
                        continue;
                    };

                    match classify_line(line) {
                        DataLine::Payload(payload) => {
                            return Some((Ok(payload), (stream, buffer, false)));
                        }
                        DataLine::Terminator => return None,
                        DataLine::Skip => continue,
                    }
                }

                // Need more bytes.
                match stream.next().await {
                    Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                    Some(Err(e)) => {
                        let err = GatewayError::Transport {
                            message: format!("stream read failed: {e}"),
                        };
                        return Some((Err(err), (stream, buffer, true)));
                    }
                    None => {
                        // Stream ended without the sentinel: flush a trailing
                        // unterminated data line, if any.
                        if !buffer.is_empty() {
                            if let Ok(line) = std::str::from_utf8(&buffer) {
                                if let DataLine::Payload(payload) = classify_line(line.trim()) {
                                    buffer.clear();
                                    return Some((Ok(payload), (stream, buffer, true)));
                                }
                            }
                        }
                        return None;
                    }
                }
            }
        },
    )
}

/// Classify one decoded line against the wire contract.
fn classify_line(line: &str) -> DataLine {
    let trimmed = line.trim();

    if trimmed.is_empty() || trimmed.starts_with(':') {
        return DataLine::Skip;
    }

    let Some(data) = trimmed
        .strip_prefix("data: ")
        .or_else(|| trimmed.strip_prefix("data:"))
    else {
        return DataLine::Skip;
    };

    let data = data.trim();
    if data == TERMINATOR {
        return DataLine::Terminator;
    }
    if data.is_empty() {
        return DataLine::Skip;
    }

    DataLine::Payload(data.to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    type ChunkResult = Result<Bytes, std::io::Error>;

    fn chunks(parts: &[&str]) -> Vec<ChunkResult> {
        parts.iter().map(|p| Ok(Bytes::from((*p).to_string()))).collect()
    }

    async fn decode(parts: &[&str]) -> Vec<String> {
        decode_data_lines(futures::stream::iter(chunks(parts)))
            .map(Result::unwrap)
            .collect()
            .await
    }

    // ── reassembly ──

    #[tokio::test]
    async fn single_chunk_single_event() {
        let events = decode(&["data: {\"a\":1}\n\n"]).await;
        assert_eq!(events, ["{\"a\":1}"]);
    }

    #[tokio::test]
    async fn multiple_events_in_one_chunk() {
        let events = decode(&["data: {\"a\":1}\n\ndata: {\"b\":2}\n\n"]).await;
        assert_eq!(events, ["{\"a\":1}", "{\"b\":2}"]);
    }

    #[tokio::test]
    async fn line_split_across_reads() {
        let events = decode(&["data: {\"par", "tial\":true}\n\n"]).await;
        assert_eq!(events, ["{\"partial\":true}"]);
    }

    #[tokio::test]
    async fn byte_at_a_time_delivery() {
        let wire = "data: {\"a\":1}\n\ndata: {\"b\":2}\n\ndata: [DONE]\n\n";
        let parts: Vec<String> = wire.chars().map(String::from).collect();
        let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
        let events = decode(&refs).await;
        assert_eq!(events, ["{\"a\":1}", "{\"b\":2}"]);
    }

    #[tokio::test]
    async fn marker_split_across_reads() {
        let events = decode(&["da", "ta", ": {\"x\":3}\n\n"]).await;
        assert_eq!(events, ["{\"x\":3}"]);
    }

    // ── terminator ──

    #[tokio::test]
    async fn terminator_ends_stream() {
        let events = decode(&["data: {\"a\":1}\n\ndata: [DONE]\n\n"]).await;
        assert_eq!(events, ["{\"a\":1}"]);
    }

    #[tokio::test]
    async fn nothing_after_terminator_is_yielded() {
        let events = decode(&["data: [DONE]\n\ndata: {\"late\":true}\n\n"]).await;
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn terminator_without_space() {
        let events = decode(&["data:[DONE]\n"]).await;
        assert!(events.is_empty());
    }

    // ── line filtering ──

    #[tokio::test]
    async fn skips_comments_blanks_and_other_fields() {
        let events =
            decode(&[": keepalive\n\nevent: ping\nid: 4\ndata: {\"v\":1}\n\n"]).await;
        assert_eq!(events, ["{\"v\":1}"]);
    }

    #[tokio::test]
    async fn marker_without_space_is_accepted() {
        let events = decode(&["data:{\"tight\":true}\n"]).await;
        assert_eq!(events, ["{\"tight\":true}"]);
    }

    #[tokio::test]
    async fn empty_data_lines_are_skipped() {
        let events = decode(&["data: \n", "data:\n", "data: {\"v\":2}\n"]).await;
        assert_eq!(events, ["{\"v\":2}"]);
    }

    #[tokio::test]
    async fn crlf_lines_are_stripped() {
        let events = decode(&["data: {\"cr\":true}\r\n\r\n"]).await;
        assert_eq!(events, ["{\"cr\":true}"]);
    }

    #[tokio::test]
    async fn invalid_utf8_line_is_skipped() {
        let parts: Vec<ChunkResult> = vec![
            Ok(Bytes::from_static(b"data: {\"ok\":1}\n\xff\xfe\ndata: {\"ok\":2}\n")),
        ];
        let events: Vec<String> = decode_data_lines(futures::stream::iter(parts))
            .map(Result::unwrap)
            .collect()
            .await;
        assert_eq!(events, ["{\"ok\":1}", "{\"ok\":2}"]);
    }

    // ── stream end ──

    #[tokio::test]
    async fn trailing_unterminated_line_is_flushed() {
        let events = decode(&["data: {\"tail\":true}"]).await;
        assert_eq!(events, ["{\"tail\":true}"]);
    }

    #[tokio::test]
    async fn empty_stream_yields_nothing() {
        let events = decode(&[]).await;
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn read_error_surfaces_once_then_ends() {
        let parts: Vec<ChunkResult> = vec![
            Ok(Bytes::from_static(b"data: {\"first\":1}\n")),
            Err(std::io::Error::other("connection reset")),
        ];
        let items: Vec<GatewayResult<String>> =
            decode_data_lines(futures::stream::iter(parts)).collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "{\"first\":1}");
        let err = items[1].as_ref().unwrap_err();
        assert_eq!(err.category(), "transport");
        assert!(err.to_string().contains("connection reset"));
    }

    // ── split-invariance property ──

    proptest::proptest! {
        #[test]
        fn arbitrary_splits_decode_identically(
            first in 0usize..46,
            second in 0usize..46,
        ) {
            let wire = "data: {\"a\":1}\n\ndata: {\"b\":\"xy\"}\n\ndata: [DONE]\n\n";
            proptest::prop_assume!(wire.len() >= 46);
            let (lo, hi) = if first <= second { (first, second) } else { (second, first) };

            let whole = futures::executor::block_on(decode(&[wire]));
            let parts = [&wire[..lo], &wire[lo..hi], &wire[hi..]];
            let split = futures::executor::block_on(decode(&parts));

            proptest::prop_assert_eq!(whole, split);
        }
    }
}
