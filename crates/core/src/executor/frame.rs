//! Frames of a `JSONEachRowWithProgress` response and the reducer that folds
//! them into a result.
//!
//! Every line of the body is one JSON object with exactly one key naming its
//! kind, e.g. `{"progress":{...}}` or `{"row":{...}}`.

use super::{backend_error, ProgressStatistics};
use chaingate_error::{ChainGateError, ErrorCode, Result};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use thiserror::Error;

/// Cumulative counters reported by the backend.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProgressCounters {
    #[serde(default, deserialize_with = "flexible_u64")]
    pub read_rows: u64,
    #[serde(default, deserialize_with = "flexible_u64")]
    pub read_bytes: u64,
    #[serde(default, deserialize_with = "flexible_u64")]
    pub elapsed_ns: u64,
}

/// The backend quotes 64-bit integers by default; accept both forms.
fn flexible_u64<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u64),
        String(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum WireFrame {
    Progress(ProgressCounters),
    Row(Map<String, Value>),
    RowsBeforeLimitAtLeast(#[serde(deserialize_with = "flexible_u64")] u64),
    Exception(String),
    Meta(Value),
    Totals(Value),
}

/// One decoded line of the response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Progress(ProgressCounters),
    Row(Map<String, Value>),
    /// Total matching rows before LIMIT was applied
    RowsBeforeLimit(u64),
    /// Error raised by the backend after the response started
    Exception(String),
    /// Schema or totals; carries nothing the reducer needs
    Informational,
    Malformed(String),
}

impl Frame {
    pub fn decode(line: &[u8]) -> Frame {
        match serde_json::from_slice::<WireFrame>(line) {
            Ok(WireFrame::Progress(counters)) => Frame::Progress(counters),
            Ok(WireFrame::Row(row)) => Frame::Row(row),
            Ok(WireFrame::RowsBeforeLimitAtLeast(n)) => Frame::RowsBeforeLimit(n),
            Ok(WireFrame::Exception(message)) => Frame::Exception(message),
            Ok(WireFrame::Meta(_)) | Ok(WireFrame::Totals(_)) => Frame::Informational,
            Err(e) => Frame::Malformed(e.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("malformed frame at line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

impl From<StreamError> for ChainGateError {
    fn from(err: StreamError) -> Self {
        ChainGateError::new(ErrorCode::BadDatabaseResponse, err.to_string())
    }
}

/// Output of a fully consumed response stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReducedStream {
    pub data: Vec<Value>,
    pub statistics: ProgressStatistics,
    pub rows_before_limit_at_least: Option<u64>,
}

/// Folds response chunks into rows and statistics, in arrival order.
#[derive(Debug, Default)]
pub struct FrameReducer {
    pending: Vec<u8>,
    /// Bytes of `pending` already known to hold no newline
    scanned: usize,
    lines: usize,
    reduced: ReducedStream,
}

impl FrameReducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of the body. Chunk boundaries need not align with lines.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<()> {
        self.pending.extend_from_slice(chunk);
        while let Some(found) = self.pending[self.scanned..].iter().position(|b| *b == b'\n') {
            let pos = self.scanned + found;
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.scanned = 0;
            self.apply_line(&line[..pos])?;
        }
        self.scanned = self.pending.len();
        Ok(())
    }

    pub fn finish(mut self) -> Result<ReducedStream> {
        let rest = std::mem::take(&mut self.pending);
        self.scanned = 0;
        self.apply_line(&rest)?;
        Ok(self.reduced)
    }

    fn apply_line(&mut self, line: &[u8]) -> Result<()> {
        if line.iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }
        self.lines += 1;
        self.apply(Frame::decode(line))
    }

    pub fn apply(&mut self, frame: Frame) -> Result<()> {
        match frame {
            // counters are cumulative: the latest snapshot replaces the previous one
            Frame::Progress(counters) => {
                self.reduced.statistics = ProgressStatistics::from(&counters);
            }
            Frame::Row(row) => self.reduced.data.push(Value::Object(row)),
            Frame::RowsBeforeLimit(n) => self.reduced.rows_before_limit_at_least = Some(n),
            Frame::Exception(message) => return Err(backend_error(&message, None, None)),
            Frame::Informational => {}
            Frame::Malformed(reason) => {
                return Err(StreamError::Malformed {
                    line: self.lines,
                    reason,
                }
                .into())
            }
        }
        Ok(())
    }
}

/// Consume a chunked body to the end, aborting on the first bad frame.
pub async fn reduce_stream<S, B, E>(stream: S) -> Result<ReducedStream>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<ChainGateError>,
{
    let mut reducer = FrameReducer::new();
    let mut stream = std::pin::pin!(stream);
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(Into::into)?;
        reducer.feed(chunk.as_ref())?;
    }
    reducer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn progress(rows: u64, bytes: u64, elapsed_ns: u64) -> String {
        format!(
            r#"{{"progress":{{"read_rows":"{}","read_bytes":"{}","total_rows_to_read":"0","elapsed_ns":"{}"}}}}"#,
            rows, bytes, elapsed_ns
        )
    }

    fn row(i: u64) -> String {
        json!({ "row": { "i": i, "symbol": format!("T{}", i) } }).to_string()
    }

    fn chunks(lines: &[String]) -> Vec<std::result::Result<Vec<u8>, ChainGateError>> {
        vec![Ok(lines.join("\n").into_bytes())]
    }

    #[test]
    fn test_decode_frame_kinds() {
        assert_eq!(
            Frame::decode(progress(10, 80, 5).as_bytes()),
            Frame::Progress(ProgressCounters {
                read_rows: 10,
                read_bytes: 80,
                elapsed_ns: 5
            })
        );
        assert!(matches!(Frame::decode(row(1).as_bytes()), Frame::Row(_)));
        assert_eq!(
            Frame::decode(br#"{"rows_before_limit_at_least":42}"#),
            Frame::RowsBeforeLimit(42)
        );
        assert_eq!(
            Frame::decode(br#"{"meta":[{"name":"i","type":"UInt64"}]}"#),
            Frame::Informational
        );
        assert!(matches!(Frame::decode(b"{\"bogus\":1}"), Frame::Malformed(_)));
        assert!(matches!(Frame::decode(b"not json"), Frame::Malformed(_)));
        assert!(matches!(Frame::decode(br#"{"row":[1,2]}"#), Frame::Malformed(_)));
    }

    #[tokio::test]
    async fn test_progress_is_last_wins_and_rows_keep_order() {
        let mut lines = vec![progress(10, 100, 1_000), progress(50, 400, 2_000_000_000)];
        lines.extend((0..5).map(row));
        let reduced = reduce_stream(futures::stream::iter(chunks(&lines)))
            .await
            .unwrap();

        assert_eq!(reduced.statistics.rows_read, 50);
        assert_eq!(reduced.statistics.bytes_read, 400);
        assert_eq!(reduced.statistics.elapsed, 2.0);
        assert_eq!(reduced.data.len(), 5);
        let order: Vec<u64> = reduced
            .data
            .iter()
            .map(|r| r["i"].as_u64().unwrap())
            .collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_lines_split_across_chunks() {
        let body = format!("{}\n{}\n{}\n", row(0), progress(3, 30, 10), row(1));
        let bytes = body.into_bytes();
        let pieces: Vec<std::result::Result<Vec<u8>, ChainGateError>> =
            bytes.chunks(7).map(|c| Ok(c.to_vec())).collect();
        let reduced = reduce_stream(futures::stream::iter(pieces)).await.unwrap();
        assert_eq!(reduced.data.len(), 2);
        assert_eq!(reduced.statistics.rows_read, 3);
    }

    #[test]
    fn test_long_row_fed_bytewise_scans_only_new_bytes() {
        let long = json!({ "row": { "data": "x".repeat(4096) } }).to_string();
        let body = format!("{}\n{}", long, row(1));

        let mut reducer = FrameReducer::new();
        for (i, byte) in body.as_bytes().iter().enumerate() {
            reducer.feed(std::slice::from_ref(byte)).unwrap();
            assert_eq!(reducer.scanned, reducer.pending.len(), "after byte {}", i);
        }
        assert_eq!(reducer.pending.len(), row(1).len());

        let reduced = reducer.finish().unwrap();
        assert_eq!(reduced.data.len(), 2);
        assert_eq!(reduced.data[0]["data"].as_str().map(str::len), Some(4096));
        assert_eq!(reduced.data[1]["i"], 1);
    }

    #[tokio::test]
    async fn test_malformed_frame_aborts() {
        let lines = vec![row(0), "{\"row\":".to_string(), row(1)];
        let err = reduce_stream(futures::stream::iter(chunks(&lines)))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::BadDatabaseResponse);
        assert!(err.message.contains("line 2"));
    }

    #[tokio::test]
    async fn test_exception_frame_aborts() {
        let lines = vec![
            row(0),
            json!({"exception": "Code: 241. DB::Exception: Memory limit exceeded"}).to_string(),
        ];
        let err = reduce_stream(futures::stream::iter(chunks(&lines)))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::BadDatabaseResponse);
        assert!(err.message.contains("Memory limit exceeded"));
    }

    #[tokio::test]
    async fn test_rows_before_limit_side_value() {
        let lines = vec![row(0), r#"{"rows_before_limit_at_least":"1234"}"#.to_string()];
        let reduced = reduce_stream(futures::stream::iter(chunks(&lines)))
            .await
            .unwrap();
        assert_eq!(reduced.rows_before_limit_at_least, Some(1234));
    }
}
