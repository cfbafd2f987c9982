//! Incremental decoder for `text/event-stream` chat-completion bodies
//!
//! Network chunks do not respect line boundaries, so bytes are buffered until
//! a full line is available. `\n` never occurs inside a multi-byte UTF-8
//! sequence, which makes per-line decoding safe for CJK text.

use reqwest::StatusCode;

use crate::error::mapping::map_provider_error;
use crate::error::{ErrorContext, PipelineError, Result};

use super::models::ChatCompletionChunk;

/// One decoded event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// A non-empty text delta
    Delta(String),
    /// The `[DONE]` terminator
    Done,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    service: String,
    done: bool,
}

impl SseDecoder {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            buffer: Vec::new(),
            service: service.into(),
            done: false,
        }
    }

    /// Whether the `[DONE]` terminator has been seen
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed raw bytes and return every frame completed by them
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<SseFrame>> {
        self.buffer.extend_from_slice(bytes);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(frame) = self.decode_line(&line)? {
                frames.push(frame);
            }
            if self.done {
                self.buffer.clear();
                break;
            }
        }
        Ok(frames)
    }

    /// Decode whatever is left once the body has ended without a newline
    pub fn finish(&mut self) -> Result<Vec<SseFrame>> {
        if self.done || self.buffer.is_empty() {
            return Ok(Vec::new());
        }
        let line = std::mem::take(&mut self.buffer);
        Ok(self.decode_line(&line)?.into_iter().collect())
    }

    fn decode_line(&mut self, raw: &[u8]) -> Result<Option<SseFrame>> {
        if self.done {
            return Ok(None);
        }

        let line = String::from_utf8_lossy(raw);
        let line = line.trim_end_matches(['\n', '\r']);

        // Blank separators, `:` keep-alive comments and `event:`/`id:` fields
        let Some(payload) = line.strip_prefix("data:") else {
            return Ok(None);
        };
        let payload = payload.trim();

        if payload.is_empty() {
            return Ok(None);
        }
        if payload == "[DONE]" {
            self.done = true;
            return Ok(Some(SseFrame::Done));
        }

        let chunk: ChatCompletionChunk = serde_json::from_str(payload).map_err(|e| {
            PipelineError::parsing(format!("Malformed stream chunk: {}", e))
                .with_context(ErrorContext::for_service(self.service.clone()))
        })?;

        if let Some(error) = chunk.error.as_ref() {
            let mut context = ErrorContext::for_service(self.service.clone());
            let envelope = serde_json::json!({ "error": error });
            let status = error
                .get("code")
                .and_then(|c| c.as_u64())
                .and_then(|c| u16::try_from(c).ok())
                .and_then(|c| StatusCode::from_u16(c).ok())
                .unwrap_or(StatusCode::BAD_GATEWAY);
            let err = map_provider_error(status, &envelope, &mut context);
            return Err(err.with_context(context));
        }

        Ok(chunk
            .delta_text()
            .filter(|text| !text.is_empty())
            .map(|text| SseFrame::Delta(text.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(content: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"index": 0, "delta": {"content": content}}]})
        )
    }

    #[test]
    fn test_frames_split_across_chunks() {
        let body = format!("{}{}data: [DONE]\n\n", data("第一"), data("题"));
        let bytes = body.as_bytes();
        let (a, b) = bytes.split_at(7);

        let mut decoder = SseDecoder::new("test");
        let mut frames = decoder.feed(a).unwrap();
        frames.extend(decoder.feed(b).unwrap());

        assert_eq!(
            frames,
            vec![
                SseFrame::Delta("第一".to_string()),
                SseFrame::Delta("题".to_string()),
                SseFrame::Done
            ]
        );
        assert!(decoder.is_done());
    }

    #[test]
    fn test_skips_comments_and_empty_deltas() {
        let body = format!(": keep-alive\r\n\r\n{}{}", data(""), data("A"));
        let mut decoder = SseDecoder::new("test");
        let frames = decoder.feed(body.as_bytes()).unwrap();
        assert_eq!(frames, vec![SseFrame::Delta("A".to_string())]);
    }

    #[test]
    fn test_inline_error_payload() {
        let body = "data: {\"error\": {\"message\": \"quota exhausted\", \"code\": 429}}\n\n";
        let mut decoder = SseDecoder::new("openrouter");
        let err = decoder.feed(body.as_bytes()).unwrap_err();
        assert!(matches!(err.root(), PipelineError::RateLimit(_)));
    }

    #[test]
    fn test_trailing_line_without_newline() {
        let body = data("tail");
        let trimmed = body.trim_end();
        let mut decoder = SseDecoder::new("test");
        assert!(decoder.feed(trimmed.as_bytes()).unwrap().is_empty());
        assert_eq!(
            decoder.finish().unwrap(),
            vec![SseFrame::Delta("tail".to_string())]
        );
    }
}
