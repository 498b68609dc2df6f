//! Line-level SSE handling for backend streams.

use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use gateway_core::{GatewayError, GatewayResult};
use tracing::warn;

use crate::google::wire::{GeminiErrorBody, GeminiResponse};

/// Prefix of SSE data lines
pub const DATA_PREFIX: &str = "data:";

/// Stream end marker some backends send
pub const DONE_MARKER: &str = "[DONE]";

/// Status assumed when an error line carries no code
const DEFAULT_ERROR_STATUS: u16 = 500;

/// Inspect the first non-blank line before anything reaches the client
///
/// A `data:` line means the stream started; it is stitched back in front of
/// the remaining lines. Anything else is the backend's error body.
///
/// # Errors
/// Returns `StreamInit` for an error body or an empty stream
pub async fn peek_stream<S>(mut lines: S) -> GatewayResult<BoxStream<'static, GatewayResult<String>>>
where
    S: Stream<Item = GatewayResult<String>> + Send + Unpin + 'static,
{
    loop {
        match lines.next().await {
            None => return Err(GatewayError::stream_init(502, "backend closed the stream without data")),
            Some(Err(e)) => return Err(e),
            Some(Ok(line)) if line.trim().is_empty() => continue,
            Some(Ok(line)) => {
                if line.trim_start().starts_with(DATA_PREFIX) {
                    return Ok(stream::once(async move { Ok(line) }).chain(lines).boxed());
                }
                return Err(parse_stream_error(&line));
            }
        }
    }
}

/// Build a `StreamInit` error from a non-SSE first line
pub fn parse_stream_error(body: &str) -> GatewayError {
    match serde_json::from_str::<GeminiErrorBody>(body) {
        Ok(parsed) => GatewayError::stream_init(
            parsed.error.code.unwrap_or(DEFAULT_ERROR_STATUS),
            parsed.error.message,
        ),
        Err(_) => {
            let excerpt: String = body.chars().take(200).collect();
            GatewayError::stream_init(DEFAULT_ERROR_STATUS, excerpt)
        }
    }
}

/// Decode one line after the stream has started
///
/// Blank lines, comments, non-data fields, `[DONE]` and undecodable JSON
/// yield `Ok(None)`.
///
/// # Errors
/// Returns `StreamInterrupted` when the backend sends an error object
pub fn decode_line(line: &str) -> GatewayResult<Option<GeminiResponse>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return Ok(None);
    }

    let Some(data) = line.strip_prefix(DATA_PREFIX) else {
        // A bare JSON line after the stream started is an error object
        if line.starts_with('{') {
            let err = parse_stream_error(line);
            return Err(GatewayError::stream_interrupted(err.to_string()));
        }
        return Ok(None);
    };

    let data = data.trim();
    if data.is_empty() || data == DONE_MARKER {
        return Ok(None);
    }

    match serde_json::from_str::<GeminiResponse>(data) {
        Ok(response) => Ok(Some(response)),
        Err(e) => {
            warn!(error = %e, "Skipping undecodable stream line");
            Ok(None)
        }
    }
}
