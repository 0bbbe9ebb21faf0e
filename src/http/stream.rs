use async_stream::stream;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde_json::{Value, json};

use crate::sdk::{ChunkStream, StreamChunk};

/// Serialize normalized chat chunks into the `text/event-stream` frames the
/// front end consumes.
///
/// Every stream closes with a `done` frame — after a clean end and after an
/// `error` frame alike — so clients stop reading on a single condition.
/// Dropping the returned stream (client disconnect) drops the vendor stream
/// with it, which cancels the upstream read.
pub fn sse_frames(mut chunks: ChunkStream, model: String) -> impl Stream<Item = Bytes> + Send {
    stream! {
        while let Some(chunk) = chunks.next().await {
            match chunk {
                StreamChunk::Thinking(content) => {
                    yield frame(json!({"type": "thinking", "content": content, "model": model}));
                }
                StreamChunk::AnswerStart => {
                    yield frame(json!({"type": "answer_start", "model": model}));
                }
                StreamChunk::Content(content) => {
                    yield frame(json!({"type": "content", "content": content, "model": model}));
                }
                StreamChunk::Usage(usage) => {
                    yield frame(json!({"type": "usage", "usage": usage, "model": model}));
                }
                StreamChunk::Error(error) => {
                    yield frame(json!({"type": "error", "error": error, "model": model}));
                    yield frame(json!({"type": "done", "model": model}));
                    return;
                }
                StreamChunk::Done => {
                    yield frame(json!({"type": "done", "model": model}));
                    return;
                }
            }
        }

        yield frame(json!({"type": "done", "model": model}));
    }
}

/// A stream that only reports a failure; used when the vendor call failed
/// before any chunk could be produced but SSE headers were already promised
/// to the client.
pub fn error_only(message: String) -> ChunkStream {
    futures_util::stream::iter([StreamChunk::Error(message)]).boxed()
}

fn frame(value: Value) -> Bytes {
    Bytes::from(format!("data: {value}\n\n"))
}
