/// Incremental splitter for `text/event-stream` bodies.
///
/// Vendor chunks arrive on arbitrary byte boundaries; this buffers partial
/// lines and hands back the payload of each completed `data:` line. Other
/// SSE fields (comments, event names) are skipped, since the
/// OpenAI-compatible endpoints both chat vendors expose only use `data:`.
#[derive(Debug, Default)]
pub struct DataFrames {
    buffer: String,
}

impl DataFrames {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));

        let mut frames = Vec::new();
        while let Some(position) = self.buffer.find('\n') {
            let mut line = self.buffer[..position].to_string();
            self.buffer.drain(..=position);

            if line.ends_with('\r') {
                line.pop();
            }

            if line.is_empty() {
                continue;
            }

            if let Some(data) = line.strip_prefix("data:") {
                frames.push(data.trim().to_string());
            }
        }

        frames
    }
}
