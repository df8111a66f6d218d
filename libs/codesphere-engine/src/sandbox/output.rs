// Bounded capture of interleaved stdout/stderr

/// Accumulates raw bytes up to a fixed cap.
///
/// Bytes past the cap are counted and dropped, so a submission flooding its
/// output costs the engine no more than `limit` bytes of memory.
#[derive(Debug)]
pub struct OutputBuffer {
    bytes: Vec<u8>,
    limit: usize,
    dropped: usize,
}

impl OutputBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            bytes: Vec::new(),
            limit,
            dropped: 0,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        let room = self.limit.saturating_sub(self.bytes.len());
        let take = room.min(chunk.len());
        self.bytes.extend_from_slice(&chunk[..take]);
        self.dropped += chunk.len() - take;
    }

    pub fn is_truncated(&self) -> bool {
        self.dropped > 0
    }

    /// Decode as (lossy) UTF-8, appending a marker when output was cut
    pub fn into_text(self) -> String {
        let mut text = String::from_utf8_lossy(&self.bytes).into_owned();
        if self.dropped > 0 {
            text.push_str(&format!(
                "\n[output truncated: {} bytes over the {} byte limit]",
                self.dropped, self.limit
            ));
        }
        text
    }
}
