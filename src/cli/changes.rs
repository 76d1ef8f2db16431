//! JSON-lines sink for arc changes emitted during contraction

use butterfly_ch::{ArcChange, ArcListener, VertexId};
use std::io::{self, Write};

/// Writes one JSON object per arc change. The first write error is kept
/// and every later change is dropped.
pub struct JsonLinesListener<W: Write> {
    out: W,
    written: usize,
    error: Option<io::Error>,
}

impl<W: Write> JsonLinesListener<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            written: 0,
            error: None,
        }
    }

    fn write(&mut self, change: ArcChange) {
        if self.error.is_some() {
            return;
        }
        let result = serde_json::to_writer(&mut self.out, &change)
            .map_err(io::Error::from)
            .and_then(|_| self.out.write_all(b"\n"));
        match result {
            Ok(()) => self.written += 1,
            Err(e) => self.error = Some(e),
        }
    }

    /// Flush and report the number of changes written
    pub fn finish(mut self) -> io::Result<usize> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        self.out.flush()?;
        Ok(self.written)
    }
}

impl<W: Write> ArcListener for JsonLinesListener<W> {
    fn on_arc_added(&mut self, from: VertexId, to: VertexId) {
        self.write(ArcChange::Added { from, to });
    }

    fn on_arc_removed(&mut self, from: VertexId, to: VertexId) {
        self.write(ArcChange::Removed { from, to });
    }
}
