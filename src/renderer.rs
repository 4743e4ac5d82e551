use std::io::Write;

/// Receives the full response text accumulated so far, once per chunk.
///
/// Every call replaces what the previous call delivered; an empty snapshot
/// means a new submission has started.
pub trait ResponseRenderer {
    fn render(&mut self, snapshot: &str);

    /// Why the renderer can no longer display anything. Once this is set the
    /// submission stops reading the response.
    fn failure(&self) -> Option<String> {
        None
    }
}

impl<F> ResponseRenderer for F
where
    F: FnMut(&str),
{
    fn render(&mut self, snapshot: &str) {
        self(snapshot)
    }
}

/// Writes snapshots to a terminal-like sink. Because snapshots only grow
/// within one submission, only the unseen suffix is written.
pub struct TerminalRenderer<W: Write> {
    out: W,
    written: usize,
    failed: Option<std::io::Error>,
}

impl TerminalRenderer<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            written: 0,
            failed: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, snapshot: &str) -> std::io::Result<()> {
        // A shorter or diverging snapshot is a new response.
        if snapshot.len() < self.written || !snapshot.is_char_boundary(self.written) {
            if self.written > 0 {
                writeln!(self.out)?;
            }
            self.written = 0;
        }
        self.out.write_all(snapshot[self.written..].as_bytes())?;
        self.out.flush()?;
        self.written = snapshot.len();
        Ok(())
    }
}

impl<W: Write> ResponseRenderer for TerminalRenderer<W> {
    fn render(&mut self, snapshot: &str) {
        if self.failed.is_some() {
            return;
        }
        if let Err(e) = self.write(snapshot) {
            self.failed = Some(e);
        }
    }

    fn failure(&self) -> Option<String> {
        self.failed.as_ref().map(|e| e.to_string())
    }
}
