//! Output handling for native print opcodes.
//!
//! The interpreter never writes to the process stdout directly; it goes
//! through an [`Io`] sink so hosts and tests can capture program output.

use std::io::Write;

enum Sink {
    Stdout,
    Capture(Vec<u8>),
}

/// Stdout sink with an optional capture mode.
pub struct Io {
    sink: Sink,
}

impl Io {
    /// Write through to the process stdout.
    pub fn passthrough() -> Self {
        Self { sink: Sink::Stdout }
    }

    /// Accumulate output in memory.
    pub fn capture() -> Self {
        Self {
            sink: Sink::Capture(Vec::new()),
        }
    }

    pub fn write(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        match &mut self.sink {
            Sink::Stdout => {
                let stdout = std::io::stdout();
                let mut lock = stdout.lock();
                lock.write_all(bytes)?;
                lock.flush()
            }
            Sink::Capture(buf) => {
                buf.extend_from_slice(bytes);
                Ok(())
            }
        }
    }

    /// Drain captured output. Empty in passthrough mode.
    pub fn take_output(&mut self) -> Vec<u8> {
        match &mut self.sink {
            Sink::Stdout => Vec::new(),
            Sink::Capture(buf) => std::mem::take(buf),
        }
    }

    /// Captured output as a lossy string, without draining.
    pub fn output_str(&self) -> String {
        match &self.sink {
            Sink::Stdout => String::new(),
            Sink::Capture(buf) => String::from_utf8_lossy(buf).into_owned(),
        }
    }
}

impl Default for Io {
    fn default() -> Self {
        Self::passthrough()
    }
}
