use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Default cap for one line, terminator included.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Splits a buffered byte reader into newline-terminated lines.
///
/// The reader is owned until [`LineSource::close`] or drop. Line terminators
/// (`\n` and an optional preceding `\r`) are stripped.
#[derive(Debug)]
pub struct LineSource<R> {
    reader: Option<R>,
    max_line_length: usize,
}

impl<R> LineSource<R>
where
    R: AsyncBufRead + Unpin,
{
    /// Wraps `reader` with [`DEFAULT_MAX_LINE_LENGTH`].
    pub fn new(reader: R) -> Self {
        Self {
            reader: Some(reader),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }

    /// Sets the longest accepted line, terminator included. Zero is treated
    /// as one byte.
    pub fn set_max_line_length(&mut self, max_line_length: usize) {
        self.max_line_length = max_line_length.max(1);
    }

    /// Reads the next line.
    ///
    /// Returns `Ok(None)` at end of stream and an empty buffer for keep-alive
    /// lines. A released source reports `NotConnected`; a line longer than the
    /// cap reports `InvalidData`.
    pub async fn read_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        let max_line_length = self.max_line_length;
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "line source closed"))?;

        let mut line = Vec::new();
        let read = reader
            .take(max_line_length as u64)
            .read_until(b'\n', &mut line)
            .await?;
        if read == 0 {
            return Ok(None);
        }
        if read == max_line_length && line.last() != Some(&b'\n') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("line exceeds {max_line_length} bytes"),
            ));
        }
        if line.last() == Some(&b'\n') {
            line.pop();
        }
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Ok(Some(line))
    }

    /// Drops the underlying reader. Returns true only for the call that
    /// actually released it.
    pub fn close(&mut self) -> bool {
        self.reader.take().is_some()
    }

    /// Returns true once the reader has been released.
    pub fn is_closed(&self) -> bool {
        self.reader.is_none()
    }
}
