use std::io::Write;

use log::{debug, trace};

use crate::configuration::types::StatusFilter;
use crate::error_handling::types::SinkError;

/// Marker line written in front of an entry flushed by the timeout sweep.
pub const TIMEOUT_MARKER: &str = "timeout";

/// Writes correlated pairs and timed-out entries to the current sink.
///
/// The sink is owned by the emitter and can be swapped at any time with
/// [`replace_sink`](Self::replace_sink). Every emission is flushed before
/// returning, and a failed write is reported to the caller.
pub struct Emitter {
    sink: Box<dyn Write + Send>,
    filter: StatusFilter,
}

impl Emitter {
    pub fn new(sink: Box<dyn Write + Send>, filter: StatusFilter) -> Self {
        Self { sink, filter }
    }

    pub fn filter(&self) -> &StatusFilter {
        &self.filter
    }

    /// Redirects all further output to `sink` and hands back the previous one.
    pub fn replace_sink(&mut self, sink: Box<dyn Write + Send>) -> Box<dyn Write + Send> {
        debug!("output sink replaced");
        std::mem::replace(&mut self.sink, sink)
    }

    /// Writes the request header, the response header and a blank line.
    ///
    /// Returns `false` without writing when the status filter rejects
    /// `status`.
    pub fn emit_pair(
        &mut self,
        request_header: &str,
        response_header: &str,
        status: u16,
    ) -> Result<bool, SinkError> {
        if !self.filter.allows(status) {
            trace!("pair with status {} filtered out", status);
            return Ok(false);
        }
        self.put(request_header)?;
        self.put(response_header)?;
        self.put("")?;
        self.sink.flush()?;
        Ok(true)
    }

    /// Writes an unmatched entry under the timeout marker. Never filtered.
    pub fn emit_timeout(&mut self, header: &str) -> Result<(), SinkError> {
        self.put(TIMEOUT_MARKER)?;
        self.put(header)?;
        self.sink.flush()?;
        Ok(())
    }

    /// Writes a single status line, such as the end-of-stream notice.
    pub fn emit_status(&mut self, line: &str) -> Result<(), SinkError> {
        self.put(line)?;
        self.sink.flush()?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), SinkError> {
        self.sink.flush()?;
        Ok(())
    }

    /// Writes `text`, adding a newline unless it already ends with one.
    fn put(&mut self, text: &str) -> Result<(), SinkError> {
        self.sink.write_all(text.as_bytes())?;
        if !text.ends_with('\n') {
            self.sink.write_all(b"\n")?;
        }
        Ok(())
    }
}

/// In-memory sink whose contents stay readable after it is handed to an
/// [`Emitter`].
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct SharedBuffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

#[cfg(test)]
impl SharedBuffer {
    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

#[cfg(test)]
impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
