use log::{debug, trace};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use super::types::StreamSource;
use crate::error_handling::types::CaptureError;

const CHANNEL_DEPTH: usize = 256;

enum StreamEvent {
    Line(StreamSource, String),
    Closed(StreamSource),
}

/// Merges the two output channels of the capture subprocess into one
/// sequence of lines.
///
/// One reader task per channel reads whole lines, terminators included, and
/// forwards them as soon as they are available. [`next_line`](Self::next_line)
/// waits for whichever channel produces first and reports the end only once
/// both channels are closed. The reader tasks are aborted when the
/// multiplexer is dropped.
pub struct StreamMultiplexer {
    events: mpsc::Receiver<Result<StreamEvent, CaptureError>>,
    open: usize,
    readers: JoinSet<()>,
}

impl StreamMultiplexer {
    pub fn new<O, E>(stdout: O, stderr: E) -> Self
    where
        O: AsyncRead + Unpin + Send + 'static,
        E: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, events) = mpsc::channel(CHANNEL_DEPTH);
        let mut readers = JoinSet::new();
        readers.spawn(pump(StreamSource::Stdout, stdout, tx.clone()));
        readers.spawn(pump(StreamSource::Stderr, stderr, tx));
        Self {
            events,
            open: 2,
            readers,
        }
    }

    /// Next line from either channel, or `None` once both reached
    /// end-of-stream. Cancel safe.
    ///
    /// Errors
    /// - Returns [`CaptureError::StreamError`] for the first read failure on
    ///   either channel; the multiplexer should not be polled afterwards.
    pub async fn next_line(&mut self) -> Result<Option<(StreamSource, String)>, CaptureError> {
        while self.open > 0 {
            match self.events.recv().await {
                Some(Ok(StreamEvent::Line(source, line))) => return Ok(Some((source, line))),
                Some(Ok(StreamEvent::Closed(source))) => {
                    debug!("capture {} reached end-of-stream", source);
                    self.open -= 1;
                }
                Some(Err(e)) => return Err(e),
                None => {
                    debug!("capture readers stopped");
                    self.open = 0;
                }
            }
        }
        Ok(None)
    }

    /// Stops both reader tasks.
    pub fn shutdown(&mut self) {
        self.readers.abort_all();
        self.events.close();
    }
}

async fn pump<R>(
    source: StreamSource,
    reader: R,
    tx: mpsc::Sender<Result<StreamEvent, CaptureError>>,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let event = match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                let _ = tx.send(Ok(StreamEvent::Closed(source))).await;
                return;
            }
            Ok(n) => {
                trace!("[{}] read {} bytes", source, n);
                Ok(StreamEvent::Line(
                    source,
                    String::from_utf8_lossy(&buf).into_owned(),
                ))
            }
            Err(error) => {
                let _ = tx.send(Err(CaptureError::StreamError { source, error })).await;
                return;
            }
        };
        if tx.send(event).await.is_err() {
            return;
        }
    }
}
