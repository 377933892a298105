//! Capture-stream correlation engine.
//!
//! `CaptureEngine` is the single-threaded core that turns raw capture text
//! into log output. Each call to [`CaptureEngine::feed`] runs one processing
//! cycle:
//!
//! 1. entries older than the timeout are flushed as timeouts;
//! 2. the text is appended to the [`FrameExtractor`] buffer and every
//!    complete request/response frame is taken out;
//! 3. each frame is classified into a pending request or response and
//!    inserted into the [`CorrelationStore`];
//! 4. after every insertion the store is correlated and matching pairs are
//!    written through the [`Emitter`];
//! 5. finally, the timeout sweep runs again.
//!
//! Correlating after every frame, rather than once per chunk, makes the
//! output independent of how the input was split into chunks.
//!
//! Minimal usage
//! ```
//! use chrono::{Duration, Utc};
//! use hdrlog::configuration::StatusFilter;
//! use hdrlog::configuration::SeqAnchor;
//! use hdrlog::data_capture::CaptureEngine;
//! use hdrlog::output::Emitter;
//!
//! let emitter = Emitter::new(Box::new(std::io::sink()), StatusFilter::All);
//! let mut engine = CaptureEngine::new(emitter, SeqAnchor::Start, Duration::seconds(300));
//!
//! let now = Utc::now();
//! engine.feed("12:00:00.000001 IP a.1 > b.80: seq 10:20, ack 1\n", now)?;
//! engine.feed("GET /x HTTP/1.1\r\n\r\n", now)?;
//! assert_eq!(engine.pending_requests().len(), 1);
//!
//! engine.feed("12:00:00.000002 IP b.80 > a.1: seq 1:9, ack 10\n", now)?;
//! engine.feed("HTTP/1.1 200 OK\r\n\r\n", now)?;
//! assert!(engine.pending_requests().is_empty());
//! assert!(engine.pending_responses().is_empty());
//! # Ok::<(), hdrlog::error_handling::SinkError>(())
//! ```

use std::io::Write;

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, trace};

use super::classifier::{Classified, Classifier};
use super::frame_extractor::FrameExtractor;
use crate::configuration::config::Config;
use crate::configuration::types::SeqAnchor;
use crate::correlation::pending::{PendingRequest, PendingResponse};
use crate::correlation::store::CorrelationStore;
use crate::error_handling::types::SinkError;
use crate::output::emitter::Emitter;

/// Status line written once both capture channels reached end-of-stream.
pub const END_OF_STREAM_NOTICE: &str = "capture stream ended";

/// Running counters, reported when the engine shuts down.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    pub frames: u64,
    pub pairs_written: u64,
    pub pairs_filtered: u64,
    pub timeouts: u64,
}

pub struct CaptureEngine {
    extractor: FrameExtractor,
    classifier: Classifier,
    store: CorrelationStore,
    emitter: Emitter,
    timeout: Duration,
    stats: EngineStats,
}

impl CaptureEngine {
    pub fn new(emitter: Emitter, anchor: SeqAnchor, timeout: Duration) -> Self {
        debug!(
            "CaptureEngine created (timeout={}s, filter={})",
            timeout.num_seconds(),
            emitter.filter()
        );
        Self {
            extractor: FrameExtractor::new(),
            classifier: Classifier::new(anchor),
            store: CorrelationStore::new(),
            emitter,
            timeout,
            stats: EngineStats::default(),
        }
    }

    /// Builds an engine from the validated configuration, writing to `sink`.
    pub fn from_config(config: &Config, sink: Box<dyn Write + Send>) -> Self {
        let emitter = Emitter::new(sink, config.status.get_status.clone());
        Self::new(emitter, config.system.seq_anchor, config.timeout())
    }

    /// Runs one processing cycle over `chunk`. Empty input is ignored.
    ///
    /// Errors
    /// - Returns [`SinkError`] when the output sink rejects a write; the
    ///   entries already handed to the emitter are gone from pending storage.
    pub fn feed(&mut self, chunk: &str, now: DateTime<Utc>) -> Result<(), SinkError> {
        if chunk.is_empty() {
            return Ok(());
        }
        let preview: String = chunk.chars().take(64).collect();
        trace!(
            "capture input {} bytes: {:?}{}",
            chunk.len(),
            preview,
            if chunk.len() > preview.len() { " ..." } else { "" }
        );

        // Expired entries leave before anything new can match them.
        self.sweep(now)?;
        self.extractor.push(chunk);
        for frame in self.extractor.extract() {
            self.stats.frames += 1;
            match self.classifier.classify(frame, now) {
                Classified::Request(request) => self.store.insert_request(request),
                Classified::Response(response) => self.store.insert_response(response),
            }
            self.emit_correlated()?;
        }
        self.sweep(now)?;
        Ok(())
    }

    /// Flushes every pending entry older than the timeout at `now`.
    /// Returns how many were flushed.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> Result<usize, SinkError> {
        let expired = self.store.sweep_timeouts(now, self.timeout);
        for entry in &expired {
            self.emitter.emit_timeout(entry.raw_header())?;
            self.stats.timeouts += 1;
        }
        Ok(expired.len())
    }

    /// Writes the end-of-stream status line.
    pub fn finish(&mut self) -> Result<(), SinkError> {
        info!(
            "Capture stream ended ({} requests, {} responses still pending)",
            self.store.requests().len(),
            self.store.responses().len()
        );
        self.emitter.emit_status(END_OF_STREAM_NOTICE)
    }

    /// Flushes the sink. Buffer and pending entries are left untouched, so
    /// this is safe to call between any two cycles.
    pub fn shutdown(&mut self) -> Result<(), SinkError> {
        info!(
            "Shutting down engine: frames={}, pairs_written={}, pairs_filtered={}, timeouts={}",
            self.stats.frames,
            self.stats.pairs_written,
            self.stats.pairs_filtered,
            self.stats.timeouts
        );
        self.emitter.flush()
    }

    pub fn replace_sink(&mut self, sink: Box<dyn Write + Send>) -> Box<dyn Write + Send> {
        self.emitter.replace_sink(sink)
    }

    pub fn pending_requests(&self) -> &[PendingRequest] {
        self.store.requests()
    }

    pub fn pending_responses(&self) -> &[PendingResponse] {
        self.store.responses()
    }

    /// Capture text still waiting to complete a frame.
    pub fn buffered(&self) -> &str {
        self.extractor.buffered()
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    fn emit_correlated(&mut self) -> Result<(), SinkError> {
        for (request, response) in self.store.correlate() {
            let written = self.emitter.emit_pair(
                &request.raw_header,
                &response.raw_header,
                response.status_code,
            )?;
            if written {
                self.stats.pairs_written += 1;
            } else {
                self.stats.pairs_filtered += 1;
            }
        }
        Ok(())
    }
}
