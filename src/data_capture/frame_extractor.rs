use std::ops::Range;

use log::{debug, trace};
use regex::Regex;

use super::types::{Frame, FrameKind};

/// A complete line opening with a `HH:MM:SS.ffffff` capture timestamp.
const STAMP_PATTERN: &str = r"(?m)^\d{2}:\d{2}:\d{2}\.\d{6}[^\n]*\n";

/// Request line or status line start. Not anchored to the line start, since
/// tcpdump `-A` renders the IP/TCP header bytes in front of the payload.
const TOKEN_PATTERN: &str = r"(?:GET|POST) |HTTP/[12](?:\.[01])? (?P<status>\d{3}) ";

const HEADER_END: &str = "\r\n\r\n";

/// Incremental frame extraction over an unbounded capture text stream.
///
/// Text is appended with [`push`](Self::push) and complete frames are taken
/// out with [`extract`](Self::extract). Every timestamp line opens a region
/// that lasts until the next timestamp line; a region yields at most one
/// frame, made of the timestamp line and the first header block found in it.
///
/// After each extraction only the last region is kept, and only while it
/// can still complete. Everything before it is either consumed or can never
/// form a frame, which keeps the buffer bounded.
#[derive(Debug)]
pub struct FrameExtractor {
    buffer: String,
    stamp: Regex,
    token: Regex,
}

impl FrameExtractor {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            stamp: Regex::new(STAMP_PATTERN).unwrap(),
            token: Regex::new(TOKEN_PATTERN).unwrap(),
        }
    }

    pub fn push(&mut self, chunk: &str) {
        self.buffer.push_str(chunk);
    }

    /// Text still waiting for the rest of its frame.
    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    /// Takes every complete frame out of the buffer, in stream order, then
    /// drops the text that can no longer contribute to a frame.
    pub fn extract(&mut self) -> Vec<Frame> {
        let stamps: Vec<Range<usize>> = self
            .stamp
            .find_iter(&self.buffer)
            .map(|m| m.range())
            .collect();

        let mut frames = Vec::new();
        let mut consumed = 0;
        let mut open_region = None;

        for (i, stamp) in stamps.iter().enumerate() {
            let region_end = stamps
                .get(i + 1)
                .map_or(self.buffer.len(), |next| next.start);
            match self.frame_in(stamp.clone(), region_end) {
                Some((frame, end)) => {
                    debug!("extracted {:?} frame ({} bytes)", frame.kind, end - stamp.start);
                    frames.push(frame);
                    consumed = end;
                }
                None if i + 1 == stamps.len() => open_region = Some(stamp.start),
                None => trace!(
                    "discarding capture block without header: {:?}",
                    self.buffer[stamp.clone()].trim_end()
                ),
            }
        }

        let keep_from = match open_region {
            Some(start) => start,
            None => {
                let tail = &self.buffer[consumed..];
                consumed + tail.rfind('\n').map_or(0, |i| i + 1)
            }
        };
        self.buffer.drain(..keep_from);

        frames
    }

    /// Looks for a complete header block between the end of `stamp` and
    /// `region_end`. Returns the frame and the buffer offset right after its
    /// terminating blank line.
    fn frame_in(&self, stamp: Range<usize>, region_end: usize) -> Option<(Frame, usize)> {
        let region = &self.buffer[stamp.end..region_end];
        let caps = self.token.captures(region)?;
        let start = caps.get(0)?.start();
        let end = start + region[start..].find(HEADER_END)?;

        let kind = match caps.name("status") {
            Some(status) => FrameKind::Response {
                status: status.as_str().parse().ok()?,
            },
            None => FrameKind::Request,
        };

        let frame = Frame {
            kind,
            stamp: self.buffer[stamp.clone()].to_string(),
            header: region[start..end + 2].to_string(),
        };
        Some((frame, stamp.end + end + HEADER_END.len()))
    }
}

impl Default for FrameExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQ_STAMP: &str =
        "12:00:00.000001 IP 10.0.0.1.5000 > 10.0.0.2.80: Flags [P.], seq 10:20, ack 1, length 10\n";
    const RESP_STAMP: &str =
        "12:00:00.000002 IP 10.0.0.2.80 > 10.0.0.1.5000: Flags [P.], seq 1:30, ack 10, length 29\n";

    fn extract_all(chunks: &[&str]) -> Vec<Frame> {
        let mut extractor = FrameExtractor::new();
        let mut frames = Vec::new();
        for chunk in chunks {
            extractor.push(chunk);
            frames.extend(extractor.extract());
        }
        frames
    }

    #[test]
    fn extracts_request_frame() {
        let input = format!("{}E..4..@.@...GET /x HTTP/1.1\r\nHost: a\r\n\r\n", REQ_STAMP);
        let frames = extract_all(&[&input]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].kind, FrameKind::Request);
        assert_eq!(frames[0].stamp, REQ_STAMP);
        assert_eq!(frames[0].header, "GET /x HTTP/1.1\r\nHost: a\r\n");
    }

    #[test]
    fn extracts_response_frame_with_status() {
        let input = format!("{}HTTP/1.1 404 Not Found\r\nServer: x\r\n\r\n", RESP_STAMP);
        let frames = extract_all(&[&input]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].kind, FrameKind::Response { status: 404 });
        assert_eq!(frames[0].header, "HTTP/1.1 404 Not Found\r\nServer: x\r\n");
    }

    #[test]
    fn accepts_http2_status_lines() {
        let input = format!("{}HTTP/2 200 \r\n\r\n", RESP_STAMP);
        let frames = extract_all(&[&input]);
        assert_eq!(frames[0].kind, FrameKind::Response { status: 200 });
    }

    #[test]
    fn skips_intervening_lines_between_stamp_and_header() {
        let input = format!(
            "{}\t0x0000:  4500 0034\nnoise line\nPOST /form HTTP/1.0\r\n\r\n",
            REQ_STAMP
        );
        let frames = extract_all(&[&input]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].header, "POST /form HTTP/1.0\r\n");
    }

    #[test]
    fn waits_for_terminating_blank_line() {
        let mut extractor = FrameExtractor::new();
        extractor.push(REQ_STAMP);
        extractor.push("GET /x HTTP/1.1\r\n");
        assert!(extractor.extract().is_empty());
        assert!(extractor.buffered().starts_with(REQ_STAMP));

        extractor.push("\r\n");
        let frames = extractor.extract();
        assert_eq!(frames.len(), 1);
        assert_eq!(extractor.buffered(), "");
    }

    #[test]
    fn extracts_several_frames_from_one_chunk() {
        let input = format!(
            "{}GET /a HTTP/1.1\r\n\r\n{}HTTP/1.1 200 OK\r\n\r\n",
            REQ_STAMP, RESP_STAMP
        );
        let frames = extract_all(&[&input]);
        let kinds: Vec<FrameKind> = frames.iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![FrameKind::Request, FrameKind::Response { status: 200 }]
        );
    }

    #[test]
    fn ignores_token_inside_the_stamp_line() {
        let stamp = "12:00:00.000001 IP a.1 > b.80: seq 1:9, length 8: HTTP: GET / HTTP/1.1\n";
        let mut extractor = FrameExtractor::new();
        extractor.push(stamp);
        extractor.push("E..GET / HTTP/1.1\r\n\r\n");
        let frames = extractor.extract();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].stamp, stamp);
        assert_eq!(frames[0].header, "GET / HTTP/1.1\r\n");
    }

    #[test]
    fn drops_garbage_before_last_stamp() {
        let mut extractor = FrameExtractor::new();
        extractor.push("listening on eth0, link-type EN10MB\n");
        extractor.push(REQ_STAMP);
        extractor.push("GET /never-finished HTTP/1.1\r\n");
        assert!(extractor.extract().is_empty());
        assert!(extractor.buffered().starts_with(REQ_STAMP));

        extractor.push(RESP_STAMP);
        assert!(extractor.extract().is_empty());
        assert_eq!(extractor.buffered(), RESP_STAMP);
    }

    #[test]
    fn header_split_by_a_new_stamp_is_dropped() {
        let input = format!(
            "{}GET /x HTTP/1.1\r\n{}Host: a\r\n\r\n",
            REQ_STAMP, RESP_STAMP
        );
        assert!(extract_all(&[&input]).is_empty());
    }

    #[test]
    fn keeps_only_trailing_partial_line_without_stamp() {
        let mut extractor = FrameExtractor::new();
        extractor.push("garbage\nmore garbage\n12:00:0");
        assert!(extractor.extract().is_empty());
        assert_eq!(extractor.buffered(), "12:00:0");
    }

    #[test]
    fn one_frame_per_stamp() {
        let input = format!(
            "{}GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n",
            REQ_STAMP
        );
        let frames = extract_all(&[&input]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].header, "GET /a HTTP/1.1\r\n");
    }

    #[test]
    fn byte_by_byte_matches_single_chunk() {
        let input = format!(
            "noise\n{}x\r\nGET /a HTTP/1.1\r\nA: b\r\n\r\n{}HTTP/1.0 500 Oops\r\n\r\n{}partial",
            REQ_STAMP, RESP_STAMP, REQ_STAMP
        );
        let whole = extract_all(&[&input]);
        let bytes: Vec<String> = input.chars().map(|c| c.to_string()).collect();
        let pieces: Vec<&str> = bytes.iter().map(String::as_str).collect();
        assert_eq!(extract_all(&pieces), whole);
        assert_eq!(whole.len(), 2);
    }
}
