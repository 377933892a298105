use chrono::{DateTime, Utc};
use log::{debug, warn};
use regex::Regex;

use super::types::{CorrelationKey, Frame, FrameKind};
use crate::configuration::types::SeqAnchor;
use crate::correlation::pending::{PendingRequest, PendingResponse};

/// A frame turned into a pending entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    Request(PendingRequest),
    Response(PendingResponse),
}

/// Derives correlation keys and output text from extracted frames.
#[derive(Debug)]
pub struct Classifier {
    seq: Regex,
    ack: Regex,
    anchor: SeqAnchor,
}

impl Classifier {
    pub fn new(anchor: SeqAnchor) -> Self {
        Self {
            seq: Regex::new(r"\bseq (\d+):(\d+)").unwrap(),
            ack: Regex::new(r"\back (\d+)").unwrap(),
            anchor,
        }
    }

    pub fn classify(&self, frame: Frame, now: DateTime<Utc>) -> Classified {
        match frame.kind {
            FrameKind::Request => {
                let key = self.request_key(&frame.stamp);
                debug!("request frame keyed by seq {}", key);
                Classified::Request(PendingRequest {
                    key,
                    raw_header: frame.text(),
                    inserted_at: now,
                })
            }
            FrameKind::Response { status } => {
                let key = self.response_key(&frame.stamp);
                debug!("response frame ({}) keyed by ack {}", status, key);
                Classified::Response(PendingResponse {
                    key,
                    raw_header: quote_response(&frame.text()),
                    status_code: status,
                    inserted_at: now,
                })
            }
        }
    }

    /// Number from the `seq <start>:<end>` range, or the raw line.
    fn request_key(&self, stamp: &str) -> CorrelationKey {
        let group = match self.anchor {
            SeqAnchor::Start => 1,
            SeqAnchor::End => 2,
        };
        let number = self
            .seq
            .captures(stamp)
            .and_then(|caps| caps.get(group))
            .and_then(|m| m.as_str().parse().ok());
        key_or_raw(number, stamp, "seq")
    }

    /// Number from the `ack <number>` field, or the raw line.
    fn response_key(&self, stamp: &str) -> CorrelationKey {
        let number = self
            .ack
            .captures(stamp)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok());
        key_or_raw(number, stamp, "ack")
    }
}

fn key_or_raw(number: Option<i64>, stamp: &str, field: &str) -> CorrelationKey {
    match number {
        Some(n) => CorrelationKey::Number(n),
        None => {
            warn!(
                "no usable {} field, entry can only time out: {}",
                field,
                stamp.trim_end()
            );
            CorrelationKey::Raw(stamp.to_string())
        }
    }
}

/// Prepends a blank line and prefixes every line with `"> "`.
pub fn quote_response(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2 * (text.lines().count() + 2));
    for line in format!("\n{}", text).split_inclusive('\n') {
        quoted.push_str("> ");
        quoted.push_str(line);
    }
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQ_STAMP: &str = "12:00:00.000001 IP a.5000 > b.80: Flags [P.], seq 10:20, ack 1, length 10\n";
    const RESP_STAMP: &str = "12:00:00.000002 IP b.80 > a.5000: Flags [P.], seq 1:30, ack 10, length 29\n";

    fn request(stamp: &str) -> Frame {
        Frame {
            kind: FrameKind::Request,
            stamp: stamp.to_string(),
            header: "GET /x HTTP/1.1\r\n".to_string(),
        }
    }

    fn response(stamp: &str, status: u16) -> Frame {
        Frame {
            kind: FrameKind::Response { status },
            stamp: stamp.to_string(),
            header: format!("HTTP/1.1 {} OK\r\nServer: t\r\n", status),
        }
    }

    #[test]
    fn request_key_is_range_start_by_default() {
        let now = Utc::now();
        match Classifier::new(SeqAnchor::Start).classify(request(REQ_STAMP), now) {
            Classified::Request(req) => {
                assert_eq!(req.key, CorrelationKey::Number(10));
                assert_eq!(req.raw_header, format!("{}GET /x HTTP/1.1\r\n", REQ_STAMP));
                assert_eq!(req.inserted_at, now);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn request_key_can_use_range_end() {
        match Classifier::new(SeqAnchor::End).classify(request(REQ_STAMP), Utc::now()) {
            Classified::Request(req) => assert_eq!(req.key, CorrelationKey::Number(20)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn response_key_status_and_quoting() {
        match Classifier::new(SeqAnchor::Start).classify(response(RESP_STAMP, 200), Utc::now()) {
            Classified::Response(resp) => {
                assert_eq!(resp.key, CorrelationKey::Number(10));
                assert_eq!(resp.status_code, 200);
                assert_eq!(
                    resp.raw_header,
                    format!("> \n> {}> HTTP/1.1 200 OK\r\n> Server: t\r\n", RESP_STAMP)
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn missing_fields_fall_back_to_raw_line() {
        let stamp = "12:00:00.000003 IP a.5000 > b.80: Flags [P.], length 10\n";
        let classifier = Classifier::new(SeqAnchor::Start);
        match classifier.classify(request(stamp), Utc::now()) {
            Classified::Request(req) => {
                assert_eq!(req.key, CorrelationKey::Raw(stamp.to_string()))
            }
            other => panic!("unexpected {:?}", other),
        }
        match classifier.classify(response(stamp, 500), Utc::now()) {
            Classified::Response(resp) => {
                assert_eq!(resp.key, CorrelationKey::Raw(stamp.to_string()))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn key_fields_need_a_word_boundary() {
        let stamp = "12:00:00.000004 IP track 5.host.1 > subseq 3:4.80: Flags [P.], length 10\n";
        let classifier = Classifier::new(SeqAnchor::Start);
        match classifier.classify(request(stamp), Utc::now()) {
            Classified::Request(req) => {
                assert_eq!(req.key, CorrelationKey::Raw(stamp.to_string()))
            }
            other => panic!("unexpected {:?}", other),
        }
        match classifier.classify(response(stamp, 200), Utc::now()) {
            Classified::Response(resp) => {
                assert_eq!(resp.key, CorrelationKey::Raw(stamp.to_string()))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn quote_response_does_not_prefix_past_final_newline() {
        assert_eq!(quote_response("a\nb\r\n"), "> \n> a\n> b\r\n");
    }
}
