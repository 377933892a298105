//! Common data types used across the data_capture subsystem.

use std::fmt;

/// Output channel of the capture subprocess a line was read from.
///
/// Both channels are fed into the same pipeline; the distinction is only kept
/// for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSource {
    /// Standard output of the capture command.
    Stdout,
    /// Standard error of the capture command.
    Stderr,
}

impl fmt::Display for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamSource::Stdout => write!(f, "stdout"),
            StreamSource::Stderr => write!(f, "stderr"),
        }
    }
}

/// Which HTTP header block a frame carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// A `GET`/`POST` request header block.
    Request,
    /// A status-line response header block, with its numeric status code.
    Response { status: u16 },
}

/// One complete header block cut out of the capture text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    /// The timestamp/metadata line, including its trailing newline.
    pub stamp: String,
    /// The header block from the request or status line through the `\r\n`
    /// of the last header line (the terminating blank line is not included).
    pub header: String,
}

impl Frame {
    /// Verbatim frame text: the timestamp line followed by the header block.
    pub fn text(&self) -> String {
        format!("{}{}", self.stamp, self.header)
    }
}

/// Key used to pair a request with its response.
///
/// `Number` is the TCP sequence number (requests) or acknowledgment number
/// (responses). `Raw` holds the metadata line when no number could be parsed;
/// it never correlates with anything, including another `Raw` key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorrelationKey {
    Number(i64),
    Raw(String),
}

impl CorrelationKey {
    pub fn matches(&self, other: &CorrelationKey) -> bool {
        match (self, other) {
            (CorrelationKey::Number(a), CorrelationKey::Number(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrelationKey::Number(n) => write!(f, "{}", n),
            CorrelationKey::Raw(s) => write!(f, "{:?}", s.trim_end()),
        }
    }
}
