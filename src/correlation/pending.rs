use chrono::{DateTime, Duration, Utc};

use crate::data_capture::types::CorrelationKey;

/// A request header waiting for its response.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    /// TCP sequence number taken from the metadata line.
    pub key: CorrelationKey,
    /// Timestamp line followed by the request header block.
    pub raw_header: String,
    pub inserted_at: DateTime<Utc>,
}

/// A response header waiting for its request.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingResponse {
    /// TCP acknowledgment number taken from the metadata line.
    pub key: CorrelationKey,
    /// Quoted (`"> "`-prefixed) timestamp line and response header block.
    pub raw_header: String,
    pub status_code: u16,
    pub inserted_at: DateTime<Utc>,
}

impl PendingRequest {
    pub fn is_expired(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        now - self.inserted_at > timeout
    }
}

impl PendingResponse {
    pub fn is_expired(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        now - self.inserted_at > timeout
    }
}
