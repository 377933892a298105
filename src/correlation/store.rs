use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};

use super::pending::{PendingRequest, PendingResponse};

/// A pending entry flushed by the timeout sweep.
#[derive(Debug, Clone, PartialEq)]
pub enum Expired {
    Request(PendingRequest),
    Response(PendingResponse),
}

impl Expired {
    pub fn raw_header(&self) -> &str {
        match self {
            Expired::Request(req) => &req.raw_header,
            Expired::Response(resp) => &resp.raw_header,
        }
    }
}

/// Requests and responses waiting for their counterpart, in arrival order.
///
/// Arrival order decides ties: when several entries share a key, the one
/// inserted first is paired first.
#[derive(Debug, Default)]
pub struct CorrelationStore {
    requests: Vec<PendingRequest>,
    responses: Vec<PendingResponse>,
}

impl CorrelationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_request(&mut self, request: PendingRequest) {
        self.requests.push(request);
    }

    pub fn insert_response(&mut self, response: PendingResponse) {
        self.responses.push(response);
    }

    pub fn requests(&self) -> &[PendingRequest] {
        &self.requests
    }

    pub fn responses(&self) -> &[PendingResponse] {
        &self.responses
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty() && self.responses.is_empty()
    }

    /// Pairs pending requests with pending responses.
    ///
    /// Requests are visited in arrival order; each one takes the earliest
    /// response with an equal key. Both sides of a pair are removed and the
    /// same request index is visited again, since the removal shifted the
    /// next request into it.
    pub fn correlate(&mut self) -> Vec<(PendingRequest, PendingResponse)> {
        let mut pairs = Vec::new();
        let mut i = 0;
        while i < self.requests.len() {
            let key = &self.requests[i].key;
            match self.responses.iter().position(|resp| key.matches(&resp.key)) {
                Some(j) => {
                    let request = self.requests.remove(i);
                    let response = self.responses.remove(j);
                    debug!("correlated request and response on key {}", request.key);
                    pairs.push((request, response));
                }
                None => i += 1,
            }
        }
        pairs
    }

    /// Removes every entry older than `timeout` at `now`; requests first,
    /// each side in arrival order.
    pub fn sweep_timeouts(&mut self, now: DateTime<Utc>, timeout: Duration) -> Vec<Expired> {
        let (expired_requests, requests): (Vec<_>, Vec<_>) = std::mem::take(&mut self.requests)
            .into_iter()
            .partition(|req| req.is_expired(now, timeout));
        let (expired_responses, responses): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.responses)
                .into_iter()
                .partition(|resp| resp.is_expired(now, timeout));
        self.requests = requests;
        self.responses = responses;

        let expired: Vec<Expired> = expired_requests
            .into_iter()
            .map(Expired::Request)
            .chain(expired_responses.into_iter().map(Expired::Response))
            .collect();
        if !expired.is_empty() {
            warn!(
                "{} pending entries timed out ({} requests, {} responses still pending)",
                expired.len(),
                self.requests.len(),
                self.responses.len()
            );
        }
        expired
    }
}
