//! Pending request/response bookkeeping.
//!
//! Classified frames wait here until a counterpart with the same correlation
//! key shows up, or until the timeout sweep flushes them.

pub mod pending;
pub mod store;

pub use pending::{PendingRequest, PendingResponse};
pub use store::{CorrelationStore, Expired};
