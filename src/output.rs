//! Output side of the pipeline.
//!
//! - `emitter`: writes correlated pairs and timeouts to a swappable sink,
//!   applying the status filter.
//! - `log_file`: date-rotated append-only log file usable as that sink.

pub mod emitter;
pub mod log_file;

pub use emitter::{Emitter, TIMEOUT_MARKER};
pub use log_file::RotatingLogFile;
