pub mod classifier;
pub mod engine;
pub mod frame_extractor;
pub mod multiplexer;
pub mod types;

pub use classifier::{Classified, Classifier};
pub use engine::{CaptureEngine, EngineStats, END_OF_STREAM_NOTICE};
pub use frame_extractor::FrameExtractor;
pub use multiplexer::StreamMultiplexer;
pub use types::{CorrelationKey, Frame, FrameKind, StreamSource};
