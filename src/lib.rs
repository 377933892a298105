pub mod configuration;
pub mod controller;
pub mod correlation;
pub mod data_capture;
pub mod error_handling;
pub mod output;

pub use controller::Controller;
pub use data_capture::CaptureEngine;
