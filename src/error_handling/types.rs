use std::fmt;

use crate::data_capture::types::StreamSource;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    BadStatusFilter(String),
    DirectoryDoesNotExist(String),
    NotInRange(String),
    BadFileSuffix(String),
    EmptyCommand,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::BadStatusFilter(e) => write!(f, "Status filter error: {}", e),
            ConfigError::DirectoryDoesNotExist(e) => write!(f, "Directory error: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
            ConfigError::BadFileSuffix(e) => write!(f, "Invalid log file suffix: {}", e),
            ConfigError::EmptyCommand => write!(f, "Capture command is empty"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

#[derive(Debug)]
pub enum SinkError {
    OpenFailed(String, std::io::Error),
    WriteFailed(std::io::Error),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::OpenFailed(path, e) => write!(f, "Unable to open sink {}: {}", path, e),
            SinkError::WriteFailed(e) => write!(f, "Sink write failed: {}", e),
        }
    }
}

impl std::error::Error for SinkError {}

impl From<std::io::Error> for SinkError {
    fn from(err: std::io::Error) -> Self {
        SinkError::WriteFailed(err)
    }
}

#[derive(Debug)]
pub enum CaptureError {
    SpawnFailed(std::io::Error),
    MissingPipe(StreamSource),
    StreamError {
        source: StreamSource,
        error: std::io::Error,
    },
    SinkError(SinkError),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::SpawnFailed(e) => write!(f, "Unable to spawn capture command: {}", e),
            CaptureError::MissingPipe(s) => write!(f, "Capture command has no {} pipe", s),
            CaptureError::StreamError { source, error } => write!(
                f,
                "Read failure on capture {} ({:?}): {}",
                source,
                error.kind(),
                error
            ),
            CaptureError::SinkError(e) => write!(f, "Capture sink error: {}", e),
        }
    }
}

impl std::error::Error for CaptureError {}

impl From<SinkError> for CaptureError {
    fn from(err: SinkError) -> Self {
        CaptureError::SinkError(err)
    }
}

#[derive(Debug)]
pub enum ControllerError {
    ConfigurationError(ConfigError),
    CaptureError(CaptureError),
    SinkError(SinkError),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            ControllerError::CaptureError(e) => write!(f, "Capture error: {}", e),
            ControllerError::SinkError(e) => write!(f, "Sink error: {}", e),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<CaptureError> for ControllerError {
    fn from(err: CaptureError) -> Self {
        ControllerError::CaptureError(err)
    }
}

impl From<SinkError> for ControllerError {
    fn from(err: SinkError) -> Self {
        ControllerError::SinkError(err)
    }
}
