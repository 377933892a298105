use std::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use log::{error, info};

use crate::error_handling::types::SinkError;

pub type Clock = Box<dyn Fn() -> DateTime<Local> + Send>;

/// Append-only log file whose name follows the wall clock.
///
/// The file is `<dir>/<prefix>.<suffix>`, with `suffix` rendered through
/// `strftime` on the first write after each flush. When the rendering
/// changes (for the default `%Y-%m-%d`, at midnight) the current file is
/// closed and the new one is opened in append mode, so restarts keep adding
/// to the same file. Everything written between two flushes lands in one
/// file, so an emission is never split across a rollover.
pub struct RotatingLogFile {
    dir: PathBuf,
    prefix: String,
    suffix: String,
    clock: Clock,
    current: Option<(PathBuf, File)>,
    rotate_pending: bool,
}

impl RotatingLogFile {
    /// Opens the file for the current time right away, so an unwritable
    /// directory is reported before any capture starts.
    pub fn open(dir: &Path, prefix: &str, suffix: &str) -> Result<Self, SinkError> {
        Self::with_clock(dir, prefix, suffix, Box::new(Local::now))
    }

    pub fn with_clock(
        dir: &Path,
        prefix: &str,
        suffix: &str,
        clock: Clock,
    ) -> Result<Self, SinkError> {
        let mut log = Self {
            dir: dir.to_path_buf(),
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
            clock,
            current: None,
            rotate_pending: false,
        };
        let path = log
            .path_for((log.clock)())
            .map_err(|e| SinkError::OpenFailed(dir.display().to_string(), e))?;
        log.switch_to(path.clone())
            .map_err(|e| SinkError::OpenFailed(path.display().to_string(), e))?;
        Ok(log)
    }

    /// Path of the file currently written to.
    pub fn current_path(&self) -> Option<&Path> {
        self.current.as_ref().map(|(path, _)| path.as_path())
    }

    pub fn path_for(&self, now: DateTime<Local>) -> io::Result<PathBuf> {
        let mut name = format!("{}.", self.prefix);
        write!(name, "{}", now.format(&self.suffix)).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid file suffix pattern '{}'", self.suffix),
            )
        })?;
        Ok(self.dir.join(name))
    }

    fn switch_to(&mut self, path: PathBuf) -> io::Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                error!("Failed to open log file {}: {}", path.display(), e);
                e
            })?;
        info!("Writing HTTP headers to {}", path.display());
        self.current = Some((path, file));
        Ok(())
    }

    /// Switches to the file named for the current time if that differs
    /// from the open one.
    pub fn rotate(&mut self) -> io::Result<()> {
        let path = self.path_for((self.clock)())?;
        let stale = self
            .current
            .as_ref()
            .map_or(true, |(current, _)| *current != path);
        if stale {
            if let Some((_, mut old)) = self.current.take() {
                old.flush()?;
            }
            self.switch_to(path)?;
        }
        Ok(())
    }

    fn file_for_write(&mut self) -> io::Result<&mut File> {
        if self.rotate_pending || self.current.is_none() {
            self.rotate()?;
            self.rotate_pending = false;
        }
        match self.current.as_mut() {
            Some((_, file)) => Ok(file),
            None => Err(io::Error::new(io::ErrorKind::NotFound, "no log file open")),
        }
    }
}

impl Write for RotatingLogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file_for_write()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.rotate_pending = true;
        match self.current.as_mut() {
            Some((_, file)) => file.flush(),
            None => Ok(()),
        }
    }
}
