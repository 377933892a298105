use std::future::Future;
use std::io::Write;
use std::process::Stdio;
use std::time::Duration;

use chrono::Utc;
use log::{debug, error, info, warn};
use tokio::process::{Child, Command};
use tokio::time::MissedTickBehavior;

use crate::configuration::config::Config;
use crate::data_capture::engine::CaptureEngine;
use crate::data_capture::multiplexer::StreamMultiplexer;
use crate::data_capture::types::StreamSource;
use crate::error_handling::types::*;
use crate::output::log_file::RotatingLogFile;

/// How often pending entries are checked for timeouts while the capture is
/// idle.
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Why the main loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Both capture channels reached end-of-stream.
    EndOfStream,
    /// A shutdown signal arrived first.
    Interrupted,
}

pub struct Controller {
    pub config: Config,
}

impl Controller {
    pub fn new(config: Config) -> Result<Self, ControllerError> {
        config.validate().map_err(|err| {
            error!("Invalid configuration: {}", err);
            ControllerError::ConfigurationError(err)
        })?;
        Ok(Self { config })
    }

    /// Output sink selected by `system.log_write`.
    pub fn open_sink(&self) -> Result<Box<dyn Write + Send>, SinkError> {
        if self.config.system.log_write {
            let log = &self.config.log;
            let file = RotatingLogFile::open(&log.log_dir, &log.file_prefix, &log.file_suffix)?;
            Ok(Box::new(file))
        } else {
            info!("Writing HTTP headers to stdout");
            Ok(Box::new(std::io::stdout()))
        }
    }

    /// Runs the capture until it ends or SIGINT/SIGTERM arrives.
    pub async fn run(&self) -> Result<Outcome, ControllerError> {
        let sink = self.open_sink()?;
        self.run_with(sink, shutdown_signal()).await
    }

    /// Runs the capture writing to `sink` until the command's output ends or
    /// `shutdown` completes. The capture process is always reaped before
    /// returning.
    pub async fn run_with<F>(
        &self,
        sink: Box<dyn Write + Send>,
        shutdown: F,
    ) -> Result<Outcome, ControllerError>
    where
        F: Future<Output = ()>,
    {
        let mut engine = CaptureEngine::from_config(&self.config, sink);
        let mut child = self.spawn_capture()?;

        let stdout = child
            .stdout
            .take()
            .ok_or(CaptureError::MissingPipe(StreamSource::Stdout))?;
        let stderr = child
            .stderr
            .take()
            .ok_or(CaptureError::MissingPipe(StreamSource::Stderr))?;
        let mut mux = StreamMultiplexer::new(stdout, stderr);

        let result = drive(&mut engine, &mut mux, shutdown).await;
        mux.shutdown();

        if !matches!(result, Ok(Outcome::EndOfStream)) {
            debug!("Stopping capture process");
            if let Err(e) = child.start_kill() {
                warn!("Unable to kill capture process: {}", e);
            }
        }
        match child.wait().await {
            Ok(status) => info!("Capture process exited: {}", status),
            Err(e) => warn!("Unable to reap capture process: {}", e),
        }

        let flushed = engine.shutdown();
        let outcome = result?;
        flushed?;
        Ok(outcome)
    }

    fn spawn_capture(&self) -> Result<Child, CaptureError> {
        let command = &self.config.command.tcpdump;
        info!("Starting capture: {}", command);
        Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                error!("Failed to spawn capture command '{}': {}", command, e);
                CaptureError::SpawnFailed(e)
            })
    }
}

/// Feeds every line from `mux` into `engine`, sweeping timeouts once per
/// `SWEEP_INTERVAL` in between.
async fn drive<F>(
    engine: &mut CaptureEngine,
    mux: &mut StreamMultiplexer,
    shutdown: F,
) -> Result<Outcome, CaptureError>
where
    F: Future<Output = ()>,
{
    let mut sweep = tokio::time::interval(SWEEP_INTERVAL);
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = mux.next_line() => match line? {
                Some((_, line)) if line.is_empty() => {}
                Some((_, line)) => engine.feed(&line, Utc::now())?,
                None => {
                    engine.finish()?;
                    return Ok(Outcome::EndOfStream);
                }
            },
            _ = sweep.tick() => {
                engine.sweep(Utc::now())?;
            }
            _ = &mut shutdown => {
                info!("Shutdown requested");
                return Ok(Outcome::Interrupted);
            }
        }
    }
}

/// Completes on SIGINT, or SIGTERM on unix.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!("Unable to listen for SIGTERM: {}", e);
                ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    ctrl_c().await;
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Unable to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_capture::engine::END_OF_STREAM_NOTICE;
    use crate::output::emitter::SharedBuffer;
    use std::fs;
    use tempfile::TempDir;

    const CAPTURE: &str = r"printf '12:00:00.000001 IP a.1 > b.80: Flags [P.], seq 10:20, ack 1, length 10\nGET /x HTTP/1.1\r\n\r\n12:00:00.000002 IP b.80 > a.1: Flags [P.], seq 1:9, ack 10, length 8\nHTTP/1.1 200 OK\r\n\r\n'";

    fn stdout_config(command: &str) -> Config {
        let mut config = Config::default();
        config.system.log_write = false;
        config.command.tcpdump = command.to_string();
        config
    }

    #[test]
    fn rejects_invalid_configuration() {
        let mut config = stdout_config("true");
        config.system.timeout = 0;
        assert!(matches!(
            Controller::new(config),
            Err(ControllerError::ConfigurationError(ConfigError::NotInRange(_)))
        ));
    }

    #[tokio::test]
    async fn correlates_subprocess_output_until_eof() {
        let _ = env_logger::builder().is_test(true).try_init();
        let controller = Controller::new(stdout_config(CAPTURE)).unwrap();
        let out = SharedBuffer::default();

        let outcome = controller
            .run_with(Box::new(out.clone()), std::future::pending())
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::EndOfStream);
        let output = out.contents();
        assert!(output.starts_with("12:00:00.000001 IP a.1 > b.80"));
        assert!(output.contains("GET /x HTTP/1.1\r\n> \n> 12:00:00.000002"));
        assert!(output.contains("> HTTP/1.1 200 OK\r\n\n"));
        assert!(output.ends_with(&format!("{}\n", END_OF_STREAM_NOTICE)));
    }

    #[tokio::test]
    async fn reads_capture_text_from_stderr_too() {
        let controller = Controller::new(stdout_config(&format!("{{ {}; }} >&2", CAPTURE))).unwrap();
        let out = SharedBuffer::default();

        controller
            .run_with(Box::new(out.clone()), std::future::pending())
            .await
            .unwrap();

        assert!(out.contents().contains("> HTTP/1.1 200 OK\r\n"));
    }

    #[tokio::test]
    async fn writes_to_dated_log_file() {
        let dir = TempDir::new().unwrap();
        let mut config = stdout_config(CAPTURE);
        config.system.log_write = true;
        config.log.log_dir = dir.path().to_path_buf();
        config.log.file_prefix = "hdr".to_string();
        let controller = Controller::new(config).unwrap();

        let sink = controller.open_sink().unwrap();
        controller
            .run_with(sink, std::future::pending())
            .await
            .unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let path = entries[0].as_ref().unwrap().path();
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("hdr."));
        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("GET /x HTTP/1.1"));
        assert!(content.ends_with(&format!("{}\n", END_OF_STREAM_NOTICE)));
    }

    #[tokio::test]
    async fn idle_capture_still_times_out_pending_requests() {
        let mut config = stdout_config(
            r"printf '12:00:00.000001 IP a.1 > b.80: Flags [P.], seq 10:20, ack 1, length 10\nGET /idle HTTP/1.1\r\n\r\n'; sleep 3",
        );
        config.system.timeout = 1;
        let controller = Controller::new(config).unwrap();
        let out = SharedBuffer::default();

        let outcome = controller
            .run_with(Box::new(out.clone()), std::future::pending())
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::EndOfStream);
        let output = out.contents();
        let timeout = output.find("timeout\n12:00:00.000001").unwrap();
        assert!(output[timeout..].contains("GET /idle HTTP/1.1\r\n"));
        assert!(timeout < output.find(END_OF_STREAM_NOTICE).unwrap());
    }

    #[tokio::test]
    async fn shutdown_stops_a_running_capture() {
        let controller = Controller::new(stdout_config("sleep 30")).unwrap();
        let out = SharedBuffer::default();

        let outcome = tokio::time::timeout(
            Duration::from_secs(10),
            controller.run_with(
                Box::new(out.clone()),
                tokio::time::sleep(Duration::from_millis(100)),
            ),
        )
        .await
        .expect("capture did not stop")
        .unwrap();

        assert_eq!(outcome, Outcome::Interrupted);
        assert!(!out.contents().contains(END_OF_STREAM_NOTICE));
    }
}
