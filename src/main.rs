use std::path::PathBuf;

use clap::Parser;
use hdrlog::configuration::config::Config;
use hdrlog::controller::{Controller, Outcome};
use log::{error, info};

#[derive(Parser, Debug)]
#[command(name = "hdrlog")]
#[command(version)]
#[command(about = "Logs correlated HTTP request/response headers from a live tcpdump capture")]
struct Args {
    /// TOML configuration file; built-in defaults are used when omitted
    config_file: Option<PathBuf>,

    /// Write to stdout instead of the dated log file
    #[arg(long)]
    stdout: bool,

    /// Seconds an unmatched header is kept before it is logged as a timeout
    #[arg(long, env = "HDRLOG_TIMEOUT")]
    timeout: Option<u64>,
}

impl Args {
    fn load_config(&self) -> Result<Config, hdrlog::error_handling::ConfigError> {
        let mut config = match &self.config_file {
            Some(path) => Config::read(path)?,
            None => Config::default(),
        };
        if self.stdout {
            config.system.log_write = false;
        }
        if let Some(timeout) = self.timeout {
            config.system.timeout = timeout;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    let args = Args::parse();

    info!("Importing configuration");
    let config = match args.load_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Unable to import configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!("Configuration imported successfully");

    let controller = match Controller::new(config) {
        Ok(controller) => controller,
        Err(e) => {
            error!("Unable to create a controller instance: {}, exiting...", e);
            std::process::exit(1);
        }
    };

    match controller.run().await {
        Ok(Outcome::EndOfStream) => info!("Capture command finished"),
        Ok(Outcome::Interrupted) => info!("Stopped by signal"),
        Err(e) => {
            error!("Error occured in the controller process: {}, exiting...", e);
            std::process::exit(1);
        }
    }
}
