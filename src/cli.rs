//! Command-line interface for pushrec
//!
//! Handles argument parsing, settings overrides and logging configuration.

use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;

use crate::config::AppConfig;
use crate::error::ConfigError;

/// pushrec - push-button audio recorder and player
#[derive(Parser, Debug)]
#[command(name = "pushrec")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// TOML settings file
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// WAV file to record to and play back from
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Disable the band visualizer
    #[arg(long)]
    pub no_analysis: bool,

    /// Linear gain applied while recording
    #[arg(long, value_name = "FACTOR")]
    pub boost: Option<f32>,

    /// Drive the recorder from stdin and log LED changes instead of using GPIO
    #[arg(long)]
    pub simulate: bool,

    /// Print the available audio devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Increase logging verbosity
    /// -v = debug, -vv = trace
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Get the log level filter based on verbosity flags
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            LevelFilter::Error
        } else {
            match self.verbose {
                0 => LevelFilter::Info,
                1 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }

    /// Layer command-line overrides over the loaded settings.
    pub fn apply(&self, config: &mut AppConfig) -> Result<(), ConfigError> {
        if let Some(output) = &self.output {
            config.output_path = output.clone();
        }
        if let Some(boost) = self.boost {
            config.audio.volume_boost = boost;
        }
        if self.no_analysis {
            config.analysis.enabled = false;
        }
        config.validate()
    }
}

/// Initialize the logging system based on CLI arguments
pub fn init_logging(args: &Args) {
    let mut builder = env_logger::Builder::new();

    // Audio host crates stay at warn
    builder.filter_level(LevelFilter::Warn);
    builder.filter_module("pushrec", args.log_level());

    // RUST_LOG still wins when set
    builder.parse_default_env();

    builder.format_timestamp_millis().init();
}
