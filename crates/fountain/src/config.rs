//! All of the user config for Fountain.

use color_eyre::eyre::{Result, WrapErr as _};

/// The valid log levels. Based on our `tracing` crate.
#[derive(serde::Serialize, serde::Deserialize, clap::ValueEnum, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub(crate) enum LogLevel {
    /// Error
    Error,
    /// Warnings
    Warn,
    /// Info
    Info,
    /// Debug
    Debug,
    /// Trace
    Trace,
    /// No logging
    Off,
}

/// Managing user config.
#[derive(serde::Deserialize, Debug, Clone)]
#[serde(default)]
pub(crate) struct Config {
    /// The maximum log level
    pub log_level: LogLevel,
    /// The location of the log file.
    pub log_path: std::path::PathBuf,
    /// Target frame rate
    pub frame_rate: u32,
    /// Give up after this many frames, whether the simulation has finished or not.
    pub max_frames: Option<u64>,
    /// How many times to run the simulation back to back.
    pub runs: u32,
    /// Whether to draw each frame to the terminal.
    pub show: bool,
    /// Width of the terminal drawing, in columns.
    pub columns: usize,
    /// Height of the terminal drawing, in rows. Every row holds 2 pixels.
    pub rows: usize,
    /// Everything about the particles themselves.
    pub engine: particle_engine::EngineConfig,
}

impl Default for Config {
    fn default() -> Self {
        let log_directory = match dirs::state_dir() {
            Some(directory) => directory,
            None => std::path::PathBuf::new().join("./"),
        };
        let log_path = log_directory.join("fountain").join("fountain.log");

        Self {
            log_level: LogLevel::Off,
            log_path,
            frame_rate: 30,
            max_frames: None,
            runs: 1,
            show: false,
            columns: 80,
            rows: 24,
            engine: particle_engine::EngineConfig::default(),
        }
    }
}

impl Config {
    /// Load the config from a TOML file, or use all the defaults when there's no file.
    pub fn load(maybe_path: Option<&std::path::Path>) -> Result<Self> {
        let Some(path) = maybe_path else {
            return Ok(Self::default());
        };

        let data = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Couldn't read config file: {}", path.display()))?;
        Self::parse(&data).wrap_err_with(|| format!("Bad config file: {}", path.display()))
    }

    /// Parse a TOML string.
    pub fn parse(data: &str) -> Result<Self> {
        let config: Self = toml::from_str(data)?;
        Ok(config)
    }

    /// Apply the CLI arguments that aren't part of the simulation form.
    pub fn apply_cli_overrides(&mut self, cli_args: &crate::cli_args::CliArgs) {
        if let Some(frame_rate) = cli_args.frame_rate {
            self.frame_rate = frame_rate;
        }
        if cli_args.max_frames.is_some() {
            self.max_frames = cli_args.max_frames;
        }
        if let Some(runs) = cli_args.runs {
            self.runs = runs;
        }
        if cli_args.show {
            self.show = true;
        }
        if let Some(rate) = cli_args.rate {
            self.engine.emit_rate = rate;
        }
        if cli_args.seed.is_some() {
            self.engine.seed = cli_args.seed;
        }
        if cli_args.threads.is_some() {
            self.engine.threads = cli_args.threads;
        }
        if let Some(level) = cli_args.log_level.clone() {
            self.log_level = level;
        }
        if let Some(path) = cli_args.log_path.clone() {
            self.log_path = path;
        }
    }
}
