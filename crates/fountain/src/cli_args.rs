//! All the CLI arguments for Fountain

/// The simulation form fields are taken as raw text, just as a user would type them into a UI,
/// and are only validated once the whole form is submitted.
#[derive(clap::Parser, Debug, Clone, Default)]
#[command(version, about, long_about = "A multi-threaded particle fountain")]
#[non_exhaustive]
pub struct CliArgs {
    /// Path to a TOML config file.
    #[arg(long)]
    pub config: Option<std::path::PathBuf>,

    /// The total number of particles to emit.
    #[arg(short, long)]
    pub particles: Option<String>,

    /// Width of the simulation.
    #[arg(long)]
    pub width: Option<String>,

    /// Height of the simulation.
    #[arg(long)]
    pub height: Option<String>,

    /// Horizontal position of the emitter.
    #[arg(long)]
    pub emitter_x: Option<String>,

    /// Vertical position of the emitter.
    #[arg(long)]
    pub emitter_y: Option<String>,

    /// How particles are emitted: "continuous" or "burst".
    #[arg(long)]
    pub policy: Option<String>,

    /// Particles emitted per frame with the continuous policy.
    #[arg(long)]
    pub rate: Option<usize>,

    /// Seed for the particles' initial velocities.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Number of worker threads.
    #[arg(long)]
    pub threads: Option<usize>,

    /// Target frames per second.
    #[arg(long)]
    pub frame_rate: Option<u32>,

    /// Stop after this many frames even if the simulation hasn't finished.
    #[arg(long)]
    pub max_frames: Option<u64>,

    /// Run the simulation this many times, starting afresh each time it finishes.
    #[arg(long)]
    pub runs: Option<u32>,

    /// Draw every frame to the terminal.
    #[arg(long)]
    pub show: bool,

    /// Log level, overrides the config file.
    #[arg(long, value_enum)]
    pub(crate) log_level: Option<crate::config::LogLevel>,

    /// Where to write logs, overrides the config file.
    #[arg(long)]
    pub log_path: Option<std::path::PathBuf>,
}
