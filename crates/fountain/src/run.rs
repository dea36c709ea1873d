//! Main entrypoint for running Fountain

use clap::Parser as _;
use color_eyre::eyre::{ContextCompat as _, Result};
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _, Layer as _};

use crate::cli_args::CliArgs;
use crate::config::{Config, LogLevel};
use crate::driver::{Driver, FrameStatus, Summary};
use crate::form::SimulationForm;

/// The environment variable for setting custom log filters.
const LOG_FILTERS_ENV: &str = "FOUNTAIN_LOG";

/// Main entrypoint
pub(crate) async fn run() -> Result<(Summary, Config)> {
    let (cli_args, config) = setup()?;

    let form = SimulationForm::from_config(&config.engine).with_cli_overrides(&cli_args);
    tracing::debug!("Submitted form: {form:?}");

    let mut driver = Driver::new(config.clone(), &form)?;
    let mut summary = driver.run().await?;
    for run in 1..config.runs {
        if summary.status == FrameStatus::Cancelled {
            break;
        }
        tracing::debug!("Starting run {}/{}", run + 1, config.runs);
        driver.rebuild(&form)?;
        summary = driver.run().await?;
    }
    driver.engine().shutdown()?;

    tracing::trace!("Leaving Fountain's main `run()` function");
    Ok((summary, config))
}

/// Prepare the application to start.
fn setup() -> Result<(CliArgs, Config)> {
    let cli_args = CliArgs::parse();

    let config_result = Config::load(cli_args.config.as_deref());
    let mut config = match config_result {
        Ok(config) => config,
        Err(config_error) => color_eyre::eyre::bail!("Bad config: {config_error:?}"),
    };
    config.apply_cli_overrides(&cli_args);

    setup_logging(&config)?;

    tracing::info!("Starting Fountain");
    tracing::debug!("Loaded config: {config:?}");

    Ok((cli_args, config))
}

/// Setup logging
fn setup_logging(config: &Config) -> Result<()> {
    let are_log_filters_manually_set = std::env::var(LOG_FILTERS_ENV).is_ok();
    let level_as_string = format!("{:?}", config.log_level).to_lowercase();

    let is_loggable = !matches!(config.log_level, LogLevel::Off) || are_log_filters_manually_set;
    if !is_loggable {
        return Ok(());
    }

    let path = &config.log_path;
    let directory = path.parent().context("Couldn't get log path's parent")?;
    std::fs::create_dir_all(directory)?;
    let file = std::fs::File::create(path)?;

    let filters = if are_log_filters_manually_set {
        tracing_subscriber::EnvFilter::builder()
            .with_default_directive("error".parse()?)
            .with_env_var(LOG_FILTERS_ENV)
            .from_env_lossy()
    } else {
        tracing_subscriber::EnvFilter::builder()
            .with_default_directive("off".parse()?)
            .from_env_lossy()
            .add_directive(format!("fountain={level_as_string}").parse()?)
            .add_directive(format!("particle_engine={level_as_string}").parse()?)
    };

    let logfile_layer = tracing_subscriber::fmt::layer()
        .with_writer(file)
        .with_ansi(false)
        .with_filter(filters);

    tracing_subscriber::registry().with(logfile_layer).init();

    Ok(())
}
