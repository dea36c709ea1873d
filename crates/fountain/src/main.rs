//! Just `main()`. Keep as small as possible.

pub mod canvas;
pub mod cli_args;
pub mod config;
pub mod driver;
pub mod form;
pub mod run;

use color_eyre::eyre::Result;

#[expect(
    clippy::print_stdout,
    clippy::print_stderr,
    reason = "It's our central place for communicating with the user on CLI"
)]
#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let result = run::run().await;
    tracing::debug!("Fountain is exiting");

    match result {
        Ok((summary, config)) => {
            println!(
                "Total animation time: {:.3} seconds",
                summary.elapsed.as_secs_f64()
            );
            println!(
                "{} frame(s), {} particle(s) emitted, ended {:?}",
                summary.frames, summary.total_emitted, summary.status
            );
            if config.log_level != crate::config::LogLevel::Off {
                println!("Logs saved to {}", config.log_path.display());
            }
        }
        Err(error) => {
            tracing::error!("{error:?}");
            eprintln!("Error: {error}");
        }
    }

    Ok(())
}
