//! The simulation form: everything a user can change about a simulation before starting it.

use color_eyre::eyre::Result;

use particle_engine::{EmissionPolicy, EngineConfig};

/// What the user is told when any field can't be understood.
pub(crate) const INVALID_INPUT: &str = "Invalid input, please enter valid numbers";

/// The form's fields, exactly as typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SimulationForm {
    /// Total number of particles.
    pub particles: String,
    /// Width of the simulation.
    pub width: String,
    /// Height of the simulation.
    pub height: String,
    /// Emitter's horizontal position.
    pub emitter_x: String,
    /// Emitter's vertical position.
    pub emitter_y: String,
    /// "continuous" or "burst".
    pub policy: String,
}

impl SimulationForm {
    /// Prefill the form from an existing config.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            particles: config.max_particles.to_string(),
            width: config.bounds.0.to_string(),
            height: config.bounds.1.to_string(),
            emitter_x: config.origin.0.to_string(),
            emitter_y: config.origin.1.to_string(),
            policy: config.policy.to_string(),
        }
    }

    /// Replace any fields that were given on the command line.
    pub fn with_cli_overrides(mut self, cli_args: &crate::cli_args::CliArgs) -> Self {
        let overrides = [
            (&mut self.particles, &cli_args.particles),
            (&mut self.width, &cli_args.width),
            (&mut self.height, &cli_args.height),
            (&mut self.emitter_x, &cli_args.emitter_x),
            (&mut self.emitter_y, &cli_args.emitter_y),
            (&mut self.policy, &cli_args.policy),
        ];
        for (field, maybe_value) in overrides {
            if let Some(value) = maybe_value {
                field.clone_from(value);
            }
        }
        self
    }

    /// Turn the form into a config, keeping everything the form doesn't cover from `base`.
    ///
    /// Either every field is valid or nothing is returned at all.
    pub fn parse(&self, base: &EngineConfig) -> Result<EngineConfig> {
        let particles = number::<usize>("particles", &self.particles)?;
        let width = dimension("width", &self.width)?;
        let height = dimension("height", &self.height)?;
        let emitter_x = number::<f64>("emitter x", &self.emitter_x)?;
        let emitter_y = number::<f64>("emitter y", &self.emitter_y)?;
        let policy = self
            .policy
            .parse::<EmissionPolicy>()
            .map_err(|error| color_eyre::eyre::eyre!("{INVALID_INPUT}: {error}"))?;

        let mut config = base.clone();
        config.max_particles = particles;
        config.bounds = (f64::from(width), f64::from(height));
        config.origin = (emitter_x, emitter_y);
        config.policy = policy;
        config
            .validate()
            .map_err(|error| color_eyre::eyre::eyre!("{INVALID_INPUT}: {error}"))?;
        Ok(config)
    }
}

/// Parse one field, naming it if it's bad.
fn number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    let trimmed = raw.trim();
    let Ok(value) = trimmed.parse::<T>() else {
        color_eyre::eyre::bail!("{INVALID_INPUT}: {name} was '{trimmed}'");
    };
    Ok(value)
}

/// Parse a window dimension, which must be a whole number above 0.
fn dimension(name: &str, raw: &str) -> Result<u32> {
    let value = number::<u32>(name, raw)?;
    if value == 0 {
        color_eyre::eyre::bail!("{INVALID_INPUT}: {name} must be above 0");
    }
    Ok(value)
}
