//! All the variables that can be configured for the simulation

use snafu::ensure;

use crate::emission::EmissionPolicy;
use crate::errors::{EngineError, InvalidConfigSnafu};
use crate::render::Colour;

/// The constants of the particles' physics.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
#[non_exhaustive]
pub struct Physics {
    /// Added to every particle's vertical velocity on every update.
    pub gravity: f64,
    /// Subtracted from every particle's time-to-live on every update.
    pub decay: f64,
    /// The restitution coefficient. How much velocity is kept when bouncing off a wall.
    pub restitution: f64,
    /// The radius of every particle.
    pub radius: f64,
    /// The time-to-live that every particle starts with.
    pub initial_ttl: f64,
}

impl Default for Physics {
    fn default() -> Self {
        Self {
            gravity: 0.005,
            decay: 0.016,
            restitution: 0.8,
            radius: 5.0,
            initial_ttl: 15.0,
        }
    }
}

/// All the config for the simulation
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
#[non_exhaustive]
pub struct EngineConfig {
    /// Where particles are emitted from.
    pub origin: (f64, f64),
    /// Particles emitted per tick, only used by the continuous policy.
    pub emit_rate: usize,
    /// The total budget of particles over the simulation's lifetime.
    pub max_particles: usize,
    /// The emission rule.
    pub policy: EmissionPolicy,
    /// Width and height of the region particles bounce around in.
    pub bounds: (f64, f64),
    /// Number of worker threads. Defaults to the available parallelism minus one for the caller.
    pub threads: Option<usize>,
    /// Seed for particles' initial velocities. Random if not set.
    pub seed: Option<u64>,
    /// The colour particles are drawn with.
    pub colour: Colour,
    /// The physics constants.
    pub physics: Physics,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            origin: (400.0, 300.0),
            emit_rate: 5,
            max_particles: 200,
            policy: EmissionPolicy::Continuous,
            bounds: (800.0, 600.0),
            threads: None,
            seed: None,
            colour: crate::render::BLUE,
            physics: Physics::default(),
        }
    }
}

impl EngineConfig {
    /// Check that the config describes a simulation that can actually run.
    ///
    /// # Errors
    /// `EngineError::InvalidConfig` naming the first offending field.
    pub fn validate(&self) -> Result<(), EngineError> {
        let (width, height) = self.bounds;
        ensure!(
            width.is_finite() && width > 0.0 && height.is_finite() && height > 0.0,
            InvalidConfigSnafu {
                reason: format!("bounds must be finite and > 0, got {width}x{height}"),
            }
        );
        ensure!(
            self.origin.0.is_finite() && self.origin.1.is_finite(),
            InvalidConfigSnafu {
                reason: "origin must be finite",
            }
        );
        ensure!(
            self.threads != Some(0),
            InvalidConfigSnafu {
                reason: "threads must be at least 1",
            }
        );

        let physics = &self.physics;
        ensure!(
            physics.radius.is_finite() && physics.radius > 0.0,
            InvalidConfigSnafu {
                reason: "radius must be finite and > 0",
            }
        );
        ensure!(
            physics.decay.is_finite() && physics.decay > 0.0,
            InvalidConfigSnafu {
                reason: "decay must be finite and > 0",
            }
        );
        ensure!(
            (0.0..=1.0).contains(&physics.restitution),
            InvalidConfigSnafu {
                reason: "restitution must be between 0 and 1",
            }
        );
        ensure!(
            physics.gravity.is_finite() && physics.initial_ttl.is_finite(),
            InvalidConfigSnafu {
                reason: "gravity and initial_ttl must be finite",
            }
        );

        Ok(())
    }

    /// The number of worker threads the engine will use.
    #[must_use]
    pub fn worker_threads(&self) -> usize {
        self.threads.unwrap_or_else(crate::pool::default_threads)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn bad_bounds() {
        let config = EngineConfig {
            bounds: (0.0, 600.0),
            ..EngineConfig::default()
        };
        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("bounds"));
    }

    #[test]
    fn bad_radius() {
        let mut config = EngineConfig::default();
        config.physics.radius = -1.0;
        assert!(config.validate().unwrap_err().to_string().contains("radius"));
    }

    #[test]
    fn bad_restitution() {
        let mut config = EngineConfig::default();
        config.physics.restitution = 1.5;
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("restitution"));
    }

    #[test]
    fn zero_threads() {
        let config = EngineConfig {
            threads: Some(0),
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml() {
        let config: EngineConfig = toml::from_str(
            r#"
            max_particles = 50
            policy = "burst"

            [physics]
            gravity = 0.0
            "#,
        )
        .unwrap();
        assert_eq!(config.max_particles, 50);
        assert_eq!(config.policy, EmissionPolicy::Burst);
        assert_eq!(config.emit_rate, 5);
        assert!(config.physics.gravity.abs() < f64::EPSILON);
        assert!((config.physics.restitution - 0.8).abs() < f64::EPSILON);
    }
}
