//! When and how many particles enter the simulation.

use crate::errors::{ParseError, UnknownPolicySnafu};

/// The rule governing how particles are emitted.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum EmissionPolicy {
    /// A fixed number of particles every tick until the budget is used up.
    #[default]
    Continuous,
    /// The whole budget at once, exactly one time.
    Burst,
}

impl std::str::FromStr for EmissionPolicy {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "continuous" => Ok(Self::Continuous),
            "burst" => Ok(Self::Burst),
            _ => UnknownPolicySnafu { value }.fail(),
        }
    }
}

impl std::fmt::Display for EmissionPolicy {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Continuous => write!(formatter, "continuous"),
            Self::Burst => write!(formatter, "burst"),
        }
    }
}

/// Where the emitter is in its lifetime.
///
/// Continuous: `Idle -> Emitting -> Exhausted`. Burst: `Idle -> BurstPending -> BurstDone`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum EmissionState {
    /// Nothing has been emitted yet.
    Idle,
    /// Continuous emission is under way and there is still budget left.
    Emitting,
    /// The continuous budget is used up.
    Exhausted,
    /// A burst has been requested but not yet merged into the simulation.
    BurstPending,
    /// The one and only burst has happened.
    BurstDone,
}

/// The emitter's bookkeeping. Only ever changed under the engine's collection lock, together with
/// the merge of the particles it accounts for.
#[derive(Debug, Clone)]
pub(crate) struct Emission {
    /// The emission rule.
    policy: EmissionPolicy,
    /// Particles per tick, continuous only.
    rate: usize,
    /// The total budget of particles.
    max_particles: usize,
    /// How many particles have been merged into the simulation so far.
    total_emitted: usize,
    /// Whether the one-shot burst has happened.
    has_emitted: bool,
    /// Current state of the state machine.
    state: EmissionState,
}

impl Emission {
    /// Instantiate
    pub const fn new(policy: EmissionPolicy, rate: usize, max_particles: usize) -> Self {
        Self {
            policy,
            rate,
            max_particles,
            total_emitted: 0,
            has_emitted: false,
            state: EmissionState::Idle,
        }
    }

    /// How many particles the next `emit()` should create.
    pub fn plan(&self) -> usize {
        match self.policy {
            EmissionPolicy::Continuous => self
                .rate
                .min(self.max_particles.saturating_sub(self.total_emitted)),
            EmissionPolicy::Burst => {
                if self.has_emitted {
                    return 0;
                }
                self.max_particles
            }
        }
    }

    /// A burst's batch is being built.
    pub fn begin_burst(&mut self) {
        if self.policy == EmissionPolicy::Burst && !self.has_emitted {
            self.state = EmissionState::BurstPending;
        }
    }

    /// The batch that was being built will never be merged, so forget it was ever started.
    pub fn abandon(&mut self) {
        if self.state == EmissionState::BurstPending {
            self.state = EmissionState::Idle;
        }
    }

    /// Record that `merged` particles have just been added to the simulation.
    pub fn commit(&mut self, merged: usize) {
        self.total_emitted = self.total_emitted.saturating_add(merged);
        match self.policy {
            EmissionPolicy::Continuous => {
                self.state = if self.total_emitted >= self.max_particles {
                    EmissionState::Exhausted
                } else if self.total_emitted > 0 {
                    EmissionState::Emitting
                } else {
                    EmissionState::Idle
                };
            }
            EmissionPolicy::Burst => {
                self.has_emitted = true;
                self.state = EmissionState::BurstDone;
            }
        }
    }

    /// Will the emitter never emit again?
    pub const fn is_done(&self) -> bool {
        match self.policy {
            EmissionPolicy::Continuous => self.total_emitted == self.max_particles,
            EmissionPolicy::Burst => self.has_emitted,
        }
    }

    /// The id given to the next emitted particle. Ids are never reused.
    pub fn next_id(&self) -> u64 {
        u64::try_from(self.total_emitted).unwrap_or(u64::MAX)
    }

    /// How many particles have been merged into the simulation so far.
    pub const fn total_emitted(&self) -> usize {
        self.total_emitted
    }

    /// Current state of the state machine.
    pub const fn state(&self) -> EmissionState {
        self.state
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn tick(emission: &mut Emission) -> usize {
        let planned = emission.plan();
        emission.begin_burst();
        emission.commit(planned);
        planned
    }

    #[test]
    fn continuous_rate_then_remainder() {
        let mut emission = Emission::new(EmissionPolicy::Continuous, 5, 12);
        assert_eq!(emission.state(), EmissionState::Idle);
        assert_eq!(tick(&mut emission), 5);
        assert_eq!(emission.state(), EmissionState::Emitting);
        assert_eq!(tick(&mut emission), 5);
        assert_eq!(tick(&mut emission), 2);
        assert_eq!(emission.state(), EmissionState::Exhausted);
        assert_eq!(tick(&mut emission), 0);
        assert_eq!(emission.total_emitted(), 12);
        assert!(emission.is_done());
    }

    #[test]
    fn burst_happens_once() {
        let mut emission = Emission::new(EmissionPolicy::Burst, 5, 40);
        assert_eq!(emission.plan(), 40);
        assert_eq!(emission.state(), EmissionState::Idle);
        emission.begin_burst();
        assert_eq!(emission.state(), EmissionState::BurstPending);
        assert!(!emission.is_done());
        emission.commit(40);
        assert_eq!(emission.state(), EmissionState::BurstDone);
        assert_eq!(emission.plan(), 0);
        assert_eq!(emission.total_emitted(), 40);
    }

    #[test]
    fn abandoned_burst_is_forgotten() {
        let mut emission = Emission::new(EmissionPolicy::Burst, 5, 40);
        emission.begin_burst();
        emission.abandon();
        assert_eq!(emission.state(), EmissionState::Idle);
        assert_eq!(emission.plan(), 40);
        assert_eq!(emission.total_emitted(), 0);
    }

    #[test]
    fn empty_budget() {
        let mut emission = Emission::new(EmissionPolicy::Continuous, 5, 0);
        assert_eq!(emission.plan(), 0);
        assert!(emission.is_done());

        let mut emission = Emission::new(EmissionPolicy::Burst, 5, 0);
        assert_eq!(tick(&mut emission), 0);
        assert_eq!(emission.state(), EmissionState::BurstDone);
        assert!(emission.is_done());
    }

    #[test]
    fn parse_policy() {
        assert_eq!(
            "continuous".parse::<EmissionPolicy>().ok(),
            Some(EmissionPolicy::Continuous)
        );
        assert_eq!(" Burst ".parse::<EmissionPolicy>().ok(), Some(EmissionPolicy::Burst));
        assert!("fountain".parse::<EmissionPolicy>().is_err());
        assert_eq!(EmissionPolicy::Burst.to_string(), "burst");
    }
}
