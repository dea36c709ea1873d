//! Where new particles get their initial velocities from.

use rand::{Rng as _, SeedableRng as _};

/// A source of initial velocities for newly emitted particles.
///
/// Emission batches are built concurrently on the worker threads, so a sampler is only given the
/// id of the particle it is sampling for. Keying on the id, rather than on call order, is what
/// keeps a seeded simulation reproducible whatever the number of threads.
pub trait VelocitySampler: Send + Sync {
    /// A velocity with both components in `[-1, 1]`.
    fn sample(&self, id: u64) -> (f64, f64);
}

/// Random velocities that are fully determined by a base seed and the particle's id.
#[derive(Debug, Clone, Copy)]
pub struct SeededVelocities {
    /// Base seed that every particle's own generator is derived from.
    seed: u64,
}

impl SeededVelocities {
    /// Use the given seed, or pick a random one.
    #[must_use]
    pub fn new(maybe_seed: Option<u64>) -> Self {
        let seed = maybe_seed.unwrap_or_else(|| rand::thread_rng().gen());
        tracing::trace!("Seeding initial velocities with {seed}");
        Self { seed }
    }
}

impl VelocitySampler for SeededVelocities {
    fn sample(&self, id: u64) -> (f64, f64) {
        let mut rng = rand::rngs::StdRng::seed_from_u64(self.seed ^ id.rotate_left(32));
        (rng.gen_range(-1.0..=1.0), rng.gen_range(-1.0..=1.0))
    }
}

impl<F> VelocitySampler for F
where
    F: Fn(u64) -> (f64, f64) + Send + Sync,
{
    fn sample(&self, id: u64) -> (f64, f64) {
        self(id)
    }
}
