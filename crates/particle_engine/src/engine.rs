//! The emitter and the per-tick orchestration of all the parallel phases.
//!
//! A tick is `emit()` then `update()`. Each phase fans out over the worker pool and is fully
//! joined before the next starts:
//!
//!   * emission: every worker builds its own local batch, then all batches are merged into the
//!     shared collection under one exclusive lock.
//!   * physics: every worker integrates its own contiguous chunk of a snapshot.
//!   * collision: every worker checks its chunk's particles against all later particles, so each
//!     unordered pair is tested exactly once across all workers.
//!   * compaction: every worker keeps its chunk's survivors, which then replace the shared
//!     collection in chunk order.
//!
//! The shared collection is only ever touched at phase boundaries, so anyone calling `render()`
//! sees either the pre-tick or post-tick particles, never a half-merged mix.

use std::ops::Range;
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::EngineConfig;
use crate::emission::{Emission, EmissionState};
use crate::errors::EngineError;
use crate::particle::{Locked, Particle};
use crate::pool::{CancelToken, Cancelled, WorkerPool};
use crate::render::{ParticleView, RenderSink};
use crate::velocity::{SeededVelocities, VelocitySampler};

/// How many outer collision iterations a worker does between checking for cancellation.
const CANCEL_CHECK_INTERVAL: usize = 64;

/// What became of an `emit()` or `update()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Outcome {
    /// The phase ran to completion.
    Completed {
        /// For `emit()` the number of particles created, for `update()` the number of survivors.
        particles: usize,
    },
    /// Cancellation was requested. Nothing from the phase was applied.
    Cancelled,
}

/// Everything guarded by the collection lock. Particles and the emission bookkeeping that
/// accounts for them always change together.
#[derive(Debug)]
struct Shared {
    /// All the live particles.
    particles: Vec<Particle>,
    /// Emission policy state.
    emission: Emission,
}

/// Emits, simulates and hands out snapshots of a population of particles.
///
/// All methods take `&self`, so the engine can be shared between a thread driving ticks and a
/// thread rendering them.
pub struct Engine {
    /// The config the engine was built with.
    config: EngineConfig,
    /// The shared particle collection.
    shared: RwLock<Shared>,
    /// Serialises ticks and owns the worker pool. `None` once shut down.
    workers: Mutex<Option<WorkerPool>>,
    /// Number of worker threads, kept so it can be read without waiting on a tick.
    threads: usize,
    /// Where new velocities come from.
    sampler: Box<dyn VelocitySampler>,
    /// Shared with the pool's tasks.
    cancel: CancelToken,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Engine")
            .field("config", &self.config)
            .field("threads", &self.threads)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Validate the config and start the worker pool.
    ///
    /// # Errors
    /// If the config is invalid or the worker threads can't be spawned.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let sampler = SeededVelocities::new(config.seed);
        Self::with_sampler(config, sampler)
    }

    /// Like [`Engine::new`] but with a custom source of initial velocities.
    ///
    /// # Errors
    /// If the config is invalid or the worker threads can't be spawned.
    pub fn with_sampler<S>(config: EngineConfig, sampler: S) -> Result<Self, EngineError>
    where
        S: VelocitySampler + 'static,
    {
        config.validate()?;

        let cancel = CancelToken::default();
        let threads = config.worker_threads();
        let pool = WorkerPool::new(threads, cancel.clone())?;
        let emission = Emission::new(config.policy, config.emit_rate, config.max_particles);

        tracing::debug!(
            "Particle engine created: {} policy, {} particles at {}/tick, {threads} worker(s)",
            config.policy,
            config.max_particles,
            config.emit_rate
        );

        Ok(Self {
            config,
            shared: RwLock::new(Shared {
                particles: Vec::new(),
                emission,
            }),
            workers: Mutex::new(Some(pool)),
            threads,
            sampler: Box::new(sampler),
            cancel,
        })
    }

    /// Create this tick's new particles, if the emission policy calls for any.
    ///
    /// # Errors
    /// `EngineError::ShutDown` after `shutdown()`, or if a lock was poisoned.
    pub fn emit(&self) -> Result<Outcome, EngineError> {
        let workers = self.lock_workers()?;
        let pool = workers.as_ref().ok_or(EngineError::ShutDown)?;

        let (to_emit, first_id) = {
            let mut shared = self.write_shared()?;
            let to_emit = shared.emission.plan();
            if to_emit == 0 {
                // A burst with an empty budget still uses up its one shot.
                shared.emission.commit(0);
                return Ok(Outcome::Completed { particles: 0 });
            }
            shared.emission.begin_burst();
            (to_emit, shared.emission.next_id())
        };

        let batches = match pool.fan_out(to_emit, |chunk| Some(self.build_batch(first_id, chunk))) {
            Ok(batches) => batches,
            Err(Cancelled) => {
                self.write_shared()?.emission.abandon();
                return Ok(self.cancelled("emission"));
            }
        };

        let mut shared = self.write_shared()?;
        let before = shared.particles.len();
        for batch in batches {
            shared.particles.extend(batch);
        }
        let merged = shared.particles.len() - before;
        shared.emission.commit(merged);
        drop(shared);

        tracing::trace!("Emitted {merged} particle(s)");
        Ok(Outcome::Completed { particles: merged })
    }

    /// Advance every particle one step, resolve collisions and drop the dead.
    ///
    /// # Errors
    /// `EngineError::ShutDown` after `shutdown()`, or if a lock was poisoned.
    pub fn update(&self) -> Result<Outcome, EngineError> {
        let workers = self.lock_workers()?;
        let pool = workers.as_ref().ok_or(EngineError::ShutDown)?;

        let snapshot = self.read_shared()?.particles.clone();
        if snapshot.is_empty() {
            self.write_shared()?.particles.clear();
            return Ok(Outcome::Completed { particles: 0 });
        }

        let particles: Vec<Locked> = snapshot.into_iter().map(Locked::new).collect();

        let survivors = match self.run_phases(pool, &particles) {
            Ok(survivors) => survivors,
            Err(Cancelled) => return Ok(self.cancelled("update")),
        };

        let count = survivors.len();
        self.write_shared()?.particles = survivors;
        tracing::trace!("{count} particle(s) survived the tick");
        Ok(Outcome::Completed { particles: count })
    }

    /// Physics, then collisions, then compaction. Each phase is joined before the next.
    fn run_phases(
        &self,
        pool: &WorkerPool,
        particles: &[Locked],
    ) -> Result<Vec<Particle>, Cancelled> {
        let total = particles.len();
        let physics = &self.config.physics;

        let positions: Vec<(f64, f64)> = pool
            .fan_out(total, |chunk| {
                let mut positions = Vec::with_capacity(chunk.len());
                for particle in &particles[chunk] {
                    let mut particle = particle.lock();
                    particle.update(physics);
                    positions.push((particle.x, particle.y));
                }
                Some(positions)
            })?
            .into_iter()
            .flatten()
            .collect();

        let radius = physics.radius;
        pool.fan_out(total, |chunk| {
            for (checked, i) in chunk.enumerate() {
                if checked % CANCEL_CHECK_INTERVAL == 0 && self.cancel.is_cancelled() {
                    return None;
                }
                for j in candidates(i, &positions, radius) {
                    particles[i].collide(&particles[j]);
                }
            }
            Some(())
        })?;

        let survivors = pool
            .fan_out(total, |chunk| {
                let alive: Vec<Particle> = particles[chunk]
                    .iter()
                    .map(|particle| *particle.lock())
                    .filter(Particle::is_alive)
                    .collect();
                Some(alive)
            })?
            .into_iter()
            .flatten()
            .collect();

        Ok(survivors)
    }

    /// Build one worker's batch of new particles. Ids follow on from `first_id` in chunk order.
    fn build_batch(&self, first_id: u64, chunk: Range<usize>) -> Vec<Particle> {
        let physics = &self.config.physics;
        chunk
            .map(|offset| {
                let id = first_id + u64::try_from(offset).unwrap_or(u64::MAX);
                Particle::new(
                    id,
                    self.config.origin,
                    self.sampler.sample(id),
                    physics.initial_ttl,
                    physics.radius,
                    self.config.bounds,
                )
            })
            .collect()
    }

    /// Draw every live particle. Only holds the collection lock long enough to copy it.
    ///
    /// Returns the number of particles drawn.
    ///
    /// # Errors
    /// If the collection lock was poisoned.
    pub fn render<S: RenderSink + ?Sized>(&self, sink: &mut S) -> Result<usize, EngineError> {
        let colour = self.config.colour;
        let views: Vec<ParticleView> = self
            .read_shared()?
            .particles
            .iter()
            .map(|particle| ParticleView::new(particle.x, particle.y, particle.radius, colour))
            .collect();

        for view in &views {
            sink.draw(view);
        }
        Ok(views.len())
    }

    /// Will nothing more ever happen? Ie the emitter is done and every particle has died.
    ///
    /// # Errors
    /// If the collection lock was poisoned.
    pub fn finished(&self) -> Result<bool, EngineError> {
        let shared = self.read_shared()?;
        Ok(shared.emission.is_done() && shared.particles.is_empty())
    }

    /// Stop any running phase and release the worker threads. Further calls to `emit()` and
    /// `update()` return `EngineError::ShutDown`.
    ///
    /// # Errors
    /// If the tick lock was poisoned.
    pub fn shutdown(&self) -> Result<(), EngineError> {
        self.cancel.cancel();
        let maybe_pool = self.lock_workers()?.take();
        if maybe_pool.is_some() {
            tracing::debug!("Particle engine worker pool released");
        }
        drop(maybe_pool);
        Ok(())
    }

    /// A handle that can cancel the engine's phases from any thread.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// A copy of all the live particles.
    ///
    /// # Errors
    /// If the collection lock was poisoned.
    pub fn snapshot(&self) -> Result<Vec<Particle>, EngineError> {
        Ok(self.read_shared()?.particles.clone())
    }

    /// Number of live particles.
    ///
    /// # Errors
    /// If the collection lock was poisoned.
    pub fn len(&self) -> Result<usize, EngineError> {
        Ok(self.read_shared()?.particles.len())
    }

    /// Are there no live particles?
    ///
    /// # Errors
    /// If the collection lock was poisoned.
    pub fn is_empty(&self) -> Result<bool, EngineError> {
        Ok(self.read_shared()?.particles.is_empty())
    }

    /// Total kinetic energy of all live particles.
    ///
    /// # Errors
    /// If the collection lock was poisoned.
    pub fn kinetic_energy(&self) -> Result<f64, EngineError> {
        Ok(self
            .read_shared()?
            .particles
            .iter()
            .map(Particle::kinetic_energy)
            .sum())
    }

    /// How many particles have been emitted over the engine's lifetime.
    ///
    /// # Errors
    /// If the collection lock was poisoned.
    pub fn total_emitted(&self) -> Result<usize, EngineError> {
        Ok(self.read_shared()?.emission.total_emitted())
    }

    /// Where the emitter is in its lifetime.
    ///
    /// # Errors
    /// If the collection lock was poisoned.
    pub fn emission_state(&self) -> Result<EmissionState, EngineError> {
        Ok(self.read_shared()?.emission.state())
    }

    /// Number of worker threads.
    #[must_use]
    pub const fn threads(&self) -> usize {
        self.threads
    }

    /// The config the engine was built with.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Log and report a cancelled phase.
    fn cancelled(&self, phase: &str) -> Outcome {
        tracing::warn!("Particle engine {phase} phase cancelled, nothing was applied");
        debug_assert!(self.cancel.is_cancelled(), "only cancellation stops a phase");
        Outcome::Cancelled
    }

    /// Take the tick lock.
    fn lock_workers(&self) -> Result<MutexGuard<'_, Option<WorkerPool>>, EngineError> {
        self.workers
            .lock()
            .map_err(|_| EngineError::Poisoned { lock: "tick" })
    }

    /// Take the collection lock for reading.
    fn read_shared(&self) -> Result<RwLockReadGuard<'_, Shared>, EngineError> {
        self.shared
            .read()
            .map_err(|_| EngineError::Poisoned { lock: "collection" })
    }

    /// Take the collection lock for writing.
    fn write_shared(&self) -> Result<RwLockWriteGuard<'_, Shared>, EngineError> {
        self.shared
            .write()
            .map_err(|_| EngineError::Poisoned { lock: "collection" })
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(error) = self.shutdown() {
            tracing::error!("Shutting down particle engine: {error:?}");
        }
    }
}

/// Every particle after `i` whose centre is within a `2 * radius` box of particle `i`'s.
///
/// Only later particles are candidates, so across all `i` each unordered pair comes up once.
fn candidates(
    i: usize,
    positions: &[(f64, f64)],
    radius: f64,
) -> impl Iterator<Item = usize> + '_ {
    let (x, y) = positions[i];
    let reach = radius * 2.0;
    positions
        .iter()
        .enumerate()
        .skip(i + 1)
        .filter(move |(_, &(other_x, other_y))| {
            (x - other_x).abs() < reach && (y - other_y).abs() < reach
        })
        .map(|(j, _)| j)
}
