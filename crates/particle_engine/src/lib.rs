//! # Particle Engine
//! A bounded population of point particles, emitted from a single source and advanced under
//! simple physics: gravity, decay, wall reflection and pairwise elastic collisions.
//!
//! Every tick is split across a fixed pool of worker threads. The [`engine::Engine`] owns the
//! one shared collection of particles and only ever touches it at phase boundaries, whilst the
//! workers operate on snapshots or their own local batches. Collisions between particles handled
//! by different workers are kept race-free with per-particle locks taken in a stable order.
//!
//! Rendering, UI and the frame loop are not part of this crate. A renderer only needs to
//! implement [`render::RenderSink`].

#![expect(clippy::pub_use, reason = "How else are you supposed re-export??")]

pub mod config;
pub mod emission;
pub mod engine;
pub mod errors;
pub mod partition;
pub mod particle;
pub mod pool;
pub mod render;
pub mod velocity;

pub use config::{EngineConfig, Physics};
pub use emission::{EmissionPolicy, EmissionState};
pub use engine::{Engine, Outcome};
pub use errors::EngineError;
pub use particle::Particle;
pub use pool::CancelToken;
pub use render::{Colour, ParticleView, RenderSink};
pub use velocity::{SeededVelocities, VelocitySampler};
