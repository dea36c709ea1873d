//! A single particle and the maths of how it moves and collides.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::config::Physics;

/// A point particle with a radius, bouncing around inside a rectangular region.
///
/// Particles are plain data. Whilst a tick is being computed they live behind a [`Locked`] so
/// that collisions from different worker threads can safely change their velocities.
#[derive(Debug, Clone, Copy, PartialEq)]
#[non_exhaustive]
pub struct Particle {
    /// Stable identifier, assigned in emission order and never reused.
    pub id: u64,
    /// Horizontal position.
    pub x: f64,
    /// Vertical position. Gravity pulls towards larger `y`.
    pub y: f64,
    /// Horizontal velocity, per tick.
    pub vx: f64,
    /// Vertical velocity, per tick.
    pub vy: f64,
    /// Remaining time-to-live. The particle is alive whilst this is above 0.
    pub ttl: f64,
    /// Radius, always > 0.
    pub radius: f64,
    /// Width of the region the particle is contained in.
    pub width: f64,
    /// Height of the region the particle is contained in.
    pub height: f64,
}

impl Particle {
    /// Instantiate
    #[must_use]
    pub const fn new(
        id: u64,
        position: (f64, f64),
        velocity: (f64, f64),
        ttl: f64,
        radius: f64,
        bounds: (f64, f64),
    ) -> Self {
        Self {
            id,
            x: position.0,
            y: position.1,
            vx: velocity.0,
            vy: velocity.1,
            ttl,
            radius,
            width: bounds.0,
            height: bounds.1,
        }
    }

    /// Is there any time left to live?
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.ttl > 0.0
    }

    /// Kinetic energy. Every particle has the same unit mass.
    #[must_use]
    pub fn kinetic_energy(&self) -> f64 {
        0.5 * self.vx.mul_add(self.vx, self.vy * self.vy)
    }

    /// Advance one step: gravity, decay, integration and then reflection off the walls.
    pub fn update(&mut self, physics: &Physics) {
        self.vy += physics.gravity;
        self.ttl -= physics.decay;
        self.x += self.vx;
        self.y += self.vy;

        (self.x, self.vx) = reflect(self.x, self.vx, self.width, physics.restitution);
        (self.y, self.vy) = reflect(self.y, self.vy, self.height, physics.restitution);
    }

    /// Elastic impulse between two overlapping particles of equal mass.
    ///
    /// Nothing happens if they don't overlap, if they are already moving apart, or if their
    /// centres coincide exactly, as there is then no contact normal to push along.
    ///
    /// Returns whether an impulse was applied.
    pub fn collide(&mut self, other: &mut Self) -> bool {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let distance = dx.hypot(dy);
        if distance >= self.radius + other.radius || distance <= f64::EPSILON {
            return false;
        }

        let normal_x = dx / distance;
        let normal_y = dy / distance;
        let relative_vx = other.vx - self.vx;
        let relative_vy = other.vy - self.vy;
        let velocity_along_normal = relative_vx.mul_add(normal_x, relative_vy * normal_y);
        if velocity_along_normal > 0.0 {
            return false;
        }

        // Equal unit masses, so the full impulse is split evenly between the pair.
        let impulse = -velocity_along_normal;
        self.vx -= impulse * normal_x;
        self.vy -= impulse * normal_y;
        other.vx += impulse * normal_x;
        other.vy += impulse * normal_y;
        true
    }
}

/// Clamp a coordinate to `[0, bound]`, reversing and damping its velocity if it was outside.
fn reflect(position: f64, velocity: f64, bound: f64, restitution: f64) -> (f64, f64) {
    if position < 0.0 {
        (0.0, -velocity * restitution)
    } else if position > bound {
        (bound, -velocity * restitution)
    } else {
        (position, velocity)
    }
}

/// A particle behind its own lock, for the duration of a single tick.
#[derive(Debug)]
pub struct Locked {
    /// Copy of the particle's id, readable without taking the lock.
    id: u64,
    /// The particle itself.
    particle: Mutex<Particle>,
}

impl Locked {
    /// Wrap a particle.
    #[must_use]
    pub const fn new(particle: Particle) -> Self {
        Self {
            id: particle.id,
            particle: Mutex::new(particle),
        }
    }

    /// Lock the particle.
    ///
    /// A poisoned lock means a worker panicked mid-tick, which rayon re-raises on the calling
    /// thread anyway, so the particle is still handed out.
    pub fn lock(&self) -> MutexGuard<'_, Particle> {
        self.particle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Collide two particles that may concurrently be colliding with others on other threads.
    ///
    /// Both locks are always taken in ascending id order, so two threads can never hold one lock
    /// each whilst waiting on the other's.
    pub fn collide(&self, other: &Self) -> bool {
        if self.id == other.id {
            return false;
        }

        if self.id < other.id {
            let mut first = self.lock();
            let mut second = other.lock();
            first.collide(&mut second)
        } else {
            let mut first = other.lock();
            let mut second = self.lock();
            second.collide(&mut first)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn physics() -> Physics {
        Physics::default()
    }

    fn particle(id: u64, position: (f64, f64), velocity: (f64, f64)) -> Particle {
        Particle::new(id, position, velocity, 15.0, 5.0, (800.0, 600.0))
    }

    #[test]
    fn gravity_and_integration() {
        let mut particle = particle(0, (100.0, 100.0), (0.0, 0.0));
        particle.update(&physics());
        assert!((particle.vy - physics().gravity).abs() < f64::EPSILON);
        assert!((particle.y - (100.0 + physics().gravity)).abs() < f64::EPSILON);
        assert!((particle.x - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn decays() {
        let mut particle = particle(0, (100.0, 100.0), (0.0, 0.0));
        particle.ttl = 0.02;
        particle.update(&physics());
        assert!(particle.ttl < 0.02);
        assert!(particle.is_alive());
        particle.update(&physics());
        assert!(!particle.is_alive());
    }

    #[test]
    fn bounces_off_right_wall() {
        let mut particle = particle(0, (799.0, 100.0), (2.0, 0.0));
        particle.update(&physics());
        assert!((particle.x - 800.0).abs() < f64::EPSILON);
        assert!((particle.vx - -1.6).abs() < 1e-12);
    }

    #[test]
    fn bounces_off_top_and_left_walls() {
        let mut particle = particle(0, (1.0, 1.0), (-3.0, -3.0));
        particle.update(&physics());
        assert!(particle.x.abs() < f64::EPSILON);
        assert!(particle.y.abs() < f64::EPSILON);
        assert!(particle.vx > 0.0);
        assert!(particle.vy > 0.0);
    }

    #[test]
    fn approaching_particles_exchange_normal_velocity() {
        let mut left = particle(0, (100.0, 100.0), (1.0, 0.0));
        let mut right = particle(1, (105.0, 100.0), (-1.0, 0.0));
        assert!(left.collide(&mut right));
        assert!((left.vx - -1.0).abs() < 1e-12);
        assert!((right.vx - 1.0).abs() < 1e-12);
        assert!(left.vy.abs() < 1e-12);
        assert!(right.vy.abs() < 1e-12);
    }

    #[test]
    fn separating_particles_are_untouched() {
        let mut left = particle(0, (100.0, 100.0), (-1.0, 0.3));
        let mut right = particle(1, (105.0, 100.0), (1.0, 0.2));
        let (left_before, right_before) = (left, right);
        assert!(!left.collide(&mut right));
        assert_eq!(left, left_before);
        assert_eq!(right, right_before);
    }

    #[test]
    fn distant_particles_are_untouched() {
        let mut left = particle(0, (100.0, 100.0), (1.0, 0.0));
        let mut right = particle(1, (200.0, 100.0), (-1.0, 0.0));
        assert!(!left.collide(&mut right));
    }

    #[test]
    fn coincident_particles_are_untouched() {
        let mut left = particle(0, (100.0, 100.0), (1.0, 0.0));
        let mut right = particle(1, (100.0, 100.0), (-1.0, 0.0));
        assert!(!left.collide(&mut right));
        assert!(left.vx.is_finite());
    }

    #[test]
    fn collision_conserves_energy_and_momentum() {
        let mut left = particle(0, (100.0, 100.0), (0.7, -0.2));
        let mut right = particle(1, (103.0, 104.0), (-0.4, -0.9));
        let energy = left.kinetic_energy() + right.kinetic_energy();
        let momentum = (left.vx + right.vx, left.vy + right.vy);
        assert!(left.collide(&mut right));
        let energy_after = left.kinetic_energy() + right.kinetic_energy();
        assert!((energy - energy_after).abs() < 1e-12);
        assert!((momentum.0 - (left.vx + right.vx)).abs() < 1e-12);
        assert!((momentum.1 - (left.vy + right.vy)).abs() < 1e-12);
    }

    #[test]
    fn locked_collision_is_symmetric() {
        let a = Locked::new(particle(7, (100.0, 100.0), (1.0, 0.0)));
        let b = Locked::new(particle(3, (105.0, 100.0), (-1.0, 0.0)));
        // The higher id is on the left, the locks are still taken lowest first.
        assert!(a.collide(&b));
        assert!((a.lock().vx - -1.0).abs() < 1e-12);
        assert!((b.lock().vx - 1.0).abs() < 1e-12);
        assert!(!a.collide(&a));
    }
}
