//! The contract between the engine and whatever draws its particles.

/// An RGBA colour.
pub type Colour = (f32, f32, f32, f32);

/// The default particle colour, an opaque blue.
pub const BLUE: Colour = (0.0, 0.0, 1.0, 1.0);

/// Everything a renderer needs to know to draw one particle.
#[derive(Debug, Clone, Copy, PartialEq)]
#[non_exhaustive]
pub struct ParticleView {
    /// Horizontal position, 0 is the left edge of the bounds.
    pub x: f64,
    /// Vertical position, 0 is the top edge of the bounds. Gravity pulls towards larger `y`.
    pub y: f64,
    /// Radius of the particle.
    pub radius: f64,
    /// Colour to draw it with.
    pub colour: Colour,
}

impl ParticleView {
    /// Instantiate
    #[must_use]
    pub const fn new(x: f64, y: f64, radius: f64, colour: Colour) -> Self {
        Self {
            x,
            y,
            radius,
            colour,
        }
    }
}

/// Something that can draw particles, eg a canvas, a terminal or a test's `Vec`.
///
/// The engine only ever hands out copies, so nothing a sink does can affect the simulation.
pub trait RenderSink {
    /// Draw a single particle.
    fn draw(&mut self, particle: &ParticleView);
}

impl<F> RenderSink for F
where
    F: FnMut(&ParticleView),
{
    fn draw(&mut self, particle: &ParticleView) {
        self(particle);
    }
}
