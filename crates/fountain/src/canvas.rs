//! Draw particles to a terminal using half-block "pixels"

use color_eyre::eyre::{bail, ContextCompat as _, Result};
use termwiz::surface::Change as TermwizChange;
use termwiz::surface::Position as TermwizPosition;

use particle_engine::{Colour, ParticleView, RenderSink};

/// A grid of terminal cells, each of which holds 2 vertically stacked pixels.
#[derive(Clone)]
pub(crate) struct Canvas {
    /// Width in columns, and therefore pixels.
    columns: usize,
    /// Height in rows. There are twice as many pixels vertically.
    rows: usize,
    /// The size of the region the particles live in, for scaling them to the grid.
    bounds: (f64, f64),
    /// A surface of terminal cells
    surface: termwiz::surface::Surface,
}

impl Canvas {
    /// Instantiate
    pub fn new(columns: usize, rows: usize, bounds: (f64, f64)) -> Self {
        let columns = columns.max(1);
        let rows = rows.max(1);
        Self {
            columns,
            rows,
            bounds,
            surface: termwiz::surface::Surface::new(columns, rows),
        }
    }

    /// Remove all pixels.
    pub fn clear(&mut self) {
        self.surface.add_change(TermwizChange::ClearScreen(
            termwiz::color::ColorAttribute::Default,
        ));
    }

    /// Add a pixel ("▀", "▄") to the canvas.
    ///
    /// Any pair of colours is drawn with the upper half block, the upper pixel in the cell's
    /// foreground and the lower pixel in its background. A lone lower pixel is the exception: it
    /// is drawn with the lower half block so that the cell keeps the terminal's default
    /// background.
    pub fn add_pixel(&mut self, x: usize, y: usize, colour: Colour) -> Result<()> {
        let (col, row) = self.coords_to_tty(x, y)?;
        self.surface.add_change(TermwizChange::CursorPosition {
            x: TermwizPosition::Absolute(col),
            y: TermwizPosition::Absolute(row),
        });

        let cell = self.get_cell_at(col, row)?;
        let is_upper_half = y.rem_euclid(2) == 0;
        let is_empty_upper = cell.str() != "▀";

        let (fg_colour, bg_colour, block) = if is_upper_half {
            let background = if cell.str() == "▄" {
                // The existing lower pixel moves from the foreground to the background.
                cell.attrs().foreground()
            } else {
                cell.attrs().background()
            };
            (make_colour_attribute(colour), background, "▀")
        } else if is_empty_upper {
            (make_colour_attribute(colour), cell.attrs().background(), "▄")
        } else {
            (cell.attrs().foreground(), make_colour_attribute(colour), "▀")
        };

        self.surface.add_changes(vec![
            TermwizChange::Attribute(termwiz::cell::AttributeChange::Foreground(fg_colour)),
            TermwizChange::Attribute(termwiz::cell::AttributeChange::Background(bg_colour)),
        ]);
        self.surface.add_change(block);

        Ok(())
    }

    /// The whole canvas as true colour terminal output, one line per row.
    pub fn render(&mut self) -> String {
        let mut output = String::new();
        for line in self.surface.screen_cells() {
            for cell in line.iter() {
                let foreground = colour_spec(cell.attrs().foreground());
                let background = colour_spec(cell.attrs().background());
                if foreground.is_none() && background.is_none() {
                    output.push_str(cell.str());
                    continue;
                }

                if let Some(spec) = foreground {
                    output.push_str(&sgr(termwiz::escape::csi::Sgr::Foreground(spec)));
                }
                if let Some(spec) = background {
                    output.push_str(&sgr(termwiz::escape::csi::Sgr::Background(spec)));
                }
                output.push_str(cell.str());
                output.push_str(&sgr(termwiz::escape::csi::Sgr::Reset));
            }
            output.push('\n');
        }
        output
    }

    /// Convert a position in the simulation's bounds to a pixel coordinate.
    #[expect(
        clippy::as_conversions,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss,
        reason = "Positions are clamped to the bounds and the grid is only terminal sized"
    )]
    fn to_pixel(&self, x: f64, y: f64) -> (usize, usize) {
        let (width, height) = self.bounds;
        let scaled_x = (x / width).clamp(0.0, 1.0) * (self.columns - 1) as f64;
        let scaled_y = (y / height).clamp(0.0, 1.0) * (self.rows * 2 - 1) as f64;
        (scaled_x.round() as usize, scaled_y.round() as usize)
    }

    /// Safely convert pixel coordinates to TTY col/row
    fn coords_to_tty(&self, x: usize, y: usize) -> Result<(usize, usize)> {
        let col = x;
        let row = y.div_euclid(2);
        if col >= self.columns {
            bail!("Tried to add pixel to column: {col}")
        }
        if row >= self.rows {
            bail!("Tried to add pixel to row: {row}")
        }
        Ok((col, row))
    }

    /// Get the cell at the given column and row.
    fn get_cell_at(&mut self, col: usize, row: usize) -> Result<termwiz::cell::Cell> {
        let cells = self.surface.screen_cells();
        let cell = cells
            .get(row)
            .context("No cell row")?
            .get(col)
            .context("No cell column")?;
        Ok(cell.clone())
    }
}

impl RenderSink for Canvas {
    fn draw(&mut self, particle: &ParticleView) {
        let (x, y) = self.to_pixel(particle.x, particle.y);
        if let Err(error) = self.add_pixel(x, y, particle.colour) {
            tracing::trace!("Couldn't draw particle: {error:?}");
        }
    }
}

/// Make a Termwiz colour attribute
const fn make_colour_attribute(colour: Colour) -> termwiz::color::ColorAttribute {
    termwiz::color::ColorAttribute::TrueColorWithDefaultFallback(termwiz::color::SrgbaTuple(
        colour.0, colour.1, colour.2, colour.3,
    ))
}

/// The true colour of a cell attribute, if it has one. Default colours are left to the terminal.
#[expect(
    clippy::wildcard_enum_match_arm,
    reason = "The canvas only ever sets true colours"
)]
fn colour_spec(attribute: termwiz::color::ColorAttribute) -> Option<termwiz::color::ColorSpec> {
    match attribute {
        termwiz::color::ColorAttribute::TrueColorWithDefaultFallback(colour)
        | termwiz::color::ColorAttribute::TrueColorWithPaletteFallback(colour, _) => {
            Some(termwiz::color::ColorSpec::TrueColor(colour))
        }
        _ => None,
    }
}

/// The escape sequence for a single graphic rendition.
fn sgr(rendition: termwiz::escape::csi::Sgr) -> String {
    termwiz::escape::CSI::Sgr(rendition).to_string()
}

#[cfg(test)]
#[expect(
    clippy::indexing_slicing,
    reason = "Tests aren't so strict"
)]
mod test {
    use super::*;

    const RED: Colour = (1.0, 0.0, 0.0, 1.0);
    const BLUE: Colour = (0.0, 0.0, 1.0, 1.0);

    fn lit_cells(canvas: &mut Canvas) -> usize {
        canvas
            .surface
            .screen_cells()
            .iter()
            .flat_map(|line| line.iter())
            .filter(|cell| cell.str() != " ")
            .count()
    }

    #[test]
    fn empty_canvas_is_blank() {
        let mut canvas = Canvas::new(3, 2, (3.0, 4.0));
        assert_eq!(canvas.render(), "   \n   \n");
    }

    #[test]
    fn upper_pixel() {
        let mut canvas = Canvas::new(1, 1, (1.0, 1.0));
        canvas.add_pixel(0, 0, RED).unwrap();

        let cells = canvas.surface.screen_cells();
        let cell = &cells[0][0];
        assert_eq!(cell.str(), "▀");
        assert_eq!(cell.attrs().foreground(), make_colour_attribute(RED));
        assert_eq!(
            cell.attrs().background(),
            termwiz::color::ColorAttribute::Default
        );
    }

    #[test]
    fn lower_pixel() {
        let mut canvas = Canvas::new(1, 1, (1.0, 1.0));
        canvas.add_pixel(0, 1, BLUE).unwrap();

        let cells = canvas.surface.screen_cells();
        let cell = &cells[0][0];
        assert_eq!(cell.str(), "▄");
        assert_eq!(cell.attrs().foreground(), make_colour_attribute(BLUE));
        assert_eq!(
            cell.attrs().background(),
            termwiz::color::ColorAttribute::Default
        );
    }

    #[test]
    fn both_pixels() {
        let mut canvas = Canvas::new(1, 1, (1.0, 1.0));
        canvas.add_pixel(0, 0, RED).unwrap();
        canvas.add_pixel(0, 1, BLUE).unwrap();

        let cells = canvas.surface.screen_cells();
        let cell = &cells[0][0];
        assert_eq!(cell.str(), "▀");
        assert_eq!(cell.attrs().foreground(), make_colour_attribute(RED));
        assert_eq!(cell.attrs().background(), make_colour_attribute(BLUE));
    }

    #[test]
    fn upper_pixel_over_a_lower_one() {
        let mut canvas = Canvas::new(1, 1, (1.0, 1.0));
        canvas.add_pixel(0, 1, BLUE).unwrap();
        canvas.add_pixel(0, 0, RED).unwrap();

        let cells = canvas.surface.screen_cells();
        let cell = &cells[0][0];
        assert_eq!(cell.str(), "▀");
        assert_eq!(cell.attrs().foreground(), make_colour_attribute(RED));
        assert_eq!(cell.attrs().background(), make_colour_attribute(BLUE));
    }

    #[test]
    fn off_grid_pixels_are_errors() {
        let mut canvas = Canvas::new(2, 2, (1.0, 1.0));
        assert!(canvas.add_pixel(2, 0, RED).is_err());
        assert!(canvas.add_pixel(0, 4, RED).is_err());
        assert_eq!(lit_cells(&mut canvas), 0);
    }

    #[test]
    fn rendered_with_true_colours() {
        let mut canvas = Canvas::new(2, 1, (1.0, 1.0));
        canvas.add_pixel(1, 0, RED).unwrap();
        let output = canvas.render();

        let expected_colour = sgr(termwiz::escape::csi::Sgr::Foreground(
            termwiz::color::ColorSpec::TrueColor(termwiz::color::SrgbaTuple(1.0, 0.0, 0.0, 1.0)),
        ));
        assert!(output.starts_with(' '));
        assert!(output.contains(&expected_colour));
        assert!(output.contains('▀'));
        assert!(output.ends_with('\n'));
    }

    #[test]
    fn particles_are_scaled_to_the_grid() {
        let mut canvas = Canvas::new(80, 24, (800.0, 600.0));
        canvas.draw(&ParticleView::new(0.0, 0.0, 5.0, BLUE));
        canvas.draw(&ParticleView::new(800.0, 600.0, 5.0, BLUE));
        canvas.draw(&ParticleView::new(400.0, 300.0, 5.0, BLUE));

        let cells = canvas.surface.screen_cells();
        assert_eq!(cells[0][0].str(), "▀");
        assert_eq!(cells[23][79].str(), "▄");
        assert_eq!(cells[12][40].str(), "▀");
        drop(cells);
        assert_eq!(lit_cells(&mut canvas), 3);

        canvas.clear();
        assert_eq!(lit_cells(&mut canvas), 0);
    }
}
