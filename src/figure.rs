use crate::colormap::Colormap;
use crate::enums::{Interpolation, Orientation};
use crate::interpolator::Interpolator;
use crate::volume::{Volume, Window};

use image::{Pixel, Rgba, RgbaImage, imageops};
use ndarray::ArrayView2;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

const MARGIN: u32 = 10;
const COLORBAR_WIDTH: u32 = 20;
const GRID_COLOR: Rgba<u8> = Rgba([211, 211, 211, 128]);

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("No volumes to display")]
    NoVolumes,

    #[error("Subplot grid needs at least one row")]
    InvalidLayout,

    #[error("Slice spacing must be at least 1")]
    InvalidSpacing,

    #[error("Volume {index} has no slices")]
    EmptyVolume { index: usize },

    #[error("Slice {index} is out of range for axis {axis} (length {len})")]
    SliceOutOfRange {
        axis: Orientation,
        index: usize,
        len: usize,
    },

    #[error("Volume {index} has {found} slices along the axis, expected at least {expected}")]
    ShapeMismatch {
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error("Color window [{vmin}, {vmax}] is inverted")]
    InvalidWindow { vmin: f32, vmax: f32 },

    #[error("Figure of {width}x{height} pixels is too small for the layout")]
    FigureTooSmall { width: u32, height: u32 },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One subplot: a 2D slice with its color scaling and title.
pub struct Panel<'a> {
    pub slice: ArrayView2<'a, f32>,
    pub window: Window,
    pub colormap: Colormap,
    pub title: String,
}

/// Vertical color scale drawn on the right edge of the figure.
#[derive(Clone, Copy, Debug)]
pub struct Colorbar {
    pub window: Window,
    pub colormap: Colormap,
    /// Height as a fraction of the figure height
    pub scale: f32,
}

#[derive(Clone, Copy, Debug)]
pub struct FigureStyle {
    /// (width, height) in pixels
    pub size: (u32, u32),
    pub grid: bool,
    pub interpolation: Interpolation,
    pub background: Rgba<u8>,
}

impl Default for FigureStyle {
    fn default() -> Self {
        Self {
            size: (1000, 600),
            grid: true,
            interpolation: Interpolation::default(),
            background: Rgba([255, 255, 255, 255]),
        }
    }
}

/// A rendered figure and the titles of its panels (row-major).
#[derive(Clone, Debug)]
pub struct Figure {
    image: RgbaImage,
    titles: Vec<String>,
    colorbar: Option<Window>,
}

impl Figure {
    /// Lay `panels` out on an `nrows x ncols` grid. Cells past the last panel
    /// stay empty.
    pub fn compose(
        panels: &[Panel<'_>],
        nrows: usize,
        ncols: usize,
        style: &FigureStyle,
        colorbar: Option<Colorbar>,
    ) -> Result<Figure, RenderError> {
        if nrows == 0 || ncols == 0 {
            return Err(RenderError::InvalidLayout);
        }
        let (width, height) = style.size;
        let too_small = || RenderError::FigureTooSmall { width, height };

        let reserved = if colorbar.is_some() {
            COLORBAR_WIDTH + MARGIN
        } else {
            0
        };
        let nrows_u32 = u32::try_from(nrows).map_err(|_| too_small())?;
        let ncols_u32 = u32::try_from(ncols).map_err(|_| too_small())?;
        let gutters = |n: u32| n.checked_add(1).and_then(|n| n.checked_mul(MARGIN));
        let content_width = gutters(ncols_u32)
            .and_then(|g| g.checked_add(reserved))
            .and_then(|used| width.checked_sub(used))
            .ok_or_else(too_small)?;
        let content_height = gutters(nrows_u32)
            .and_then(|used| height.checked_sub(used))
            .ok_or_else(too_small)?;
        let cell_width = content_width / ncols_u32;
        let cell_height = content_height / nrows_u32;
        if cell_width == 0 || cell_height == 0 {
            return Err(too_small());
        }

        let mut canvas = RgbaImage::from_pixel(width, height, style.background);

        for (i, panel) in panels.iter().take(nrows * ncols).enumerate() {
            let (row, col) = ((i / ncols) as u32, (i % ncols) as u32);
            let cell_x = MARGIN + col * (cell_width + MARGIN);
            let cell_y = MARGIN + row * (cell_height + MARGIN);
            draw_panel(&mut canvas, panel, (cell_x, cell_y), (cell_width, cell_height), style);
        }

        if let Some(colorbar) = colorbar {
            draw_colorbar(&mut canvas, &colorbar);
        }

        let titles: Vec<String> = panels.iter().map(|p| p.title.clone()).collect();
        debug!(width, height, nrows, ncols, ?titles, "composed figure");

        Ok(Figure {
            image: canvas,
            titles,
            colorbar: colorbar.map(|c| c.window),
        })
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    pub fn titles(&self) -> &[String] {
        &self.titles
    }

    /// Value range shown by the colorbar, if one was drawn
    pub fn colorbar_range(&self) -> Option<Window> {
        self.colorbar
    }

    /// Write the figure; the format follows the file extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), RenderError> {
        self.image.save(path.as_ref())?;
        Ok(())
    }
}

/// Largest size with the slice aspect ratio that fits in `cell` (width, height).
pub(crate) fn fit_in_cell(slice_dim: (usize, usize), cell: (u32, u32)) -> (u32, u32) {
    let (slice_height, slice_width) = slice_dim;
    let (cell_width, cell_height) = cell;
    let scale = (cell_width as f32 / slice_width as f32).min(cell_height as f32 / slice_height as f32);
    let width = ((slice_width as f32 * scale).round() as u32).clamp(1, cell_width);
    let height = ((slice_height as f32 * scale).round() as u32).clamp(1, cell_height);
    (width, height)
}

fn draw_panel(
    canvas: &mut RgbaImage,
    panel: &Panel<'_>,
    origin: (u32, u32),
    cell: (u32, u32),
    style: &FigureStyle,
) {
    let (slice_height, slice_width) = panel.slice.dim();
    if slice_height == 0 || slice_width == 0 {
        return;
    }
    let (width, height) = fit_in_cell((slice_height, slice_width), cell);
    let x0 = origin.0 + (cell.0 - width) / 2;
    let y0 = origin.1 + (cell.1 - height) / 2;

    let tile = Volume::slice_to_image(
        &panel.slice,
        panel.window,
        panel.colormap,
        style.interpolation,
        (width, height),
    );
    imageops::overlay(canvas, &tile, x0 as i64, y0 as i64);

    if style.grid {
        let step = Interpolator::nice_tick_step(slice_width.max(slice_height));
        for k in (step..slice_width).step_by(step) {
            let x = x0 + (k as f32 * width as f32 / slice_width as f32) as u32;
            for y in y0..y0 + height {
                canvas.get_pixel_mut(x, y).blend(&GRID_COLOR);
            }
        }
        for k in (step..slice_height).step_by(step) {
            let y = y0 + (k as f32 * height as f32 / slice_height as f32) as u32;
            for x in x0..x0 + width {
                canvas.get_pixel_mut(x, y).blend(&GRID_COLOR);
            }
        }
    }
}

fn draw_colorbar(canvas: &mut RgbaImage, colorbar: &Colorbar) {
    let (width, height) = canvas.dimensions();
    let max_height = height.saturating_sub(2 * MARGIN).max(1);
    let bar_height = ((height as f32 * colorbar.scale).round() as u32).clamp(1, max_height);
    let x0 = width.saturating_sub(MARGIN + COLORBAR_WIDTH);
    let y0 = (height - bar_height) / 2;

    for r in 0..bar_height {
        let t = if bar_height > 1 {
            1.0 - r as f32 / (bar_height - 1) as f32
        } else {
            1.0
        };
        let color = colorbar.colormap.map(t);
        for x in x0..(x0 + COLORBAR_WIDTH).min(width) {
            canvas.put_pixel(x, y0 + r, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn panel<'a>(slice: &'a Array2<f32>, title: &str) -> Panel<'a> {
        Panel {
            slice: slice.view(),
            window: Window::new(0.0, 1.0),
            colormap: Colormap::Gray,
            title: title.to_string(),
        }
    }

    #[test]
    fn compose_keeps_size_and_titles() {
        let slice = Array2::from_elem((10, 20), 0.0f32);
        let panels = [panel(&slice, "a"), panel(&slice, "b")];
        let style = FigureStyle {
            size: (200, 100),
            grid: false,
            ..FigureStyle::default()
        };
        let figure = Figure::compose(&panels, 1, 2, &style, None).unwrap();
        assert_eq!(figure.image().dimensions(), (200, 100));
        assert_eq!(figure.titles(), ["a", "b"]);
        assert!(figure.colorbar_range().is_none());
        // 85x80 cells, each holding an 85x43 tile centered vertically
        let black = [0, 0, 0, 255];
        let white = [255, 255, 255, 255];
        assert_eq!(figure.image().get_pixel(52, 50).0, black);
        assert_eq!(figure.image().get_pixel(150, 50).0, black);
        assert_eq!(figure.image().get_pixel(52, 15).0, white);
        assert_eq!(figure.image().get_pixel(100, 50).0, white);
    }

    #[test]
    fn slice_pixels_and_background_differ() {
        let slice = Array2::from_elem((10, 10), 0.0f32);
        let style = FigureStyle {
            size: (120, 120),
            grid: false,
            ..FigureStyle::default()
        };
        let figure = Figure::compose(&[panel(&slice, "dark")], 1, 1, &style, None).unwrap();
        assert_eq!(figure.image().get_pixel(60, 60).0, [0, 0, 0, 255]);
        assert_eq!(figure.image().get_pixel(2, 2).0, [255, 255, 255, 255]);
    }

    #[test]
    fn grid_lines_are_blended_over_slice() {
        let slice = Array2::from_elem((10, 10), 0.0f32);
        let style = FigureStyle {
            size: (120, 120),
            grid: true,
            ..FigureStyle::default()
        };
        let figure = Figure::compose(&[panel(&slice, "grid")], 1, 1, &style, None).unwrap();
        // step 2 voxels over a 100px tile -> a line every 20px from x=10
        let line = figure.image().get_pixel(30, 60).0;
        assert!(line[0] > 90 && line[0] < 120, "{line:?}");
        assert_eq!(figure.image().get_pixel(31, 61).0, [0, 0, 0, 255]);
    }

    #[test]
    fn colorbar_runs_from_high_to_low() {
        let slice = Array2::from_elem((4, 4), 0.5f32);
        let style = FigureStyle {
            size: (200, 100),
            grid: false,
            ..FigureStyle::default()
        };
        let colorbar = Colorbar {
            window: Window::new(-1.0, 1.0),
            colormap: Colormap::Gray,
            scale: 0.5,
        };
        let figure = Figure::compose(&[panel(&slice, "p")], 1, 1, &style, Some(colorbar)).unwrap();
        let x = 200 - MARGIN - COLORBAR_WIDTH / 2;
        assert_eq!(figure.image().get_pixel(x, 25).0, [255, 255, 255, 255]);
        assert_eq!(figure.image().get_pixel(x, 74).0, [0, 0, 0, 255]);
        assert_eq!(figure.colorbar_range(), Some(Window::new(-1.0, 1.0)));
    }

    #[test]
    fn tiny_figures_are_rejected() {
        let slice = Array2::from_elem((4, 4), 0.5f32);
        let style = FigureStyle {
            size: (15, 15),
            ..FigureStyle::default()
        };
        assert!(matches!(
            Figure::compose(&[panel(&slice, "p")], 1, 1, &style, None),
            Err(RenderError::FigureTooSmall { .. })
        ));
        assert!(matches!(
            Figure::compose(&[], 0, 1, &FigureStyle::default(), None),
            Err(RenderError::InvalidLayout)
        ));
    }

    #[test]
    fn oversized_grids_are_too_small_not_a_panic() {
        let slice = Array2::from_elem((4, 4), 0.5f32);
        let style = FigureStyle::default();
        for (nrows, ncols) in [(1usize << 32, 1), (1, (1usize << 32) + 1), (500_000_000, 1)] {
            assert!(matches!(
                Figure::compose(&[panel(&slice, "p")], nrows, ncols, &style, None),
                Err(RenderError::FigureTooSmall { .. })
            ));
        }
    }
}
