use crate::colormap::Colormap;
use crate::enums::{Interpolation, Orientation};
use crate::figure::{Colorbar, Figure, FigureStyle, Panel, RenderError};
use crate::volume::{Volume, Window};

use tracing::debug;

/// Settings for [`static_plot`].
#[derive(Clone, Debug)]
pub struct StaticPlotOptions {
    /// Slice index along each axis, defaults to the middle of the volume
    pub slices: Option<(usize, usize, usize)>,
    pub vmin: Option<f32>,
    pub vmax: Option<f32>,
    pub cmap: Colormap,
    pub size: (u32, u32),
    pub grid: bool,
    pub interpolation: Interpolation,
    pub cbar_scale: f32,
}

impl Default for StaticPlotOptions {
    fn default() -> Self {
        Self {
            slices: None,
            vmin: None,
            vmax: None,
            cmap: Colormap::Plasma,
            size: (1000, 600),
            grid: true,
            interpolation: Interpolation::Bilinear,
            cbar_scale: 0.4,
        }
    }
}

impl StaticPlotOptions {
    pub fn with_slices(mut self, slices: (usize, usize, usize)) -> Self {
        self.slices = Some(slices);
        self
    }

    pub fn with_window(mut self, vmin: Option<f32>, vmax: Option<f32>) -> Self {
        self.vmin = vmin;
        self.vmax = vmax;
        self
    }

    pub fn with_cmap(mut self, cmap: Colormap) -> Self {
        self.cmap = cmap;
        self
    }

    pub fn with_size(mut self, size: (u32, u32)) -> Self {
        self.size = size;
        self
    }
}

/// Plot one slice through each of the three axes side by side, sharing a
/// single color scale.
pub fn static_plot(volume: &Volume, options: &StaticPlotOptions) -> Result<Figure, RenderError> {
    let (d0, d1, d2) = volume.dim();
    let slices = options.slices.unwrap_or((d0 / 2, d1 / 2, d2 / 2));
    let window = Window::new(
        options.vmin.or_else(|| volume.min()).unwrap_or(0.0),
        options.vmax.or_else(|| volume.max()).unwrap_or(0.0),
    );

    if window.vmin > window.vmax {
        return Err(RenderError::InvalidWindow {
            vmin: window.vmin,
            vmax: window.vmax,
        });
    }

    let panels = Orientation::ALL
        .into_iter()
        .zip([slices.0, slices.1, slices.2])
        .map(|(axis, index)| {
            let slice = volume
                .get_slice_from_axis(index, axis)
                .ok_or(RenderError::SliceOutOfRange {
                    axis,
                    index,
                    len: volume.len_of(axis),
                })?;
            Ok(Panel {
                slice,
                window,
                colormap: options.cmap,
                title: format!("Axis {axis}, Slice {index}"),
            })
        })
        .collect::<Result<Vec<_>, RenderError>>()?;

    debug!(?slices, ?window, cmap = %options.cmap, "static plot");

    let style = FigureStyle {
        size: options.size,
        grid: options.grid,
        interpolation: options.interpolation,
        ..FigureStyle::default()
    };
    let colorbar = Colorbar {
        window,
        colormap: options.cmap,
        scale: options.cbar_scale,
    };
    Figure::compose(&panels, 1, 3, &style, Some(colorbar))
}
