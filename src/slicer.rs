use crate::animation::{Animation, AnimationFrame};
use crate::colormap::Colormap;
use crate::enums::{Interpolation, Orientation};
use crate::figure::{Figure, FigureStyle, Panel, RenderError};
use crate::viewer::{PanelState, SliceViewer};
use crate::volume::{Volume, Window};

use rayon::prelude::*;
use tracing::{debug, info};
use web_time::Instant;

const INTERACTIVE_SPACING: usize = 3;
const ANIMATION_SPACING: usize = 1;

/// A setting that is either left to its default, shared by every volume, or
/// given per volume. `None` entries and missing trailing entries of `Each`
/// fall back to the default.
#[derive(Clone, Debug, PartialEq)]
pub enum PerVolume<T> {
    Unset,
    All(T),
    Each(Vec<Option<T>>),
}

impl<T> Default for PerVolume<T> {
    fn default() -> Self {
        PerVolume::Unset
    }
}

impl<T: Clone> PerVolume<T> {
    pub fn resolve(&self, count: usize, mut default: impl FnMut(usize) -> T) -> Vec<T> {
        (0..count)
            .map(|i| match self {
                PerVolume::Unset => default(i),
                PerVolume::All(value) => value.clone(),
                PerVolume::Each(values) => values
                    .get(i)
                    .cloned()
                    .flatten()
                    .unwrap_or_else(|| default(i)),
            })
            .collect()
    }
}

impl<T> From<Vec<Option<T>>> for PerVolume<T> {
    fn from(values: Vec<Option<T>>) -> Self {
        PerVolume::Each(values)
    }
}

/// Settings shared by the interactive viewer and the animation.
#[derive(Clone, Debug)]
pub struct SlicerOptions {
    pub size: (u32, u32),
    pub nrows: usize,
    pub grid: bool,
    pub interpolation: Interpolation,
    /// Keep every n-th slice; 3 for the viewer and 1 for animations when unset
    pub spacing: Option<usize>,
    pub vmin: PerVolume<f32>,
    pub vmax: PerVolume<f32>,
    pub cmap: PerVolume<Colormap>,
    pub title: PerVolume<String>,
    /// Delay between animation frames
    pub interval_ms: u64,
    /// Informational; carried onto the [`Animation`]
    pub blit: bool,
}

impl Default for SlicerOptions {
    fn default() -> Self {
        Self {
            size: (1200, 400),
            nrows: 1,
            grid: true,
            interpolation: Interpolation::Bilinear,
            spacing: None,
            vmin: PerVolume::Unset,
            vmax: PerVolume::Unset,
            cmap: PerVolume::Unset,
            title: PerVolume::Unset,
            interval_ms: 50,
            blit: true,
        }
    }
}

impl SlicerOptions {
    pub fn with_nrows(mut self, nrows: usize) -> Self {
        self.nrows = nrows;
        self
    }

    pub fn with_spacing(mut self, spacing: usize) -> Self {
        self.spacing = Some(spacing);
        self
    }

    pub fn with_size(mut self, size: (u32, u32)) -> Self {
        self.size = size;
        self
    }

    pub fn with_cmap(mut self, cmap: impl Into<PerVolume<Colormap>>) -> Self {
        self.cmap = cmap.into();
        self
    }

    pub fn with_titles(mut self, title: impl Into<PerVolume<String>>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }
}

impl From<Colormap> for PerVolume<Colormap> {
    fn from(cmap: Colormap) -> Self {
        PerVolume::All(cmap)
    }
}

impl From<&str> for PerVolume<String> {
    fn from(title: &str) -> Self {
        PerVolume::All(title.to_string())
    }
}

/// Multi-volume views along one axis.
pub struct Slicer<'a> {
    volumes: &'a [Volume],
    orientation: Orientation,
    options: SlicerOptions,
}

impl<'a> Slicer<'a> {
    pub fn new(
        volumes: &'a [Volume],
        orientation: Orientation,
        options: SlicerOptions,
    ) -> Result<Self, RenderError> {
        if volumes.is_empty() {
            return Err(RenderError::NoVolumes);
        }
        if options.nrows == 0 || options.nrows > volumes.len() {
            return Err(RenderError::InvalidLayout);
        }
        if options.spacing == Some(0) {
            return Err(RenderError::InvalidSpacing);
        }
        if let Some(index) = volumes.iter().position(Volume::is_empty) {
            return Err(RenderError::EmptyVolume { index });
        }
        Ok(Self {
            volumes,
            orientation,
            options,
        })
    }

    /// (rows, columns); columns are rounded up so no volume is dropped.
    pub fn layout(&self) -> (usize, usize) {
        let nrows = self.options.nrows;
        (nrows, self.volumes.len().div_ceil(nrows))
    }

    fn style(&self) -> FigureStyle {
        FigureStyle {
            size: self.options.size,
            grid: self.options.grid,
            interpolation: self.options.interpolation,
            ..FigureStyle::default()
        }
    }

    fn prepare(&self, spacing: usize) -> Result<Vec<PanelState>, RenderError> {
        let count = self.volumes.len();
        let vmin = self
            .options
            .vmin
            .resolve(count, |i| self.volumes[i].min().unwrap_or(0.0));
        let vmax = self
            .options
            .vmax
            .resolve(count, |i| self.volumes[i].max().unwrap_or(0.0));
        let cmap = self.options.cmap.resolve(count, |_| Colormap::Plasma);
        let title = self
            .options
            .title
            .resolve(count, |i| format!("Volume {}", i + 1));

        if let Some(i) = (0..count).find(|&i| vmin[i] > vmax[i]) {
            return Err(RenderError::InvalidWindow {
                vmin: vmin[i],
                vmax: vmax[i],
            });
        }

        self.volumes
            .iter()
            .enumerate()
            .map(|(i, volume)| {
                let reduced = volume
                    .downsample(spacing, self.orientation)
                    .ok_or(RenderError::InvalidSpacing)?;
                Ok(PanelState {
                    index: reduced.len_of(self.orientation) / 2,
                    volume: reduced,
                    spacing,
                    orientation: self.orientation,
                    title: title[i].clone(),
                    window: Window::new(vmin[i], vmax[i]),
                    colormap: cmap[i],
                })
            })
            .collect()
    }

    /// Viewer starting at the middle slice of every volume.
    pub fn interactive(&self) -> Result<SliceViewer, RenderError> {
        let spacing = self.options.spacing.unwrap_or(INTERACTIVE_SPACING);
        let panels = self.prepare(spacing)?;
        let (nrows, ncols) = self.layout();
        debug!(volumes = panels.len(), spacing, axis = %self.orientation, "slice viewer ready");
        Ok(SliceViewer::new(panels, nrows, ncols, self.style()))
    }

    /// One frame per kept slice of the first volume.
    pub fn animate(&self) -> Result<Animation, RenderError> {
        let spacing = self.options.spacing.unwrap_or(ANIMATION_SPACING);
        let panels = self.prepare(spacing)?;
        let frame_count = panels[0].len();
        for (index, panel) in panels.iter().enumerate() {
            if panel.len() < frame_count {
                return Err(RenderError::ShapeMismatch {
                    index,
                    expected: frame_count,
                    found: panel.len(),
                });
            }
        }

        let (nrows, ncols) = self.layout();
        let style = self.style();
        let started = Instant::now();
        let frames = (0..frame_count)
            .into_par_iter()
            .map(|slice| {
                let frame_panels: Vec<Panel<'_>> = panels
                    .iter()
                    .filter_map(|p| p.panel_at(slice))
                    .collect();
                let figure = Figure::compose(&frame_panels, nrows, ncols, &style, None)?;
                let titles = figure.titles().to_vec();
                Ok(AnimationFrame {
                    image: figure.into_image(),
                    titles,
                })
            })
            .collect::<Result<Vec<_>, RenderError>>()?;

        info!(
            frames = frames.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "rendered animation"
        );
        Ok(Animation::new(frames, self.options.interval_ms, self.options.blit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn volume(shape: (usize, usize, usize), offset: f32) -> Volume {
        Volume::new(Array3::from_shape_fn(shape, |(i, j, k)| {
            offset + (i + j + k) as f32
        }))
    }

    fn small() -> SlicerOptions {
        SlicerOptions::default().with_size((300, 120))
    }

    #[test]
    fn per_volume_values_fall_back_to_defaults() {
        let unset: PerVolume<i32> = PerVolume::Unset;
        assert_eq!(unset.resolve(2, |i| i as i32 * 10), [0, 10]);
        assert_eq!(PerVolume::All(7).resolve(3, |_| 0), [7, 7, 7]);
        let each = PerVolume::Each(vec![None, Some(5)]);
        assert_eq!(each.resolve(3, |i| -(i as i32)), [0, 5, -2]);
    }

    #[test]
    fn columns_round_up() {
        let volumes = vec![volume((4, 4, 4), 0.0); 3];
        let slicer = Slicer::new(&volumes, Orientation::Axial, small().with_nrows(2)).unwrap();
        assert_eq!(slicer.layout(), (2, 2));
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        assert!(matches!(
            Slicer::new(&[], Orientation::Axial, small()),
            Err(RenderError::NoVolumes)
        ));
        let volumes = vec![volume((4, 4, 4), 0.0)];
        assert!(matches!(
            Slicer::new(&volumes, Orientation::Axial, small().with_nrows(0)),
            Err(RenderError::InvalidLayout)
        ));
        assert!(matches!(
            Slicer::new(&volumes, Orientation::Axial, small().with_nrows(2)),
            Err(RenderError::InvalidLayout)
        ));
        assert!(matches!(
            Slicer::new(&volumes, Orientation::Axial, small().with_nrows(1 << 40)),
            Err(RenderError::InvalidLayout)
        ));
        assert!(matches!(
            Slicer::new(&volumes, Orientation::Axial, small().with_spacing(0)),
            Err(RenderError::InvalidSpacing)
        ));
        let empty = vec![volume((4, 4, 4), 0.0), volume((0, 4, 4), 0.0)];
        assert!(matches!(
            Slicer::new(&empty, Orientation::Axial, small()),
            Err(RenderError::EmptyVolume { index: 1 })
        ));
    }

    #[test]
    fn interactive_viewer_defaults() {
        let volumes = vec![volume((10, 4, 4), 0.0), volume((10, 4, 4), 100.0)];
        let viewer = Slicer::new(&volumes, Orientation::Axial, small())
            .unwrap()
            .interactive()
            .unwrap();
        let panels = viewer.panels();
        // spacing 3 keeps slices 0, 3, 6, 9
        assert_eq!(panels[0].len(), 4);
        assert_eq!(panels[0].index, 2);
        assert_eq!(viewer.panel_title(0).unwrap(), "Volume 1, Slice 6, Axis 0");
        assert_eq!(viewer.panel_title(1).unwrap(), "Volume 2, Slice 6, Axis 0");
        assert_eq!(panels[1].window, Window::new(100.0, 115.0));
        assert_eq!(panels[1].colormap, Colormap::Plasma);
    }

    #[test]
    fn per_volume_settings_are_applied() {
        let volumes = vec![volume((6, 4, 4), 0.0), volume((6, 4, 4), 0.0)];
        let options = SlicerOptions {
            vmin: PerVolume::All(-5.0),
            vmax: PerVolume::Each(vec![Some(1.0)]),
            ..small()
        }
        .with_cmap(vec![None, Some(Colormap::Gray)])
        .with_titles("scan");
        let viewer = Slicer::new(&volumes, Orientation::Coronal, options)
            .unwrap()
            .interactive()
            .unwrap();
        let panels = viewer.panels();
        assert_eq!(panels[0].window, Window::new(-5.0, 1.0));
        assert_eq!(panels[1].window, Window::new(-5.0, 11.0));
        assert_eq!(panels[0].colormap, Colormap::Plasma);
        assert_eq!(panels[1].colormap, Colormap::Gray);
        assert_eq!(viewer.panel_title(1).unwrap(), "scan, Slice 3, Axis 1");
    }

    #[test]
    fn animation_has_one_frame_per_kept_slice() {
        let volumes = vec![volume((4, 5, 7), 0.0), volume((4, 5, 7), 1.0)];
        let animation = Slicer::new(
            &volumes,
            Orientation::Sagittal,
            small().with_spacing(2).with_interval_ms(80),
        )
        .unwrap()
        .animate()
        .unwrap();
        assert_eq!(animation.len(), 4);
        assert_eq!(animation.interval_ms(), 80);
        assert_eq!(
            animation.frames()[3].titles,
            ["Volume 1, Slice 6, Axis 2", "Volume 2, Slice 6, Axis 2"]
        );
        assert_eq!(animation.frames()[0].image.dimensions(), (300, 120));
    }

    #[test]
    fn inverted_windows_are_rejected() {
        let volumes = vec![volume((4, 4, 4), 0.0), volume((4, 4, 4), 0.0)];
        let options = SlicerOptions {
            vmin: PerVolume::Each(vec![None, Some(20.0)]),
            ..small()
        };
        let slicer = Slicer::new(&volumes, Orientation::Axial, options).unwrap();
        assert!(matches!(
            slicer.interactive(),
            Err(RenderError::InvalidWindow { vmin, vmax }) if vmin == 20.0 && vmax == 9.0
        ));
        assert!(matches!(
            slicer.animate(),
            Err(RenderError::InvalidWindow { .. })
        ));
    }

    #[test]
    fn animation_rejects_shorter_volumes() {
        let volumes = vec![volume((6, 4, 4), 0.0), volume((3, 4, 4), 0.0)];
        let result = Slicer::new(&volumes, Orientation::Axial, small())
            .unwrap()
            .animate();
        assert!(matches!(
            result,
            Err(RenderError::ShapeMismatch {
                index: 1,
                expected: 6,
                found: 3
            })
        ));
    }
}
