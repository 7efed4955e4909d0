use crate::colormap::Colormap;
use crate::enums::{Orientation, SliceKey};
use crate::figure::{Figure, FigureStyle, Panel, RenderError};
use crate::volume::{Volume, Window};

use tracing::debug;

/// One subplot of the viewer: a (downsampled) volume and the slice it shows.
#[derive(Clone, Debug)]
pub struct PanelState {
    pub volume: Volume,
    pub index: usize,
    /// Step between kept slices of the original volume
    pub spacing: usize,
    pub orientation: Orientation,
    pub title: String,
    pub window: Window,
    pub colormap: Colormap,
}

impl PanelState {
    /// Number of slices available along the viewing axis
    pub fn len(&self) -> usize {
        self.volume.len_of(self.orientation)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Title of slice `index`, numbered in original-volume coordinates.
    pub fn title_at(&self, index: usize) -> String {
        format!(
            "{}, Slice {}, Axis {}",
            self.title,
            index * self.spacing,
            self.orientation
        )
    }

    pub fn current_title(&self) -> String {
        self.title_at(self.index)
    }

    pub fn previous_slice(&mut self) {
        let len = self.len();
        if len > 0 {
            self.index = (self.index + len - 1) % len;
        }
    }

    pub fn next_slice(&mut self) {
        let len = self.len();
        if len > 0 {
            self.index = (self.index + 1) % len;
        }
    }

    pub(crate) fn panel_at(&self, index: usize) -> Option<Panel<'_>> {
        let slice = self.volume.get_slice_from_axis(index, self.orientation)?;
        Some(Panel {
            slice,
            window: self.window,
            colormap: self.colormap,
            title: self.title_at(index),
        })
    }
}

/// Keyboard-driven browser over one slicing axis of several volumes.
///
/// Every key press moves all panels together; each panel wraps around at its
/// own length.
#[derive(Clone, Debug)]
pub struct SliceViewer {
    panels: Vec<PanelState>,
    nrows: usize,
    ncols: usize,
    style: FigureStyle,
}

impl SliceViewer {
    pub(crate) fn new(panels: Vec<PanelState>, nrows: usize, ncols: usize, style: FigureStyle) -> Self {
        Self {
            panels,
            nrows,
            ncols,
            style,
        }
    }

    pub fn panels(&self) -> &[PanelState] {
        &self.panels
    }

    /// (rows, columns) of the subplot grid
    pub fn layout(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    pub fn style(&self) -> &FigureStyle {
        &self.style
    }

    pub fn panel_title(&self, panel: usize) -> Option<String> {
        self.panels.get(panel).map(PanelState::current_title)
    }

    pub fn process_key(&mut self, key: SliceKey) {
        for panel in &mut self.panels {
            match key {
                SliceKey::Previous => panel.previous_slice(),
                SliceKey::Next => panel.next_slice(),
            }
        }
        debug!(
            ?key,
            indices = ?self.panels.iter().map(|p| p.index).collect::<Vec<_>>(),
            "slice viewer key"
        );
    }

    /// Handle a typed character; returns whether it was a viewer key.
    pub fn process_char(&mut self, c: char) -> bool {
        match SliceKey::from_char(c) {
            Some(key) => {
                self.process_key(key);
                true
            }
            None => false,
        }
    }

    /// Render the slices currently selected in every panel.
    pub fn render(&self) -> Result<Figure, RenderError> {
        let panels: Vec<Panel<'_>> = self
            .panels
            .iter()
            .filter_map(|p| p.panel_at(p.index))
            .collect();
        Figure::compose(&panels, self.nrows, self.ncols, &self.style, None)
    }
}
