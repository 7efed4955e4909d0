//! # volslice
//!
//! Quick visual inspection of 3D medical volumes, plus a loader for the
//! ICBM 2009c Nonlinear Symmetric brain template.
//!
//! Volumes are plain [`ndarray::Array3<f32>`] wrapped in [`Volume`]. They can
//! be sliced along the three array axes and shown as:
//!  - a static snapshot of one slice per axis ([`static_plot`])
//!  - an interactive viewer stepping through slices with the `j`/`k` keys
//!    ([`Slicer::interactive`], terminal front-end behind the `tui` feature)
//!  - a pre-rendered animation ([`Slicer::animate`]) that can be saved as a
//!    GIF or rendered to an embeddable HTML fragment ([`Animation::render`])
//!
//! The template loader ([`Icbm2009NonLinSym`]) downloads and unpacks the
//! archive on first use and loads its eight images keyed by label. NIfTI
//! files are reoriented on load so that axis 0 runs from superior to
//! inferior.
//!
//! # Examples
//!
//! ## Middle slices of a NIfTI file
//!
//! ```no_run
//! # use volslice::{VolumeLoader, StaticPlotOptions, static_plot};
//! let volume = VolumeLoader::load_nifti("brain.nii")
//!     .expect("should have loaded the volume");
//! let figure = static_plot(&volume, &StaticPlotOptions::default())
//!     .expect("should have plotted the volume");
//! figure.save("brain.png").expect("should have written the figure");
//! ```
//!
//! ## Animating template tissue maps
//!
//! ```no_run
//! # use volslice::{DatasetConfig, Icbm2009NonLinSym, Orientation, RenderFormat, Slicer,
//! #     SlicerOptions, TemplateLabel};
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let template = Icbm2009NonLinSym::fetch(&DatasetConfig::default(), |_, _| {}).await?;
//! let volumes: Vec<_> = [TemplateLabel::Gm, TemplateLabel::Wm, TemplateLabel::Csf]
//!     .iter()
//!     .filter_map(|label| template.get(*label).cloned())
//!     .collect();
//! let animation = Slicer::new(&volumes, Orientation::Axial, SlicerOptions::default())?
//!     .animate()?;
//! animation.render_to_file("tissues.html", RenderFormat::JsHtml)?;
//! # Ok(())
//! # }
//! ```

pub mod animation;
pub mod colormap;
pub mod dataset;
pub mod enums;
pub mod figure;
mod interpolator;
pub mod plot;
pub mod slicer;
#[cfg(feature = "tui")]
pub mod tui;
pub mod viewer;
pub mod volume;
pub mod volume_loader;

pub use animation::{Animation, AnimationFrame, RenderFormat};
pub use colormap::Colormap;
pub use dataset::{DatasetConfig, DatasetError, Icbm2009NonLinSym, TemplateLabel};
pub use enums::{Interpolation, Orientation, SliceKey};
pub use figure::{Figure, RenderError};
pub use plot::{StaticPlotOptions, static_plot};
pub use slicer::{PerVolume, Slicer, SlicerOptions};
pub use viewer::SliceViewer;
pub use volume::{Volume, Window};
pub use volume_loader::{VolumeLoader, VolumeLoaderError};
