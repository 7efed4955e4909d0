use crate::colormap::Colormap;
use crate::enums::Interpolation;
use crate::enums::Orientation;
use crate::interpolator::Interpolator;

use image::RgbaImage;
use ndarray::Array3;
use ndarray::ArrayView2;
use ndarray::Axis;
use ndarray::Slice;
use ndarray::s;
use rayon::prelude::*;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Volume {
    pub data: Array3<f32>,
}

/// Value range mapped onto a colormap.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Window {
    pub vmin: f32,
    pub vmax: f32,
}

impl Window {
    pub fn new(vmin: f32, vmax: f32) -> Self {
        Self { vmin, vmax }
    }

    /// Position of `value` inside the window. NaN is passed through.
    #[inline]
    pub fn normalize(&self, value: f32) -> f32 {
        let range = self.vmax - self.vmin;
        if range > 0.0 {
            ((value - self.vmin) / range).clamp(0.0, 1.0)
        } else if value.is_nan() {
            value
        } else {
            0.0
        }
    }
}

impl Volume {
    pub fn new(data: Array3<f32>) -> Self {
        Self { data }
    }

    /// Build a volume from an array indexed `[x, y, z]` as stored in NIfTI
    /// files: all axes are reversed and the first one is flipped so that
    /// superior slices come first.
    pub fn from_nifti_layout(data: Array3<f32>) -> Self {
        let mut data = data.reversed_axes();
        data.invert_axis(Axis(0));
        Self::new(data.as_standard_layout().into_owned())
    }

    /// Get the dimensions of the volume
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    /// Get a mutable reference to the underlying data
    pub fn data_mut(&mut self) -> &mut Array3<f32> {
        &mut self.data
    }

    /// Number of slices along `orientation`
    pub fn len_of(&self, orientation: Orientation) -> usize {
        self.data.len_of(Axis(orientation.index()))
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Smallest non-NaN value
    pub fn min(&self) -> Option<f32> {
        self.data
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .reduce(f32::min)
    }

    /// Largest non-NaN value
    pub fn max(&self) -> Option<f32> {
        self.data
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .reduce(f32::max)
    }

    /// Window spanning the whole value range, `[0, 0]` for an all-NaN volume.
    pub fn full_window(&self) -> Window {
        Window::new(self.min().unwrap_or(0.0), self.max().unwrap_or(0.0))
    }

    pub fn get_slice_from_axis(
        &self,
        index: usize,
        orientation: Orientation,
    ) -> Option<ArrayView2<'_, f32>> {
        if !self.is_valid_index(index, orientation) {
            return None;
        }
        let slice_result = match orientation {
            Orientation::Axial => self.data().slice(s![index, .., ..]),
            Orientation::Coronal => self.data().slice(s![.., index, ..]),
            Orientation::Sagittal => self.data().slice(s![.., .., index]),
        };
        Some(slice_result)
    }

    /// Keep every `step`-th slice along `orientation`, starting at the first.
    pub fn downsample(&self, step: usize, orientation: Orientation) -> Option<Volume> {
        if step == 0 {
            return None;
        }
        let data = self
            .data
            .slice_axis(
                Axis(orientation.index()),
                Slice::new(0, None, step as isize),
            )
            .to_owned();
        Some(Volume::new(data))
    }

    /// Color a 2D slice and resample it to `size` (width, height).
    pub fn slice_to_image(
        slice: &ArrayView2<'_, f32>,
        window: Window,
        colormap: Colormap,
        interpolation: Interpolation,
        size: (u32, u32),
    ) -> RgbaImage {
        let (width, height) = size;
        let resampled = Interpolator::resample(slice, width, height, interpolation);
        let pixel_data: Vec<u8> = resampled
            .as_slice()
            .unwrap_or(&[])
            .par_iter()
            .flat_map_iter(|&v| colormap.map(window.normalize(v)).0)
            .collect();
        RgbaImage::from_raw(width, height, pixel_data)
            .unwrap_or_else(|| RgbaImage::new(width, height))
    }

    pub fn is_valid_index(&self, index: usize, orientation: Orientation) -> bool {
        index < self.len_of(orientation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(shape: (usize, usize, usize)) -> Volume {
        let (_, b, c) = shape;
        Volume::new(Array3::from_shape_fn(shape, |(i, j, k)| {
            (i * b * c + j * c + k) as f32
        }))
    }

    #[test]
    fn slices_along_each_axis() {
        let volume = ramp((2, 3, 4));
        let axial = volume.get_slice_from_axis(1, Orientation::Axial).unwrap();
        assert_eq!(axial.dim(), (3, 4));
        assert_eq!(axial[[0, 0]], 12.0);

        let coronal = volume.get_slice_from_axis(2, Orientation::Coronal).unwrap();
        assert_eq!(coronal.dim(), (2, 4));
        assert_eq!(coronal[[1, 3]], 23.0);

        let sagittal = volume.get_slice_from_axis(3, Orientation::Sagittal).unwrap();
        assert_eq!(sagittal.dim(), (2, 3));
        assert_eq!(sagittal[[0, 1]], 7.0);
    }

    #[test]
    fn out_of_range_slice_is_none() {
        let volume = ramp((2, 3, 4));
        assert!(volume.get_slice_from_axis(2, Orientation::Axial).is_none());
        assert!(volume.get_slice_from_axis(3, Orientation::Coronal).is_none());
        assert!(volume.get_slice_from_axis(4, Orientation::Sagittal).is_none());
    }

    #[test]
    fn downsample_keeps_every_nth_slice() {
        let volume = ramp((7, 2, 2));
        let reduced = volume.downsample(3, Orientation::Axial).unwrap();
        assert_eq!(reduced.dim(), (3, 2, 2));
        assert_eq!(reduced.data[[1, 0, 0]], volume.data[[3, 0, 0]]);
        assert_eq!(reduced.data[[2, 0, 0]], volume.data[[6, 0, 0]]);

        let reduced = volume.downsample(2, Orientation::Sagittal).unwrap();
        assert_eq!(reduced.dim(), (7, 2, 1));
        assert!(volume.downsample(0, Orientation::Axial).is_none());
    }

    #[test]
    fn nifti_layout_is_transposed_and_flipped() {
        let raw = Array3::from_shape_fn((2, 3, 4), |(x, y, z)| (x * 100 + y * 10 + z) as f32);
        let volume = Volume::from_nifti_layout(raw.clone());
        assert_eq!(volume.dim(), (4, 3, 2));
        assert!(volume.data.is_standard_layout());
        for ((z, y, x), value) in volume.data.indexed_iter() {
            assert_eq!(*value, raw[[x, y, 3 - z]]);
        }
    }

    #[test]
    fn min_max_ignore_nan() {
        let mut volume = ramp((2, 2, 2));
        volume.data[[0, 0, 0]] = f32::NAN;
        assert_eq!(volume.min(), Some(1.0));
        assert_eq!(volume.max(), Some(7.0));
        assert_eq!(Volume::default().min(), None);
    }

    #[test]
    fn window_normalizes_and_handles_flat_range() {
        let window = Window::new(10.0, 20.0);
        assert_eq!(window.normalize(15.0), 0.5);
        assert_eq!(window.normalize(-4.0), 0.0);
        assert_eq!(window.normalize(99.0), 1.0);
        assert_eq!(Window::new(3.0, 3.0).normalize(3.0), 0.0);
    }

    #[test]
    fn nan_voxels_render_transparent() {
        let mut volume = ramp((1, 1, 3));
        volume.data[[0, 0, 1]] = f32::NAN;
        let window = volume.full_window();
        assert_eq!(window, Window::new(0.0, 2.0));
        assert!(window.normalize(f32::NAN).is_nan());

        let slice = volume.get_slice_from_axis(0, Orientation::Axial).unwrap();
        let image = Volume::slice_to_image(
            &slice,
            window,
            Colormap::Plasma,
            Interpolation::Nearest,
            (3, 1),
        );
        assert_eq!(image.get_pixel(0, 0)[3], 255);
        assert_eq!(image.get_pixel(1, 0)[3], 0);
        assert_eq!(image.get_pixel(2, 0)[3], 255);
    }

    #[test]
    fn slice_image_uses_colormap_extremes() {
        let volume = ramp((1, 1, 2));
        let slice = volume.get_slice_from_axis(0, Orientation::Axial).unwrap();
        let image = Volume::slice_to_image(
            &slice,
            volume.full_window(),
            Colormap::Gray,
            Interpolation::Nearest,
            (2, 1),
        );
        assert_eq!(image.dimensions(), (2, 1));
        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 0, 255]);
        assert_eq!(image.get_pixel(1, 0).0, [255, 255, 255, 255]);
    }
}
