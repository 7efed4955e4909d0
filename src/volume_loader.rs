use crate::volume::Volume;

use ndarray::Array3;
use nifti::{IntoNdArray, NiftiObject, ReaderOptions};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("Expected a 3D image, found shape {0:?}")]
    NotThreeDimensional(Vec<usize>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("NIfTI error: {0}")]
    Nifti(#[from] nifti::error::NiftiError),
}

pub struct VolumeLoader;

impl VolumeLoader {
    /// Load a `.nii` or `.nii.gz` file into display orientation.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or is not a 3D image
    pub fn load_nifti(path: impl AsRef<Path>) -> Result<Volume, VolumeLoaderError> {
        Ok(Volume::from_nifti_layout(Self::load_nifti_raw(path)?))
    }

    /// Load a NIfTI file keeping its `[x, y, z]` indexing.
    pub fn load_nifti_raw(path: impl AsRef<Path>) -> Result<Array3<f32>, VolumeLoaderError> {
        let path = path.as_ref();
        let object = ReaderOptions::new().read_file(path)?;
        let array = object.into_volume().into_ndarray::<f32>()?;

        let shape = Self::squeeze_shape(array.shape())?;
        let values: Vec<f32> = array.iter().copied().collect();
        let data = Array3::from_shape_vec(shape, values)
            .map_err(|_| VolumeLoaderError::NotThreeDimensional(array.shape().to_vec()))?;

        debug!(path = %path.display(), ?shape, "loaded nifti volume");
        Ok(data)
    }

    /// Drop trailing singleton dimensions (e.g. a 4D file with one volume).
    fn squeeze_shape(shape: &[usize]) -> Result<(usize, usize, usize), VolumeLoaderError> {
        let mut dims = shape.to_vec();
        while dims.len() > 3 && dims.last() == Some(&1) {
            dims.pop();
        }
        match dims.as_slice() {
            [x, y, z] => Ok((*x, *y, *z)),
            _ => Err(VolumeLoaderError::NotThreeDimensional(shape.to_vec())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_singletons_are_squeezed() {
        assert_eq!(VolumeLoader::squeeze_shape(&[4, 5, 6]).unwrap(), (4, 5, 6));
        assert_eq!(VolumeLoader::squeeze_shape(&[4, 5, 6, 1, 1]).unwrap(), (4, 5, 6));
    }

    #[test]
    fn other_ranks_are_rejected() {
        assert!(matches!(
            VolumeLoader::squeeze_shape(&[4, 5]),
            Err(VolumeLoaderError::NotThreeDimensional(_))
        ));
        assert!(matches!(
            VolumeLoader::squeeze_shape(&[4, 5, 6, 2]),
            Err(VolumeLoaderError::NotThreeDimensional(_))
        ));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(VolumeLoader::load_nifti(dir.path().join("absent.nii")).is_err());
    }
}
