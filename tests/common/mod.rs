//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::Path;

use volslice::{TemplateLabel, dataset::TEMPLATE_DIR};
use zip::write::SimpleFileOptions;

const HEADER_SIZE: usize = 348;
const DATA_OFFSET: usize = 352;
const DT_FLOAT32: i16 = 16;

/// Serialize a single-file NIfTI-1 image of `f32` voxels. `value` is called
/// with `(x, y, z)` in file order (x fastest).
pub fn nifti_bytes(dim: (u16, u16, u16), value: impl Fn(usize, usize, usize) -> f32) -> Vec<u8> {
    let (nx, ny, nz) = (dim.0 as usize, dim.1 as usize, dim.2 as usize);
    let mut bytes = vec![0u8; DATA_OFFSET];

    bytes[0..4].copy_from_slice(&(HEADER_SIZE as i32).to_le_bytes());
    let dims: [i16; 8] = [3, dim.0 as i16, dim.1 as i16, dim.2 as i16, 1, 1, 1, 1];
    for (i, d) in dims.iter().enumerate() {
        let at = 40 + i * 2;
        bytes[at..at + 2].copy_from_slice(&d.to_le_bytes());
    }
    bytes[70..72].copy_from_slice(&DT_FLOAT32.to_le_bytes());
    bytes[72..74].copy_from_slice(&32i16.to_le_bytes());
    let pixdim: [f32; 8] = [1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0];
    for (i, p) in pixdim.iter().enumerate() {
        let at = 76 + i * 4;
        bytes[at..at + 4].copy_from_slice(&p.to_le_bytes());
    }
    bytes[108..112].copy_from_slice(&(DATA_OFFSET as f32).to_le_bytes());
    bytes[112..116].copy_from_slice(&1.0f32.to_le_bytes());
    bytes[344..348].copy_from_slice(b"n+1\0");

    for z in 0..nz {
        for y in 0..ny {
            for x in 0..nx {
                bytes.extend_from_slice(&value(x, y, z).to_le_bytes());
            }
        }
    }
    bytes
}

pub fn write_nifti(
    path: &Path,
    dim: (u16, u16, u16),
    value: impl Fn(usize, usize, usize) -> f32,
) {
    std::fs::write(path, nifti_bytes(dim, value)).expect("should have written nifti fixture");
}

/// Voxel value used by the template fixtures: distinct per label and position.
pub fn template_value(label: TemplateLabel, x: usize, y: usize, z: usize) -> f32 {
    let offset = TemplateLabel::ALL
        .iter()
        .position(|l| *l == label)
        .unwrap_or(0) as f32
        * 1000.0;
    offset + (x * 100 + y * 10 + z) as f32
}

/// A zip laid out like the real template archive, plus a stray directory.
pub fn template_archive(dim: (u16, u16, u16)) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    writer
        .add_directory(format!("{TEMPLATE_DIR}/"), options)
        .expect("should have added directory");
    for label in TemplateLabel::ALL {
        writer
            .start_file(format!("{TEMPLATE_DIR}/{}", label.file_name()), options)
            .expect("should have started file");
        let bytes = nifti_bytes(dim, |x, y, z| template_value(label, x, y, z));
        writer.write_all(&bytes).expect("should have written file");
    }
    writer
        .start_file("__MACOSX/._mni_icbm152_t1_tal_nlin_sym_09c.nii", options)
        .expect("should have started file");
    writer.write_all(b"resource fork").expect("should have written file");

    writer
        .finish()
        .expect("should have finished archive")
        .into_inner()
}
