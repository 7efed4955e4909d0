use std::fmt;

/// Slicing axis of an in-memory volume.
///
/// Axial slices fix the first array axis, Coronal the second and Sagittal the
/// third, so `volume[index, .., ..]` is an axial slice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Orientation {
    Axial,
    Coronal,
    Sagittal,
}

impl Orientation {
    pub const ALL: [Orientation; 3] = [
        Orientation::Axial,
        Orientation::Coronal,
        Orientation::Sagittal,
    ];

    /// Numeric array axis (0, 1 or 2)
    pub fn index(self) -> usize {
        match self {
            Orientation::Axial => 0,
            Orientation::Coronal => 1,
            Orientation::Sagittal => 2,
        }
    }

    pub fn from_index(axis: usize) -> Option<Self> {
        match axis {
            0 => Some(Orientation::Axial),
            1 => Some(Orientation::Coronal),
            2 => Some(Orientation::Sagittal),
            _ => None,
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// Resampling used when a slice is scaled to its panel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Interpolation {
    #[default]
    Bilinear,
    Nearest,
}

/// Keyboard commands understood by the slice viewer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SliceKey {
    Previous,
    Next,
}

impl SliceKey {
    /// `j` steps back, `k` steps forward. Anything else is ignored.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'j' => Some(SliceKey::Previous),
            'k' => Some(SliceKey::Next),
            _ => None,
        }
    }
}
