use image::Rgba;
use std::fmt;

/// Named colormaps, each a set of evenly spaced anchor colors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum Colormap {
    #[default]
    Plasma,
    Viridis,
    Inferno,
    Magma,
    Gray,
    SpectralR,
}

const PLASMA: &[[u8; 3]] = &[
    [13, 8, 135],
    [75, 3, 161],
    [125, 3, 168],
    [168, 34, 150],
    [203, 70, 121],
    [229, 107, 93],
    [248, 148, 65],
    [253, 195, 40],
    [240, 249, 33],
];

const VIRIDIS: &[[u8; 3]] = &[
    [68, 1, 84],
    [71, 44, 122],
    [59, 81, 139],
    [44, 113, 142],
    [33, 144, 141],
    [39, 173, 129],
    [92, 200, 99],
    [170, 220, 50],
    [253, 231, 37],
];

const INFERNO: &[[u8; 3]] = &[
    [0, 0, 4],
    [31, 12, 72],
    [85, 15, 109],
    [136, 34, 106],
    [186, 54, 85],
    [227, 89, 51],
    [249, 140, 10],
    [249, 201, 50],
    [252, 255, 164],
];

const MAGMA: &[[u8; 3]] = &[
    [0, 0, 4],
    [28, 16, 68],
    [79, 18, 123],
    [129, 37, 129],
    [181, 54, 122],
    [229, 80, 100],
    [251, 135, 97],
    [254, 194, 135],
    [252, 253, 191],
];

const GRAY: &[[u8; 3]] = &[[0, 0, 0], [255, 255, 255]];

const SPECTRAL_R: &[[u8; 3]] = &[
    [94, 79, 162],
    [50, 136, 189],
    [102, 194, 165],
    [171, 221, 164],
    [230, 245, 152],
    [255, 255, 191],
    [254, 224, 139],
    [253, 174, 97],
    [244, 109, 67],
    [213, 62, 79],
    [158, 1, 66],
];

impl Colormap {
    fn anchors(self) -> &'static [[u8; 3]] {
        match self {
            Colormap::Plasma => PLASMA,
            Colormap::Viridis => VIRIDIS,
            Colormap::Inferno => INFERNO,
            Colormap::Magma => MAGMA,
            Colormap::Gray => GRAY,
            Colormap::SpectralR => SPECTRAL_R,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Colormap::Plasma => "plasma",
            Colormap::Viridis => "viridis",
            Colormap::Inferno => "inferno",
            Colormap::Magma => "magma",
            Colormap::Gray => "gray",
            Colormap::SpectralR => "spectral_r",
        }
    }

    /// Color at `t`, clamped to [0, 1]. NaN maps to a transparent pixel.
    pub fn map(self, t: f32) -> Rgba<u8> {
        if t.is_nan() {
            return Rgba([0, 0, 0, 0]);
        }
        let anchors = self.anchors();
        let segments = (anchors.len() - 1) as f32;
        let pos = t.clamp(0.0, 1.0) * segments;
        let lo = (pos.floor() as usize).min(anchors.len() - 2);
        let frac = pos - lo as f32;

        let [r0, g0, b0] = anchors[lo];
        let [r1, g1, b1] = anchors[lo + 1];
        let lerp = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * frac).round() as u8;
        Rgba([lerp(r0, r1), lerp(g0, g1), lerp(b0, b1), 255])
    }
}

impl fmt::Display for Colormap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Colormap {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plasma" => Ok(Colormap::Plasma),
            "viridis" => Ok(Colormap::Viridis),
            "inferno" => Ok(Colormap::Inferno),
            "magma" => Ok(Colormap::Magma),
            "gray" | "grey" => Ok(Colormap::Gray),
            "spectral_r" => Ok(Colormap::SpectralR),
            other => Err(format!("unknown colormap: {other}")),
        }
    }
}
