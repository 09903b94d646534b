use bincode::{Decode, Encode};
use std::fmt::{Display, Formatter};

// 0/0/0 = black and 255/255/255 = white, so linearly map [0,3] to [255,0]
const SHADE_TO_RGB_BW: [[u8; 3]; 4] = [[255, 255, 255], [170, 170, 170], [85, 85, 85], [0, 0, 0]];

// Render with a light green tint
const SHADE_TO_RGB_GREEN_TINT: [[u8; 3]; 4] =
    [[0xAE, 0xD2, 0x8D], [0x75, 0x9C, 0x68], [0x40, 0x5E, 0x2D], [0x0C, 0x1E, 0x09]];

// Render with an intense green tint that somewhat mimics the original Game Boy LCD screen
const SHADE_TO_RGB_LIME_GREEN: [[u8; 3]; 4] =
    [[0x80, 0xA6, 0x08], [0x5D, 0x7F, 0x07], [0x25, 0x5C, 0x1A], [0x00, 0x32, 0x00]];

/// Output colors for the four display samples the PPU writes ($FF, $7F, $3F, $00)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum GbPalette {
    BlackAndWhite,
    #[default]
    GreenTint,
    LimeGreen,
}

impl GbPalette {
    pub const ALL: [Self; 3] = [Self::BlackAndWhite, Self::GreenTint, Self::LimeGreen];

    #[must_use]
    pub fn sample_to_rgb(self, sample: u8) -> [u8; 3] {
        let mapping = match self {
            Self::BlackAndWhite => SHADE_TO_RGB_BW,
            Self::GreenTint => SHADE_TO_RGB_GREEN_TINT,
            Self::LimeGreen => SHADE_TO_RGB_LIME_GREEN,
        };

        mapping[sample_to_shade(sample)]
    }
}

// Samples are lightest at $FF; round anything between the four levels to the nearest one
fn sample_to_shade(sample: u8) -> usize {
    match sample {
        0xC0..=0xFF => 0,
        0x60..=0xBF => 1,
        0x20..=0x5F => 2,
        0x00..=0x1F => 3,
    }
}

impl Display for GbPalette {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlackAndWhite => write!(f, "BlackAndWhite"),
            Self::GreenTint => write!(f, "GreenTint"),
            Self::LimeGreen => write!(f, "LimeGreen"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_map_to_four_shades() {
        let palette = GbPalette::BlackAndWhite;
        assert_eq!(palette.sample_to_rgb(0xFF), [255, 255, 255]);
        assert_eq!(palette.sample_to_rgb(0x7F), [170, 170, 170]);
        assert_eq!(palette.sample_to_rgb(0x3F), [85, 85, 85]);
        assert_eq!(palette.sample_to_rgb(0x00), [0, 0, 0]);
    }

    #[test]
    fn lightest_and_darkest_differ_for_every_palette() {
        for palette in GbPalette::ALL {
            assert_ne!(palette.sample_to_rgb(0xFF), palette.sample_to_rgb(0x00), "{palette}");
        }
    }

    #[test]
    fn default_is_green_tint() {
        assert_eq!(GbPalette::default(), GbPalette::GreenTint);
        assert_eq!(GbPalette::default().to_string(), "GreenTint");
    }
}
