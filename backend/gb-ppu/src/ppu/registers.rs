use crate::num::GetBit;
use crate::ppu::{PpuMode, SCREEN_HEIGHT};
use bincode::{Decode, Encode};
use std::fmt::{Display, Formatter};

pub const TILE_MAP_AREA_0: u16 = 0x9800;
pub const TILE_MAP_AREA_1: u16 = 0x9C00;

// 144 rendered lines + 10 VBlank lines
pub const LINES_PER_FRAME: u8 = 154;

// Display samples for shades 0-3, lightest to darkest
const SHADE_TO_SAMPLE: [u8; 4] = [0xFF, 0x7F, 0x3F, 0x00];

pub const BACKDROP_SAMPLE: u8 = SHADE_TO_SAMPLE[0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum TileDataArea {
    // $8800-$97FF
    #[default]
    Zero,
    // $8000-$8FFF
    One,
}

impl TileDataArea {
    // Sprites always use $8000-$8FFF
    pub const SPRITES: Self = Self::One;

    #[must_use]
    pub fn tile_address(self, tile_number: u8) -> u16 {
        // 16 bytes per tile
        match self {
            Self::Zero => {
                // Signed tile number biased by 128, so 0-127 map to $9000-$97FF and 128-255 map
                // to $8800-$8FFF
                let biased = u16::from((tile_number as i8 as i16 + 128) as u8);
                0x8800 + (biased << 4)
            }
            Self::One => 0x8000 + (u16::from(tile_number) << 4),
        }
    }

    fn from_bit(bit: bool) -> Self {
        if bit { Self::One } else { Self::Zero }
    }

    fn to_bit(self) -> bool {
        self == Self::One
    }
}

impl Display for TileDataArea {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Zero => write!(f, "$8800-$97FF"),
            Self::One => write!(f, "$8000-$8FFF"),
        }
    }
}

/// Selects one of the three palette registers when mapping a color index to a display sample.
///
/// Sprite pixels carry their OBP selector offset by one so that 0 always means BGP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaletteSelect {
    Background,
    Sprite0,
    Sprite1,
}

impl PaletteSelect {
    #[must_use]
    pub fn from_pixel_palette(palette: u8) -> Self {
        match palette {
            1 => Self::Sprite0,
            2 => Self::Sprite1,
            _ => Self::Background,
        }
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Registers {
    // LCDC: LCD control
    pub lcd_enabled: bool,
    pub window_tile_map_addr: u16,
    pub window_enabled: bool,
    pub bg_tile_data_area: TileDataArea,
    pub bg_tile_map_addr: u16,
    pub double_height_sprites: bool,
    pub sprites_enabled: bool,
    pub bg_enabled: bool,
    // STAT: LCD status
    pub lyc_interrupt_enabled: bool,
    pub mode_2_interrupt_enabled: bool,
    pub mode_1_interrupt_enabled: bool,
    pub mode_0_interrupt_enabled: bool,
    pub lyc_match: bool,
    pub mode: PpuMode,
    // SCX/SCY: Background X/Y position
    pub bg_x_scroll: u8,
    pub bg_y_scroll: u8,
    // WX/WY: Window X/Y position
    pub window_x: u8,
    pub window_y: u8,
    // LY: current line
    pub scanline: u8,
    // LYC: LY compare
    pub ly_compare: u8,
    // BGP / OBP0 / OBP1, stored raw
    pub bg_palette: u8,
    pub sprite_palettes: [u8; 2],
}

impl Registers {
    /// Power-on state: every register cleared and the LCD off
    #[must_use]
    pub fn new() -> Self {
        Self {
            lcd_enabled: false,
            window_tile_map_addr: TILE_MAP_AREA_0,
            window_enabled: false,
            bg_tile_data_area: TileDataArea::Zero,
            bg_tile_map_addr: TILE_MAP_AREA_0,
            double_height_sprites: false,
            sprites_enabled: false,
            bg_enabled: false,
            lyc_interrupt_enabled: false,
            mode_2_interrupt_enabled: false,
            mode_1_interrupt_enabled: false,
            mode_0_interrupt_enabled: false,
            lyc_match: false,
            mode: PpuMode::HBlank,
            bg_x_scroll: 0,
            bg_y_scroll: 0,
            window_x: 0,
            window_y: 0,
            scanline: 0,
            ly_compare: 0,
            bg_palette: 0,
            sprite_palettes: [0; 2],
        }
    }

    pub fn write_lcdc(&mut self, value: u8) {
        self.lcd_enabled = value.bit(7);
        self.window_tile_map_addr = if value.bit(6) { TILE_MAP_AREA_1 } else { TILE_MAP_AREA_0 };
        self.window_enabled = value.bit(5);
        self.bg_tile_data_area = TileDataArea::from_bit(value.bit(4));
        self.bg_tile_map_addr = if value.bit(3) { TILE_MAP_AREA_1 } else { TILE_MAP_AREA_0 };
        self.double_height_sprites = value.bit(2);
        self.sprites_enabled = value.bit(1);
        self.bg_enabled = value.bit(0);

        log::trace!("LCDC write: {value:02X}");
        log::trace!("  LCD enabled: {}", self.lcd_enabled);
        log::trace!("  BG/window enabled: {}", self.bg_enabled);
        log::trace!("  Window enabled: {}", self.window_enabled);
        log::trace!("  Sprites enabled: {}", self.sprites_enabled);
        log::trace!("  BG tile map address: ${:04X}", self.bg_tile_map_addr);
        log::trace!("  Window tile map address: ${:04X}", self.window_tile_map_addr);
        log::trace!("  BG tile data area: {}", self.bg_tile_data_area);
        log::trace!("  Double height sprites: {}", self.double_height_sprites);
    }

    #[must_use]
    pub fn read_lcdc(&self) -> u8 {
        (u8::from(self.lcd_enabled) << 7)
            | (u8::from(self.window_tile_map_addr == TILE_MAP_AREA_1) << 6)
            | (u8::from(self.window_enabled) << 5)
            | (u8::from(self.bg_tile_data_area.to_bit()) << 4)
            | (u8::from(self.bg_tile_map_addr == TILE_MAP_AREA_1) << 3)
            | (u8::from(self.double_height_sprites) << 2)
            | (u8::from(self.sprites_enabled) << 1)
            | u8::from(self.bg_enabled)
    }

    pub fn write_stat(&mut self, value: u8) {
        // Bits 0-2 are read-only
        self.lyc_interrupt_enabled = value.bit(6);
        self.mode_2_interrupt_enabled = value.bit(5);
        self.mode_1_interrupt_enabled = value.bit(4);
        self.mode_0_interrupt_enabled = value.bit(3);

        log::trace!("STAT write: {value:02X}");
        log::trace!("  LY=LYC interrupt enabled: {}", self.lyc_interrupt_enabled);
        log::trace!("  Mode 2 (OAM scan) interrupt enabled: {}", self.mode_2_interrupt_enabled);
        log::trace!("  Mode 1 (VBlank) interrupt enabled: {}", self.mode_1_interrupt_enabled);
        log::trace!("  Mode 0 (HBlank) interrupt enabled: {}", self.mode_0_interrupt_enabled);
    }

    #[must_use]
    pub fn read_stat(&self) -> u8 {
        0x80 | (u8::from(self.lyc_interrupt_enabled) << 6)
            | (u8::from(self.mode_2_interrupt_enabled) << 5)
            | (u8::from(self.mode_1_interrupt_enabled) << 4)
            | (u8::from(self.mode_0_interrupt_enabled) << 3)
            | (u8::from(self.lyc_match) << 2)
            | self.mode.to_bits()
    }

    pub fn write_lyc(&mut self, value: u8) {
        self.ly_compare = value;

        log::trace!("LYC write: {value:02X}");
    }

    pub fn write_scx(&mut self, value: u8) {
        self.bg_x_scroll = value;

        log::trace!("SCX write: {value:02X}");
    }

    pub fn write_scy(&mut self, value: u8) {
        self.bg_y_scroll = value;

        log::trace!("SCY write: {value:02X}");
    }

    pub fn write_wx(&mut self, value: u8) {
        self.window_x = value;

        log::trace!("WX write: {value:02X}");
    }

    pub fn write_wy(&mut self, value: u8) {
        self.window_y = value;

        log::trace!("WY write: {value:02X}");
    }

    pub fn write_bgp(&mut self, value: u8) {
        self.bg_palette = value;

        log::trace!("BGP write: {value:02X}");
    }

    pub fn write_obp0(&mut self, value: u8) {
        self.sprite_palettes[0] = value;

        log::trace!("OBP0 write: {value:02X}");
    }

    pub fn write_obp1(&mut self, value: u8) {
        self.sprite_palettes[1] = value;

        log::trace!("OBP1 write: {value:02X}");
    }

    /// Map a 2-bit color index through BGP, OBP0 or OBP1 to a display sample
    #[must_use]
    pub fn map_color(&self, color: u8, palette: PaletteSelect) -> u8 {
        let palette = match palette {
            PaletteSelect::Background => self.bg_palette,
            PaletteSelect::Sprite0 => self.sprite_palettes[0],
            PaletteSelect::Sprite1 => self.sprite_palettes[1],
        };
        let shade = (palette >> (2 * (color & 0x3))) & 0x3;
        SHADE_TO_SAMPLE[shade as usize]
    }

    /// Latched at the start of OAM scan: whether the window may appear on this line
    #[must_use]
    pub fn window_triggered(&self) -> bool {
        self.window_enabled && self.scanline >= self.window_y
    }

    /// Whether the window line counter should advance for this line
    #[must_use]
    pub fn window_visible(&self) -> bool {
        self.window_y < (SCREEN_HEIGHT as u8 - 1)
            && self.window_x < 166
            && self.scanline >= self.window_y
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lcdc_round_trips() {
        let mut registers = Registers::new();
        for value in [0x00, 0x91, 0xE3, 0xFF, 0x5A] {
            registers.write_lcdc(value);
            assert_eq!(registers.read_lcdc(), value);
        }
    }

    #[test]
    fn stat_low_bits_are_read_only() {
        let mut registers = Registers::new();
        registers.mode = PpuMode::Rendering;
        registers.lyc_match = true;
        registers.write_stat(0x78);
        assert_eq!(registers.read_stat(), 0x80 | 0x78 | 0x04 | 0x03);

        registers.write_stat(0x07);
        assert_eq!(registers.read_stat(), 0x80 | 0x04 | 0x03);
    }

    #[test]
    fn palette_mapping() {
        let mut registers = Registers::new();
        registers.write_bgp(0xE4);
        assert_eq!(registers.map_color(0, PaletteSelect::Background), 0xFF);
        assert_eq!(registers.map_color(1, PaletteSelect::Background), 0x7F);
        assert_eq!(registers.map_color(2, PaletteSelect::Background), 0x3F);
        assert_eq!(registers.map_color(3, PaletteSelect::Background), 0x00);

        // Inverted palette
        registers.write_obp1(0x1B);
        assert_eq!(registers.map_color(0, PaletteSelect::Sprite1), 0x00);
        assert_eq!(registers.map_color(3, PaletteSelect::Sprite1), 0xFF);
        assert_eq!(registers.map_color(3, PaletteSelect::Sprite0), 0xFF);
    }

    #[test]
    fn tile_data_addressing() {
        assert_eq!(TileDataArea::One.tile_address(0), 0x8000);
        assert_eq!(TileDataArea::One.tile_address(0xFF), 0x8FF0);
        assert_eq!(TileDataArea::Zero.tile_address(0), 0x9000);
        assert_eq!(TileDataArea::Zero.tile_address(0x7F), 0x97F0);
        assert_eq!(TileDataArea::Zero.tile_address(0x80), 0x8800);
        assert_eq!(TileDataArea::Zero.tile_address(0xFF), 0x8FF0);
    }
}
