//! Mode 2 OAM scan: selects the sprites that overlap the current line

use crate::bus::PpuBus;
use crate::num::GetBit;
use bincode::{Decode, Encode};

pub const MAX_SPRITES_PER_LINE: usize = 10;

const OAM_START: u16 = 0xFE00;
// 40 entries * 4 bytes
const OAM_TABLE_LEN: u8 = 160;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub struct SpriteAttribute {
    // Screen-relative, i.e. OAM Y - 16
    pub y: i16,
    // Screen-relative, i.e. OAM X - 8
    pub x: i16,
    pub tile_index: u8,
    pub bg_priority: bool,
    pub y_flip: bool,
    pub x_flip: bool,
    // 0 = OBP0, 1 = OBP1
    pub palette: u8,
    pub oam_index: u8,
    pub height: u8,
}

impl SpriteAttribute {
    fn from_oam_bytes(bytes: [u8; 4], oam_index: u8, height: u8) -> Self {
        let [y, x, tile_index, attributes] = bytes;
        Self {
            y: i16::from(y) - 16,
            x: i16::from(x) - 8,
            tile_index,
            bg_priority: attributes.bit(7),
            y_flip: attributes.bit(6),
            x_flip: attributes.bit(5),
            palette: u8::from(attributes.bit(4)),
            oam_index,
            height,
        }
    }

    fn overlaps_line(&self, scanline: u8) -> bool {
        let line = i16::from(scanline);
        (self.y..self.y + i16::from(self.height)).contains(&line)
    }
}

/// Sprites selected for one line. Fixed array plus a length so the serialized form never
/// changes size.
#[derive(Debug, Clone, Default, Encode, Decode)]
pub struct SpriteBuffer {
    sprites: [SpriteAttribute; MAX_SPRITES_PER_LINE],
    len: u8,
}

impl SpriteBuffer {
    #[must_use]
    pub fn as_slice(&self) -> &[SpriteAttribute] {
        &self.sprites[..usize::from(self.len).min(MAX_SPRITES_PER_LINE)]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len.into()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len() >= MAX_SPRITES_PER_LINE
    }

    fn push(&mut self, sprite: SpriteAttribute) {
        if !self.is_full() {
            self.sprites[self.len()] = sprite;
            self.len += 1;
        }
    }

    fn clear(&mut self) {
        self.sprites = [SpriteAttribute::default(); MAX_SPRITES_PER_LINE];
        self.len = 0;
    }

    /// Order sprites by X, ties broken by OAM index, which is the order the pipeline fetches in
    fn sort_for_draw(&mut self) {
        let len = self.len().min(MAX_SPRITES_PER_LINE);
        self.sprites[..len].sort_by_key(|sprite| (sprite.x, sprite.oam_index));
    }
}

#[derive(Debug, Clone, Default, Encode, Decode)]
pub struct OamScanner {
    selected: SpriteBuffer,
    fetched: [u8; 4],
    fetch_count: u8,
    // Byte offset of the next OAM read
    oam_cursor: u8,
}

impl OamScanner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.selected.clear();
        self.fetched = [0; 4];
        self.fetch_count = 0;
        self.oam_cursor = 0;
    }

    /// One dot of mode 2: read two OAM bytes, and evaluate an entry every second dot.
    ///
    /// All 40 entries are always walked, even after 10 sprites have been selected.
    pub fn scan_dot<B: PpuBus>(&mut self, bus: &B, scanline: u8, double_height_sprites: bool) {
        if self.oam_cursor >= OAM_TABLE_LEN {
            return;
        }

        for _ in 0..2 {
            let address = OAM_START + u16::from(self.oam_cursor);
            self.fetched[usize::from(self.fetch_count & 3)] = bus.read_oam(address);
            self.fetch_count += 1;
            self.oam_cursor += 1;
        }

        if self.fetch_count < 4 {
            return;
        }
        self.fetch_count = 0;

        let oam_index = self.oam_cursor / 4 - 1;
        let height = if double_height_sprites { 16 } else { 8 };
        let sprite = SpriteAttribute::from_oam_bytes(self.fetched, oam_index, height);

        if !self.selected.is_full() && sprite.overlaps_line(scanline) {
            log::trace!("Selected sprite {oam_index} for line {scanline}: {sprite:?}");
            self.selected.push(sprite);
        }
    }

    /// Called when mode 2 ends; returns the selected sprites in fetch order
    pub fn finish(&mut self) -> &[SpriteAttribute] {
        self.selected.sort_for_draw();
        self.selected.as_slice()
    }

    #[must_use]
    pub fn selected(&self) -> &[SpriteAttribute] {
        self.selected.as_slice()
    }

    #[must_use]
    pub fn state_valid(&self) -> bool {
        self.selected.len() <= MAX_SPRITES_PER_LINE
            && self.selected.as_slice().iter().all(|sprite| matches!(sprite.height, 8 | 16))
            && self.fetch_count < 4
            && self.oam_cursor <= OAM_TABLE_LEN
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interrupts::InterruptType;

    struct OamBus([u8; 160]);

    impl PpuBus for OamBus {
        fn read_vram(&self, _address: u16) -> u8 {
            0
        }

        fn read_oam(&self, address: u16) -> u8 {
            self.0[(address - OAM_START) as usize]
        }

        fn request_interrupt(&mut self, _interrupt_type: InterruptType) {}
    }

    fn set_sprite(oam: &mut [u8; 160], index: usize, y: u8, x: u8, tile: u8, attributes: u8) {
        oam[4 * index..4 * index + 4].copy_from_slice(&[y, x, tile, attributes]);
    }

    fn run_scan(bus: &OamBus, scanline: u8, double_height: bool) -> Vec<SpriteAttribute> {
        let mut scanner = OamScanner::new();
        for _ in 0..80 {
            scanner.scan_dot(bus, scanline, double_height);
        }
        scanner.finish().to_vec()
    }

    #[test]
    fn selects_at_most_ten_in_table_order() {
        let mut oam = [0; 160];
        // 12 sprites on line 0, listed with descending X so the cutoff can't be by X
        for i in 0..12 {
            set_sprite(&mut oam, i, 16, 100 - i as u8, 0, 0);
        }
        // And one more that is on a different line
        set_sprite(&mut oam, 20, 40, 50, 0, 0);

        let selected = run_scan(&OamBus(oam), 0, false);
        assert_eq!(selected.len(), 10);

        let mut indices: Vec<_> = selected.iter().map(|sprite| sprite.oam_index).collect();
        indices.sort_unstable();
        assert_eq!(indices, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn sorted_by_x_then_oam_index() {
        let mut oam = [0; 160];
        set_sprite(&mut oam, 0, 16, 40, 0, 0);
        set_sprite(&mut oam, 1, 16, 20, 0, 0);
        set_sprite(&mut oam, 2, 16, 40, 0, 0);
        set_sprite(&mut oam, 3, 16, 8, 0, 0);

        let selected = run_scan(&OamBus(oam), 0, false);
        let order: Vec<_> = selected.iter().map(|sprite| (sprite.x, sprite.oam_index)).collect();
        assert_eq!(order, vec![(0, 3), (12, 1), (32, 0), (32, 2)]);
    }

    #[test]
    fn height_follows_obj_size() {
        let mut oam = [0; 160];
        // Covers lines 0-7 at 8px, 0-15 at 16px
        set_sprite(&mut oam, 0, 16, 8, 0, 0);

        assert!(run_scan(&OamBus(oam), 10, false).is_empty());

        let selected = run_scan(&OamBus(oam), 10, true);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].height, 16);
    }

    #[test]
    fn decodes_attributes() {
        let mut oam = [0; 160];
        set_sprite(&mut oam, 5, 10, 3, 0x42, 0b1111_0000);

        let selected = run_scan(&OamBus(oam), 0, false);
        assert_eq!(
            selected,
            vec![SpriteAttribute {
                y: -6,
                x: -5,
                tile_index: 0x42,
                bg_priority: true,
                y_flip: true,
                x_flip: true,
                palette: 1,
                oam_index: 5,
                height: 8,
            }]
        );
    }
}
