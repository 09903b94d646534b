//! Background/sprite priority resolution and palette mapping

use crate::ppu::fifo::{BgPixel, SpritePixel};
use crate::ppu::registers::{BACKDROP_SAMPLE, PaletteSelect, Registers};

/// Resolve one BG/sprite pixel pair. The returned pixel's palette is 0 for BGP, or the sprite's
/// OBP selector + 1.
#[must_use]
pub fn mix_pixels(bg: BgPixel, sprite: SpritePixel) -> BgPixel {
    if bg.blank && sprite.blank {
        return BgPixel::BLANK;
    }

    if sprite.blank {
        return bg;
    }

    let sprite_wins = bg.blank || !(sprite.color == 0 || (sprite.bg_priority && bg.color != 0));
    if sprite_wins {
        BgPixel { color: sprite.color, blank: false, palette: sprite.palette }
    } else {
        bg
    }
}

/// Mix a popped pixel pair and map it to a display sample
#[must_use]
pub fn output_sample(registers: &Registers, bg: BgPixel, sprite: SpritePixel) -> u8 {
    // LCDC.0 clear: only sprites can draw
    let bg = if registers.bg_enabled { bg } else { BgPixel::BLANK };

    let mixed = mix_pixels(bg, sprite);
    if mixed.blank {
        BACKDROP_SAMPLE
    } else {
        registers.map_color(mixed.color, PaletteSelect::from_pixel_palette(mixed.palette))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sprite(color: u8, bg_priority: bool) -> SpritePixel {
        SpritePixel { color, palette: 1, bg_priority, blank: false, ..SpritePixel::blank_at(0) }
    }

    #[test]
    fn both_blank_is_backdrop() {
        let registers = Registers::new();
        assert_eq!(output_sample(&registers, BgPixel::BLANK, SpritePixel::blank_at(0)), 0xFF);
    }

    #[test]
    fn blank_sprite_shows_bg() {
        assert_eq!(mix_pixels(BgPixel::new(2), SpritePixel::blank_at(0)), BgPixel::new(2));
    }

    #[test]
    fn blank_bg_always_shows_sprite() {
        let mixed = mix_pixels(BgPixel::BLANK, sprite(0, true));
        assert_eq!(mixed, BgPixel { color: 0, blank: false, palette: 1 });
    }

    #[test]
    fn transparent_sprite_shows_bg() {
        assert_eq!(mix_pixels(BgPixel::new(0), sprite(0, false)), BgPixel::new(0));
        assert_eq!(mix_pixels(BgPixel::new(3), sprite(0, false)), BgPixel::new(3));
    }

    #[test]
    fn bg_priority_only_hides_behind_nonzero_bg() {
        assert_eq!(mix_pixels(BgPixel::new(1), sprite(2, true)), BgPixel::new(1));
        assert_eq!(mix_pixels(BgPixel::new(0), sprite(2, true)).color, 2);
        assert_eq!(mix_pixels(BgPixel::new(1), sprite(2, false)).color, 2);
    }

    #[test]
    fn disabled_bg_is_forced_blank() {
        let mut registers = Registers::new();
        registers.write_bgp(0xE4);
        registers.write_obp0(0xE4);

        registers.bg_enabled = true;
        assert_eq!(output_sample(&registers, BgPixel::new(3), SpritePixel::blank_at(0)), 0x00);

        registers.bg_enabled = false;
        assert_eq!(output_sample(&registers, BgPixel::new(3), SpritePixel::blank_at(0)), 0xFF);
        // A BG-priority sprite is no longer hidden
        assert_eq!(output_sample(&registers, BgPixel::new(3), sprite(1, true)), 0x7F);
    }
}
