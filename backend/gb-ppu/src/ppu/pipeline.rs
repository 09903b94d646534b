//! Mode 3 pixel pipeline: the BG/window tile fetcher, the sprite fetcher that stalls it, and the
//! BG and sprite FIFOs that feed the LCD one pixel per dot
//!
//! The BG fetcher runs GetTile -> DataLow -> DataHigh -> Idle at 2 dots per phase, then Push.
//! Push appends the decoded 8-pixel run to a pending queue and drains it into the live FIFOs
//! until either the run is empty, the window starts, or a sprite is hit at the next X position.
//! A sprite hit stalls the fetcher for 6 dots, after which the drain resumes where it stopped.
//!
//! The sprite FIFO is aligned with the BG FIFO by index: element `i` of both queues describes the
//! same screen X. Sprite fetches can place pixels ahead of the BG FIFO, so the sprite FIFO is never
//! shorter than the BG FIFO, and the two are always popped together.

use crate::bus::PpuBus;
use crate::num::tile_pixel;
use crate::ppu::fifo::{BgPixel, PixelFifo, SpritePixel};
use crate::ppu::mixer;
use crate::ppu::oam::{MAX_SPRITES_PER_LINE, SpriteAttribute};
use crate::ppu::registers::{Registers, TileDataArea};
use crate::ppu::{PpuFrameBuffer, SCREEN_WIDTH};
use bincode::{Decode, Encode};

const LINE_WIDTH: u8 = SCREEN_WIDTH as u8;
const PHASE_DOTS: u8 = 2;
const SPRITE_FETCH_DOTS: u8 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum FetchPhase {
    GetTile,
    DataLow,
    DataHigh,
    Idle,
    Push,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct PixelPipeline {
    bg_fifo: PixelFifo<BgPixel>,
    // Decoded run waiting to be drained into the BG FIFO
    pending: PixelFifo<BgPixel>,
    sprite_fifo: PixelFifo<SpritePixel>,
    phase: FetchPhase,
    phase_dots: u8,
    line: u8,
    // Screen X of the next pixel pushed into the BG FIFO
    fetch_x: u8,
    // Screen X of the next pixel written to the frame buffer
    output_x: u8,
    first_tile_discard: u8,
    map_base: u16,
    fetch_column: u8,
    fetch_row: u8,
    tile_line: u8,
    tile_map_addr: u16,
    tile_data_addr: u16,
    data_low: u8,
    data_high: u8,
    window_triggered: bool,
    window_line: u8,
    over_window: bool,
    resume_after_sprite: bool,
    sprite_fetch_active: bool,
    sprite_fetch_dots: u8,
    next_sprite: u8,
}

impl PixelPipeline {
    #[must_use]
    pub fn new() -> Self {
        Self {
            bg_fifo: PixelFifo::new(),
            pending: PixelFifo::new(),
            sprite_fifo: PixelFifo::new(),
            phase: FetchPhase::GetTile,
            phase_dots: 0,
            line: 0,
            fetch_x: 0,
            output_x: 0,
            first_tile_discard: 0,
            map_base: 0,
            fetch_column: 0,
            fetch_row: 0,
            tile_line: 0,
            tile_map_addr: 0,
            tile_data_addr: 0,
            data_low: 0,
            data_high: 0,
            window_triggered: false,
            window_line: 0,
            over_window: false,
            resume_after_sprite: false,
            sprite_fetch_active: false,
            sprite_fetch_dots: 0,
            next_sprite: 0,
        }
    }

    pub fn start_new_line(
        &mut self,
        line: u8,
        registers: &Registers,
        window_triggered: bool,
        window_line: u8,
    ) {
        self.bg_fifo.reset();
        self.pending.reset();
        self.sprite_fifo.reset();

        self.phase = FetchPhase::GetTile;
        self.phase_dots = 0;
        self.line = line;
        self.fetch_x = 0;
        self.output_x = 0;
        self.first_tile_discard = registers.bg_x_scroll % 8;

        self.map_base = 0;
        self.fetch_column = 0;
        self.fetch_row = 0;
        self.tile_line = 0;
        self.tile_map_addr = 0;
        self.tile_data_addr = 0;
        self.data_low = 0;
        self.data_high = 0;

        self.window_triggered = window_triggered;
        self.window_line = window_line;
        self.over_window = false;

        self.resume_after_sprite = false;
        self.sprite_fetch_active = false;
        self.sprite_fetch_dots = 0;
        self.next_sprite = 0;
    }

    /// Advance the pipeline by one dot, writing at most one pixel to the frame buffer
    pub fn tick<B: PpuBus>(
        &mut self,
        registers: &Registers,
        sprites: &[SpriteAttribute],
        bus: &B,
        frame_buffer: &mut PpuFrameBuffer,
    ) {
        self.advance_fetcher(registers, sprites, bus);
        self.output_pixel(registers, frame_buffer);
    }

    #[must_use]
    pub fn done_with_line(&self) -> bool {
        self.fetch_x >= LINE_WIDTH
    }

    /// Write out whatever is still queued once every pixel of the line has been fetched
    pub fn flush_line(&mut self, registers: &Registers, frame_buffer: &mut PpuFrameBuffer) {
        while self.output_pixel(registers, frame_buffer) {}
    }

    #[must_use]
    pub fn fetch_x(&self) -> u8 {
        self.fetch_x
    }

    #[must_use]
    pub fn phase(&self) -> FetchPhase {
        self.phase
    }

    #[must_use]
    pub fn state_valid(&self) -> bool {
        self.bg_fifo.indices_valid()
            && self.pending.indices_valid()
            && self.sprite_fifo.indices_valid()
            && self.phase_dots < PHASE_DOTS
            && self.fetch_x <= LINE_WIDTH
            && self.output_x <= LINE_WIDTH
            && self.first_tile_discard < 8
            && self.sprite_fetch_dots < SPRITE_FETCH_DOTS
            && usize::from(self.next_sprite) <= MAX_SPRITES_PER_LINE
    }

    fn advance_fetcher<B: PpuBus>(
        &mut self,
        registers: &Registers,
        sprites: &[SpriteAttribute],
        bus: &B,
    ) {
        if self.sprite_fetch_active {
            self.sprite_fetch_dots += 1;
            if self.sprite_fetch_dots < SPRITE_FETCH_DOTS {
                return;
            }

            // Fetch done; fall through and resume the interrupted push on this same dot
            self.finish_sprite_fetch(sprites, bus);
        }

        match self.phase {
            FetchPhase::GetTile => {
                if self.phase_dots == 0 {
                    self.compute_tile_coordinates(registers);
                } else {
                    self.tile_map_addr = self.map_base
                        + 32 * u16::from(self.fetch_row)
                        + u16::from(self.fetch_column);
                }

                if self.count_phase_dot() {
                    self.phase = FetchPhase::DataLow;
                }
            }
            FetchPhase::DataLow => {
                if self.count_phase_dot() {
                    let tile_number = bus.read_vram(self.tile_map_addr);
                    self.tile_data_addr = registers.bg_tile_data_area.tile_address(tile_number)
                        + 2 * u16::from(self.tile_line);
                    self.data_low = bus.read_vram(self.tile_data_addr);
                    self.phase = FetchPhase::DataHigh;
                }
            }
            FetchPhase::DataHigh => {
                if self.count_phase_dot() {
                    self.data_high = bus.read_vram(self.tile_data_addr + 1);
                    self.phase = FetchPhase::Idle;
                }
            }
            FetchPhase::Idle => {
                // Always taken, even if the FIFO is already empty
                if self.count_phase_dot() {
                    self.phase = FetchPhase::Push;
                }
            }
            FetchPhase::Push => self.push_phase(registers, sprites),
        }
    }

    fn count_phase_dot(&mut self) -> bool {
        self.phase_dots += 1;
        if self.phase_dots == PHASE_DOTS {
            self.phase_dots = 0;
            true
        } else {
            false
        }
    }

    fn compute_tile_coordinates(&mut self, registers: &Registers) {
        if self.over_window {
            self.map_base = registers.window_tile_map_addr;

            let window_start_x = registers.window_x.wrapping_sub(7);
            self.fetch_column = self.fetch_x.wrapping_sub(window_start_x) / 8;
            self.fetch_row = self.window_line / 8;
            self.tile_line = self.window_line % 8;
        } else {
            self.map_base = registers.bg_tile_map_addr;

            self.fetch_column = (registers.bg_x_scroll.wrapping_add(self.fetch_x) >> 3) & 31;
            let bg_y = registers.bg_y_scroll.wrapping_add(self.line);
            self.fetch_row = bg_y / 8;
            self.tile_line = bg_y % 8;
        }
    }

    fn push_phase(&mut self, registers: &Registers, sprites: &[SpriteAttribute]) {
        if self.resume_after_sprite {
            // The run was already appended before the sprite fetch interrupted the drain
            self.resume_after_sprite = false;
        } else {
            // Fine X scroll: drop SCX % 8 pixels from the first BG tile of the line only
            let discard =
                if self.fetch_x == 0 && !self.over_window { self.first_tile_discard } else { 0 };
            for i in discard..8 {
                self.pending.push(BgPixel::new(tile_pixel(self.data_low, self.data_high, i)));
            }
        }

        while !self.pending.is_empty() && self.fetch_x < LINE_WIDTH {
            if self.check_window_trigger(registers) {
                break;
            }

            if self.sprite_due(registers, sprites) {
                log::trace!(
                    "Sprite fetch at line {} X {} (sprite {})",
                    self.line,
                    self.fetch_x,
                    self.next_sprite
                );
                self.sprite_fetch_active = true;
                self.sprite_fetch_dots = 0;
                return;
            }

            let Some(pixel) = self.pending.pop() else { break };
            self.push_pixel(pixel);
        }

        self.phase = FetchPhase::GetTile;
        self.phase_dots = 0;
    }

    fn check_window_trigger(&mut self, registers: &Registers) -> bool {
        if !self.window_triggered {
            return false;
        }

        if !registers.window_enabled {
            self.over_window = false;
            return false;
        }

        if !self.over_window && i16::from(self.fetch_x) >= i16::from(registers.window_x) - 7 {
            log::trace!("Window start at line {} X {}", self.line, self.fetch_x);

            // Drop the rest of the BG run; the next fetch reads from the window map
            self.over_window = true;
            self.pending.reset();
            return true;
        }

        false
    }

    fn sprite_due(&mut self, registers: &Registers, sprites: &[SpriteAttribute]) -> bool {
        if !registers.sprites_enabled {
            return false;
        }

        let x = i16::from(self.fetch_x);
        while let Some(sprite) = sprites.get(usize::from(self.next_sprite)) {
            if sprite.x + 8 <= x {
                // Entirely left of the current position, nothing left to draw
                self.next_sprite += 1;
                continue;
            }

            return x >= sprite.x;
        }

        false
    }

    fn push_pixel(&mut self, pixel: BgPixel) {
        self.bg_fifo.push(pixel);
        if self.sprite_fifo.len() < self.bg_fifo.len() {
            self.sprite_fifo.push(SpritePixel::blank_at(i16::from(self.fetch_x)));
        }
        self.fetch_x += 1;
    }

    fn finish_sprite_fetch<B: PpuBus>(&mut self, sprites: &[SpriteAttribute], bus: &B) {
        self.sprite_fetch_active = false;
        self.sprite_fetch_dots = 0;
        self.resume_after_sprite = true;

        let Some(&sprite) = sprites.get(usize::from(self.next_sprite)) else { return };
        self.next_sprite += 1;

        let (data_low, data_high) = self.fetch_sprite_row(&sprite, bus);
        self.overlay_sprite(&sprite, data_low, data_high);
    }

    fn fetch_sprite_row<B: PpuBus>(&self, sprite: &SpriteAttribute, bus: &B) -> (u8, u8) {
        let mut row = ((i16::from(self.line) - sprite.y) as u8) & 0x0F;

        let tile_number = if sprite.height == 16 {
            if sprite.y_flip {
                row = 15 - row;
            }
            let tile_number =
                if row < 8 { sprite.tile_index & 0xFE } else { sprite.tile_index | 0x01 };
            row &= 0x07;
            tile_number
        } else {
            row &= 0x07;
            if sprite.y_flip {
                row = 7 - row;
            }
            sprite.tile_index
        };

        let address = TileDataArea::SPRITES.tile_address(tile_number) + 2 * u16::from(row);
        let mut data_low = bus.read_vram(address);
        let mut data_high = bus.read_vram(address + 1);

        if sprite.x_flip {
            data_low = data_low.reverse_bits();
            data_high = data_high.reverse_bits();
        }

        (data_low, data_high)
    }

    fn overlay_sprite(&mut self, sprite: &SpriteAttribute, data_low: u8, data_high: u8) {
        // Columns left of the fetch position are either offscreen or already past the FIFO
        let discard = (i16::from(self.fetch_x) - sprite.x).clamp(0, 8) as u8;
        let base = self.bg_fifo.len();

        for col in discard..8 {
            let pixel = SpritePixel {
                color: tile_pixel(data_low, data_high, col),
                palette: sprite.palette + 1,
                oam_index: sprite.oam_index,
                bg_priority: sprite.bg_priority,
                blank: false,
                x: sprite.x + i16::from(col),
                origin_x: sprite.x,
            };

            match self.sprite_fifo.get_mut(base + usize::from(col - discard)) {
                Some(existing) => {
                    debug_assert_eq!(existing.x, pixel.x);

                    if existing.yields_to(&pixel) {
                        *existing = pixel;
                    }
                }
                None => self.sprite_fifo.push(pixel),
            }
        }
    }

    fn output_pixel(&mut self, registers: &Registers, frame_buffer: &mut PpuFrameBuffer) -> bool {
        if self.output_x >= LINE_WIDTH {
            return false;
        }

        let Some(bg_pixel) = self.bg_fifo.pop() else { return false };
        let sprite_pixel =
            self.sprite_fifo.pop().unwrap_or(SpritePixel::blank_at(i16::from(self.output_x)));

        let sample = mixer::output_sample(registers, bg_pixel, sprite_pixel);
        frame_buffer.set(self.line, self.output_x, sample);
        self.output_x += 1;

        true
    }
}

impl Default for PixelPipeline {
    fn default() -> Self {
        Self::new()
    }
}
