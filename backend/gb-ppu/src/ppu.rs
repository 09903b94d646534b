//! Game Boy PPU (picture processing unit)

mod fifo;
mod mixer;
mod oam;
mod pipeline;
mod registers;


use crate::bus::PpuBus;
use crate::interrupts::InterruptType;
use crate::ppu::oam::OamScanner;
use crate::ppu::pipeline::PixelPipeline;
use crate::ppu::registers::{BACKDROP_SAMPLE, LINES_PER_FRAME, Registers};
use crate::serialize::{self, SaveStateError};
use bincode::{Decode, Encode};
use std::ops::{Deref, DerefMut};

pub use fifo::{BgPixel, FIFO_CAPACITY, PixelFifo, SpritePixel};
pub use oam::{MAX_SPRITES_PER_LINE, SpriteAttribute};
pub use pipeline::FetchPhase;

pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;

pub const FRAME_BUFFER_LEN: usize = SCREEN_WIDTH * SCREEN_HEIGHT;

pub const DOTS_PER_LINE: u16 = 456;
pub const OAM_SCAN_DOTS: u16 = 80;
pub const DOTS_PER_M_CYCLE: u32 = 4;

// Window line counter value meaning "no window line drawn yet this frame"
const WINDOW_LINE_RESET: u8 = 0xFF;

/// Palette-mapped output samples, one byte per pixel: $00 (darkest) to $FF (lightest)
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct PpuFrameBuffer(Box<[u8; FRAME_BUFFER_LEN]>);

impl PpuFrameBuffer {
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.iter().copied()
    }

    fn set(&mut self, line: u8, pixel: u8, sample: u8) {
        let idx = usize::from(line) * SCREEN_WIDTH + usize::from(pixel);
        if let Some(out) = self.0.get_mut(idx) {
            *out = sample;
        }
    }
}

impl Default for PpuFrameBuffer {
    fn default() -> Self {
        Self(Box::new([BACKDROP_SAMPLE; FRAME_BUFFER_LEN]))
    }
}

impl Deref for PpuFrameBuffer {
    type Target = [u8; FRAME_BUFFER_LEN];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for PpuFrameBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum PpuMode {
    // Mode 0
    HBlank,
    // Mode 1
    VBlank,
    // Mode 2
    ScanningOam,
    // Mode 3
    Rendering,
}

impl PpuMode {
    #[must_use]
    pub fn to_bits(self) -> u8 {
        match self {
            Self::HBlank => 0,
            Self::VBlank => 1,
            Self::ScanningOam => 2,
            Self::Rendering => 3,
        }
    }
}

/// Returned from [`Ppu::step`] when line 144 is reached and the frame buffer holds a full frame
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReady;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatSource {
    LyCompare,
    OamScan,
    VBlank,
    HBlank,
}

#[derive(Debug, Clone, Encode, Decode)]
struct LineState {
    window_triggered: bool,
    window_line: u8,
    dot: u16,
}

impl LineState {
    fn new() -> Self {
        Self { window_triggered: false, window_line: WINDOW_LINE_RESET, dot: 0 }
    }
}

/// Field order here is the savestate layout
#[derive(Debug, Clone, Encode, Decode)]
pub struct Ppu {
    registers: Registers,
    oam_scan: OamScanner,
    line_state: LineState,
    pipeline: PixelPipeline,
    frame_buffer: PpuFrameBuffer,
}

impl Ppu {
    #[must_use]
    pub fn new() -> Self {
        Self {
            registers: Registers::new(),
            oam_scan: OamScanner::new(),
            line_state: LineState::new(),
            pipeline: PixelPipeline::new(),
            frame_buffer: PpuFrameBuffer::default(),
        }
    }

    /// Advance by the given number of M-cycles (4 dots each)
    pub fn tick<B: PpuBus>(&mut self, m_cycles: u32, bus: &mut B) -> Option<FrameReady> {
        self.step(m_cycles * DOTS_PER_M_CYCLE, bus)
    }

    /// Advance by the given number of dots. Returns `Some` if a frame completed during the step.
    pub fn step<B: PpuBus>(&mut self, dots: u32, bus: &mut B) -> Option<FrameReady> {
        // The PPU does not process at all while the LCD is off
        if !self.registers.lcd_enabled {
            return None;
        }

        let mut frame_ready = None;
        for _ in 0..dots {
            if self.tick_dot(bus) {
                frame_ready = Some(FrameReady);
            }
        }

        frame_ready
    }

    fn tick_dot<B: PpuBus>(&mut self, bus: &mut B) -> bool {
        match self.registers.mode {
            PpuMode::ScanningOam => {
                self.oam_scan.scan_dot(
                    bus,
                    self.registers.scanline,
                    self.registers.double_height_sprites,
                );

                self.line_state.dot += 1;
                if self.line_state.dot >= OAM_SCAN_DOTS {
                    self.start_rendering();
                }

                false
            }
            PpuMode::Rendering => {
                self.pipeline.tick(
                    &self.registers,
                    self.oam_scan.selected(),
                    bus,
                    &mut self.frame_buffer,
                );

                self.line_state.dot += 1;
                if self.pipeline.done_with_line() {
                    self.pipeline.flush_line(&self.registers, &mut self.frame_buffer);

                    log::trace!(
                        "Pixel FIFO finished line {} after dot {}",
                        self.registers.scanline,
                        self.line_state.dot
                    );

                    self.registers.mode = PpuMode::HBlank;
                    self.stat_source(StatSource::HBlank, bus);
                }

                false
            }
            PpuMode::HBlank => {
                self.line_state.dot += 1;
                self.line_state.dot >= DOTS_PER_LINE && self.end_hblank_line(bus)
            }
            PpuMode::VBlank => {
                self.line_state.dot += 1;
                if self.line_state.dot >= DOTS_PER_LINE {
                    self.end_vblank_line(bus);
                }

                false
            }
        }
    }

    fn start_rendering(&mut self) {
        self.registers.mode = PpuMode::Rendering;

        let sprites = self.oam_scan.finish();
        log::trace!(
            "OAM scan done for line {}: {} sprites",
            self.registers.scanline,
            sprites.len()
        );

        self.pipeline.start_new_line(
            self.registers.scanline,
            &self.registers,
            self.line_state.window_triggered,
            self.line_state.window_line,
        );
    }

    // Returns true if the frame is complete
    fn end_hblank_line<B: PpuBus>(&mut self, bus: &mut B) -> bool {
        self.line_state.dot = 0;
        self.registers.scanline += 1;

        let frame_complete = self.registers.scanline == SCREEN_HEIGHT as u8;
        if frame_complete {
            log::trace!("Entering VBlank");

            self.registers.mode = PpuMode::VBlank;
            bus.request_interrupt(InterruptType::VBlank);
            self.stat_source(StatSource::VBlank, bus);
        } else {
            self.start_oam_scan(bus);
        }

        self.compare_ly(bus);

        frame_complete
    }

    fn end_vblank_line<B: PpuBus>(&mut self, bus: &mut B) {
        self.line_state.dot = 0;
        self.registers.scanline += 1;

        // The window line counter restarts every frame
        self.line_state.window_line = WINDOW_LINE_RESET;

        if self.registers.scanline == LINES_PER_FRAME {
            self.registers.scanline = 0;
            self.start_oam_scan(bus);
        }

        self.compare_ly(bus);
    }

    fn start_oam_scan<B: PpuBus>(&mut self, bus: &mut B) {
        self.oam_scan.reset();
        self.registers.mode = PpuMode::ScanningOam;
        self.latch_window_trigger();
        self.stat_source(StatSource::OamScan, bus);
    }

    // WY is only checked at the start of mode 2
    fn latch_window_trigger(&mut self) {
        self.line_state.window_triggered = self.registers.window_triggered();
        if self.line_state.window_triggered && self.registers.window_visible() {
            self.line_state.window_line = self.line_state.window_line.wrapping_add(1);
        }
    }

    fn compare_ly<B: PpuBus>(&mut self, bus: &mut B) {
        self.registers.lyc_match = self.registers.scanline == self.registers.ly_compare;
        if self.registers.lyc_match {
            self.stat_source(StatSource::LyCompare, bus);
        }
    }

    fn stat_source<B: PpuBus>(&self, source: StatSource, bus: &mut B) {
        let enabled = match source {
            StatSource::LyCompare => self.registers.lyc_interrupt_enabled,
            StatSource::OamScan => self.registers.mode_2_interrupt_enabled,
            StatSource::VBlank => self.registers.mode_1_interrupt_enabled,
            StatSource::HBlank => self.registers.mode_0_interrupt_enabled,
        };

        if enabled {
            log::trace!("STAT interrupt from {source:?} at line {}", self.registers.scanline);
            bus.request_interrupt(InterruptType::LcdStatus);
        }
    }

    fn reset_to_line_zero(&mut self, mode: PpuMode) {
        self.registers.scanline = 0;
        self.registers.mode = mode;
        self.registers.lyc_match = false;
        self.oam_scan.reset();
        self.line_state = LineState::new();
        self.pipeline = PixelPipeline::new();
    }

    fn enable_lcd(&mut self) {
        log::debug!("LCD enabled");

        self.reset_to_line_zero(PpuMode::ScanningOam);
        self.latch_window_trigger();

        // No interrupt here; the first compare that can raise one is at the end of line 0
        self.registers.lyc_match = self.registers.scanline == self.registers.ly_compare;
    }

    fn disable_lcd(&mut self) {
        log::debug!("LCD disabled");

        self.reset_to_line_zero(PpuMode::HBlank);

        // A disabled LCD shows a blank screen
        self.frame_buffer.fill(BACKDROP_SAMPLE);
    }

    #[must_use]
    pub fn frame_buffer(&self) -> &PpuFrameBuffer {
        &self.frame_buffer
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.registers.lcd_enabled
    }

    #[must_use]
    pub fn mode(&self) -> PpuMode {
        self.registers.mode
    }

    #[must_use]
    pub fn ly(&self) -> u8 {
        self.registers.scanline
    }

    /// Dots elapsed in the current line
    #[must_use]
    pub fn line_dot(&self) -> u16 {
        self.line_state.dot
    }

    #[must_use]
    pub fn window_line(&self) -> u8 {
        self.line_state.window_line
    }

    /// Sprites selected by the most recent OAM scan, in fetch order once mode 3 has started
    #[must_use]
    pub fn selected_sprites(&self) -> &[SpriteAttribute] {
        self.oam_scan.selected()
    }

    #[must_use]
    pub fn fetch_phase(&self) -> FetchPhase {
        self.pipeline.phase()
    }

    #[must_use]
    pub fn read_register(&self, address: u16) -> u8 {
        match address & 0xFF {
            0x40 => self.registers.read_lcdc(),
            0x41 => self.registers.read_stat(),
            0x42 => self.registers.bg_y_scroll,
            0x43 => self.registers.bg_x_scroll,
            // LY: Line number
            0x44 => self.registers.scanline,
            0x45 => self.registers.ly_compare,
            0x47 => self.registers.bg_palette,
            0x48 => self.registers.sprite_palettes[0],
            0x49 => self.registers.sprite_palettes[1],
            0x4A => self.registers.window_y,
            0x4B => self.registers.window_x,
            _ => {
                log::warn!("PPU register read {address:04X}");
                0xFF
            }
        }
    }

    pub fn write_register(&mut self, address: u16, value: u8) {
        match address & 0xFF {
            0x40 => {
                let was_enabled = self.registers.lcd_enabled;
                self.registers.write_lcdc(value);

                match (was_enabled, self.registers.lcd_enabled) {
                    (false, true) => self.enable_lcd(),
                    (true, false) => self.disable_lcd(),
                    _ => {}
                }
            }
            0x41 => self.registers.write_stat(value),
            0x42 => self.registers.write_scy(value),
            0x43 => self.registers.write_scx(value),
            // LY, not writable
            0x44 => {}
            0x45 => self.registers.write_lyc(value),
            0x47 => self.registers.write_bgp(value),
            0x48 => self.registers.write_obp0(value),
            0x49 => self.registers.write_obp1(value),
            0x4A => self.registers.write_wy(value),
            0x4B => self.registers.write_wx(value),
            _ => log::warn!("PPU register write {address:04X} {value:02X}"),
        }
    }

    /// Serialize the full PPU state. The encoding is fixed-size with no length prefixes.
    ///
    /// # Errors
    ///
    /// Returns an error if bincode fails to encode the state.
    pub fn save_state(&self) -> Result<Vec<u8>, SaveStateError> {
        serialize::save_state(self)
    }

    /// Restore a PPU from bytes produced by [`Ppu::save_state`].
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is truncated, has trailing bytes, or contains values that
    /// could not have been produced by a running PPU.
    pub fn load_state(bytes: &[u8]) -> Result<Self, SaveStateError> {
        let ppu: Self = serialize::load_state(bytes)?;
        ppu.validate()?;
        Ok(ppu)
    }

    pub(crate) fn validate(&self) -> Result<(), SaveStateError> {
        let registers = &self.registers;

        check_field("LY", registers.scanline.into(), registers.scanline < LINES_PER_FRAME)?;
        for (name, addr) in [
            ("BG tile map", registers.bg_tile_map_addr),
            ("window tile map", registers.window_tile_map_addr),
        ] {
            check_field(
                name,
                addr.into(),
                addr == registers::TILE_MAP_AREA_0 || addr == registers::TILE_MAP_AREA_1,
            )?;
        }

        let dot_limit = match registers.mode {
            PpuMode::ScanningOam => OAM_SCAN_DOTS,
            _ => DOTS_PER_LINE,
        };
        check_field("line dot", self.line_state.dot.into(), self.line_state.dot < dot_limit)?;

        let visible_line = registers.scanline < SCREEN_HEIGHT as u8;
        let mode_valid = match registers.mode {
            PpuMode::VBlank => !visible_line,
            PpuMode::ScanningOam | PpuMode::Rendering => visible_line,
            PpuMode::HBlank => visible_line || !registers.lcd_enabled,
        };
        check_field("mode", registers.mode.to_bits().into(), mode_valid)?;

        check_field(
            "OAM scan state",
            self.oam_scan.selected().len() as u64,
            self.oam_scan.state_valid(),
        )?;
        check_field("pipeline state", self.pipeline.fetch_x().into(), self.pipeline.state_valid())?;

        Ok(())
    }
}

fn check_field(field: &'static str, value: u64, valid: bool) -> Result<(), SaveStateError> {
    if valid { Ok(()) } else { Err(SaveStateError::InvalidField { field, value }) }
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}
