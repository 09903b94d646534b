//! Headless system that drives the PPU and hands finished frames to a presenter

use crate::bus::PpuBus;
use crate::interrupts::{InterruptRegisters, InterruptType};
use crate::memory::Memory;
use crate::ppu::{FRAME_BUFFER_LEN, Ppu};
use crate::serialize::{self, SaveStateError};
use bincode::{Decode, Encode};
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickEffect {
    None,
    FrameRendered,
}

/// The display side. Receives one complete frame of palette-mapped samples each VBlank.
pub trait FramePresenter {
    type Err;

    /// Present a frame.
    ///
    /// # Errors
    ///
    /// This method will return an error if it is unable to present the frame.
    fn present_frame(&mut self, frame_buffer: &[u8; FRAME_BUFFER_LEN]) -> Result<(), Self::Err>;
}

#[derive(Debug, Error)]
pub enum PpuError<PErr> {
    #[error("Error presenting a frame: {0}")]
    Presentation(PErr),
}

#[derive(Debug, Error)]
#[error("Shared frame buffer lock was poisoned")]
pub struct PoisonedFrameBuffer;

/// Presenter that copies each frame into a buffer shared with another thread
#[derive(Debug, Clone)]
pub struct SharedFrameBuffer(Arc<Mutex<Box<[u8; FRAME_BUFFER_LEN]>>>);

impl SharedFrameBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(Box::new([0xFF; FRAME_BUFFER_LEN]))))
    }

    /// Copy out the most recently presented frame.
    ///
    /// # Errors
    ///
    /// Returns an error if a thread panicked while holding the lock.
    pub fn snapshot(&self) -> Result<Box<[u8; FRAME_BUFFER_LEN]>, PoisonedFrameBuffer> {
        let frame = self.0.lock().map_err(|_| PoisonedFrameBuffer)?;
        Ok(frame.clone())
    }
}

impl Default for SharedFrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FramePresenter for SharedFrameBuffer {
    type Err = PoisonedFrameBuffer;

    fn present_frame(&mut self, frame_buffer: &[u8; FRAME_BUFFER_LEN]) -> Result<(), Self::Err> {
        let mut shared = self.0.lock().map_err(|_| PoisonedFrameBuffer)?;
        shared.copy_from_slice(frame_buffer);
        Ok(())
    }
}

struct Bus<'a> {
    memory: &'a Memory,
    interrupt_registers: &'a mut InterruptRegisters,
}

impl PpuBus for Bus<'_> {
    fn read_vram(&self, address: u16) -> u8 {
        self.memory.read_vram(address)
    }

    fn read_oam(&self, address: u16) -> u8 {
        self.memory.read_oam(address)
    }

    fn request_interrupt(&mut self, interrupt_type: InterruptType) {
        self.interrupt_registers.set_flag(interrupt_type);
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct GameBoyPpuSystem {
    ppu: Ppu,
    memory: Memory,
    interrupt_registers: InterruptRegisters,
}

impl GameBoyPpuSystem {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ppu: Ppu::new(),
            memory: Memory::new(),
            interrupt_registers: InterruptRegisters::default(),
        }
    }

    #[must_use]
    pub fn ppu(&self) -> &Ppu {
        &self.ppu
    }

    #[must_use]
    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    #[must_use]
    pub fn interrupt_registers(&self) -> &InterruptRegisters {
        &self.interrupt_registers
    }

    /// Replace the PPU, e.g. with one restored from [`Ppu::load_state`]
    pub fn replace_ppu(&mut self, ppu: Ppu) {
        self.ppu = ppu;
    }

    #[must_use]
    pub fn read_address(&self, address: u16) -> u8 {
        match address {
            0x8000..=0x9FFF => self.memory.read_vram(address),
            0xFE00..=0xFE9F => self.memory.read_oam(address),
            0xFF0F => self.interrupt_registers.read_if(),
            0xFF40..=0xFF45 | 0xFF47..=0xFF4B => self.ppu.read_register(address),
            0xFFFF => self.interrupt_registers.read_ie(),
            _ => {
                log::debug!("Unmapped read: {address:04X}");
                0xFF
            }
        }
    }

    pub fn write_address(&mut self, address: u16, value: u8) {
        match address {
            0x8000..=0x9FFF => self.memory.write_vram(address, value),
            0xFE00..=0xFE9F => self.memory.write_oam(address, value),
            0xFF0F => self.interrupt_registers.write_if(value),
            0xFF40..=0xFF45 | 0xFF47..=0xFF4B => self.ppu.write_register(address, value),
            0xFFFF => self.interrupt_registers.write_ie(value),
            _ => log::debug!("Unmapped write: {address:04X} {value:02X}"),
        }
    }

    /// Advance the PPU by one M-cycle, presenting the frame if one completed.
    ///
    /// # Errors
    ///
    /// Propagates any error returned by the presenter.
    pub fn tick<P: FramePresenter>(
        &mut self,
        presenter: &mut P,
    ) -> Result<TickEffect, PpuError<P::Err>> {
        let frame_ready = self.ppu.tick(
            1,
            &mut Bus { memory: &self.memory, interrupt_registers: &mut self.interrupt_registers },
        );

        match frame_ready {
            Some(_) => {
                presenter.present_frame(self.ppu.frame_buffer()).map_err(PpuError::Presentation)?;
                Ok(TickEffect::FrameRendered)
            }
            None => Ok(TickEffect::None),
        }
    }

    /// Tick until the PPU finishes a frame. With the LCD off the PPU never reaches VBlank, so the
    /// current (blank) frame is presented immediately.
    ///
    /// # Errors
    ///
    /// Propagates any error returned by the presenter.
    pub fn run_frame<P: FramePresenter>(
        &mut self,
        presenter: &mut P,
    ) -> Result<(), PpuError<P::Err>> {
        if !self.ppu.enabled() {
            return presenter.present_frame(self.ppu.frame_buffer()).map_err(PpuError::Presentation);
        }

        while self.tick(presenter)? != TickEffect::FrameRendered {}

        Ok(())
    }

    /// Serialize the PPU, memory and interrupt registers.
    ///
    /// # Errors
    ///
    /// Returns an error if bincode fails to encode the state.
    pub fn save_state(&self) -> Result<Vec<u8>, SaveStateError> {
        serialize::save_state(self)
    }

    /// Restore a system from bytes produced by [`GameBoyPpuSystem::save_state`].
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes do not decode to a valid system state.
    pub fn load_state(bytes: &[u8]) -> Result<Self, SaveStateError> {
        let system: Self = serialize::load_state(bytes)?;
        system.ppu.validate()?;
        Ok(system)
    }
}

impl Default for GameBoyPpuSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ppu::PpuMode;
    use std::convert::Infallible;
    use test_log::test;

    #[derive(Default)]
    struct CountingPresenter {
        frames: Vec<Box<[u8; FRAME_BUFFER_LEN]>>,
    }

    impl FramePresenter for CountingPresenter {
        type Err = Infallible;

        fn present_frame(
            &mut self,
            frame_buffer: &[u8; FRAME_BUFFER_LEN],
        ) -> Result<(), Self::Err> {
            self.frames.push(Box::new(*frame_buffer));
            Ok(())
        }
    }

    struct FailingPresenter;

    impl FramePresenter for FailingPresenter {
        type Err = &'static str;

        fn present_frame(&mut self, _: &[u8; FRAME_BUFFER_LEN]) -> Result<(), Self::Err> {
            Err("display gone")
        }
    }

    #[test]
    fn run_frame_with_lcd_off_presents_blank_frame() {
        let mut system = GameBoyPpuSystem::new();
        let mut presenter = CountingPresenter::default();
        system.run_frame(&mut presenter).unwrap();

        assert_eq!(presenter.frames.len(), 1);
        assert!(presenter.frames[0].iter().all(|&sample| sample == 0xFF));
    }

    #[test]
    fn run_frame_stops_at_vblank() {
        let mut system = GameBoyPpuSystem::new();
        system.write_address(0xFF40, 0x91);

        let mut presenter = CountingPresenter::default();
        system.run_frame(&mut presenter).unwrap();
        assert_eq!(presenter.frames.len(), 1);
        assert_eq!(system.ppu().ly(), 144);
        assert_eq!(system.ppu().mode(), PpuMode::VBlank);
        assert!(system.interrupt_registers().flag_set(InterruptType::VBlank));

        system.run_frame(&mut presenter).unwrap();
        assert_eq!(presenter.frames.len(), 2);
    }

    #[test]
    fn presenter_errors_propagate() {
        let mut system = GameBoyPpuSystem::new();
        let result = system.run_frame(&mut FailingPresenter);
        assert!(matches!(result, Err(PpuError::Presentation("display gone"))));
    }

    #[test]
    fn shared_frame_buffer_copies_frame() {
        let mut system = GameBoyPpuSystem::new();
        system.write_address(0xFF47, 0xFF);
        // BG tile 0 at $9000 (signed addressing), all pixels color 3
        for address in 0x9000..0x9010 {
            system.write_address(address, 0xFF);
        }
        system.write_address(0xFF40, 0x81);

        let shared = SharedFrameBuffer::new();
        let reader = shared.clone();
        let mut presenter = shared;
        system.run_frame(&mut presenter).unwrap();

        let frame = std::thread::spawn(move || reader.snapshot().unwrap()).join().unwrap();
        assert!(frame.iter().all(|&sample| sample == 0x00));
    }

    #[test]
    fn memory_map_routes_registers() {
        let mut system = GameBoyPpuSystem::new();
        system.write_address(0x8123, 0x45);
        system.write_address(0xFE10, 0x67);
        system.write_address(0xFF42, 0x89);
        system.write_address(0xFFFF, 0x03);

        assert_eq!(system.read_address(0x8123), 0x45);
        assert_eq!(system.read_address(0xFE10), 0x67);
        assert_eq!(system.read_address(0xFF42), 0x89);
        assert_eq!(system.read_address(0xFFFF), 0xE3);
        assert_eq!(system.read_address(0xFF0F), 0xE0);
        assert_eq!(system.read_address(0xFF41), 0x80);
        assert_eq!(system.read_address(0xC000), 0xFF);
    }

    #[test]
    fn system_state_round_trips() {
        let mut system = GameBoyPpuSystem::new();
        system.write_address(0x8000, 0x3C);
        system.write_address(0xFF40, 0x91);
        for _ in 0..1000 {
            system.tick(&mut CountingPresenter::default()).unwrap();
        }

        let bytes = system.save_state().unwrap();
        let mut restored = GameBoyPpuSystem::load_state(&bytes).unwrap();
        assert_eq!(restored.read_address(0x8000), 0x3C);
        assert_eq!(restored.ppu().ly(), system.ppu().ly());
        assert_eq!(restored.ppu().line_dot(), system.ppu().line_dot());

        let mut expected = CountingPresenter::default();
        let mut actual = CountingPresenter::default();
        system.run_frame(&mut expected).unwrap();
        restored.run_frame(&mut actual).unwrap();
        assert_eq!(expected.frames, actual.frames);
    }
}
