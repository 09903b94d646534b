//! Dot-accurate Game Boy (DMG) PPU core, plus a minimal headless system that owns VRAM, OAM and
//! the interrupt flag register so the PPU can be driven without a CPU

pub mod api;
pub mod bus;
pub mod interrupts;
pub mod memory;
mod num;
pub mod ppu;
pub mod serialize;

pub use api::{FramePresenter, GameBoyPpuSystem, PpuError, SharedFrameBuffer, TickEffect};
pub use bus::PpuBus;
pub use interrupts::{InterruptRegisters, InterruptType};
pub use ppu::{
    FRAME_BUFFER_LEN, FrameReady, Ppu, PpuFrameBuffer, PpuMode, SCREEN_HEIGHT, SCREEN_WIDTH,
};
pub use serialize::SaveStateError;
