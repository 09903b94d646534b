use crate::interrupts::InterruptType;

/// Everything the PPU needs from the rest of the system.
///
/// VRAM and OAM reads are raw accesses with no side effects; the PPU passes full CPU-space
/// addresses (`$8000-$9FFF` and `$FE00-$FE9F`). Access blocking during modes 2 and 3 is left to
/// the implementor's CPU-facing path.
pub trait PpuBus {
    fn read_vram(&self, address: u16) -> u8;

    fn read_oam(&self, address: u16) -> u8;

    // Sets the interrupt's pending bit in the shared IF register
    fn request_interrupt(&mut self, interrupt_type: InterruptType);
}
