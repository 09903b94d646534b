//! Game Boy interrupt registers (IF / IE)
//!
//! Only the two PPU sources are raised here. The remaining IF/IE bits are stored as written so
//! the registers read back like the full hardware registers

use bincode::{Decode, Encode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum InterruptType {
    VBlank,
    LcdStatus,
}

impl InterruptType {
    #[must_use]
    pub fn register_mask(self) -> u8 {
        match self {
            Self::VBlank => 1 << 0,
            Self::LcdStatus => 1 << 1,
        }
    }
}

#[derive(Debug, Clone, Default, Encode, Decode)]
pub struct InterruptRegisters {
    enabled: u8,
    flags: u8,
}

impl InterruptRegisters {
    #[must_use]
    pub fn read_ie(&self) -> u8 {
        self.enabled | 0xE0
    }

    pub fn write_ie(&mut self, value: u8) {
        self.enabled = value & 0x1F;
    }

    #[must_use]
    pub fn read_if(&self) -> u8 {
        self.flags | 0xE0
    }

    pub fn write_if(&mut self, value: u8) {
        self.flags = value & 0x1F;
    }

    pub fn set_flag(&mut self, interrupt_type: InterruptType) {
        self.flags |= interrupt_type.register_mask();
    }

    #[must_use]
    pub fn flag_set(&self, interrupt_type: InterruptType) -> bool {
        self.flags & interrupt_type.register_mask() != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unused_bits_read_as_one() {
        let mut registers = InterruptRegisters::default();
        registers.write_if(0xFF);
        assert_eq!(registers.read_if(), 0xFF);

        registers.write_if(0x00);
        assert_eq!(registers.read_if(), 0xE0);
    }

    #[test]
    fn set_flag_keeps_other_bits() {
        let mut registers = InterruptRegisters::default();
        registers.write_if(0x14);
        registers.set_flag(InterruptType::LcdStatus);
        assert_eq!(registers.read_if(), 0xF6);
        assert!(registers.flag_set(InterruptType::LcdStatus));
        assert!(!registers.flag_set(InterruptType::VBlank));

        registers.set_flag(InterruptType::VBlank);
        assert_eq!(registers.read_if(), 0xF7);
    }
}
