//! VRAM and OAM storage for the headless system

use bincode::{Decode, Encode};

pub const VRAM_LEN: usize = 8 * 1024;
pub const OAM_LEN: usize = 160;

type Vram = [u8; VRAM_LEN];
type Oam = [u8; OAM_LEN];

#[derive(Debug, Clone, Encode, Decode)]
pub struct Memory {
    vram: Box<Vram>,
    oam: Box<Oam>,
}

impl Memory {
    #[must_use]
    pub fn new() -> Self {
        Self { vram: Box::new([0; VRAM_LEN]), oam: Box::new([0; OAM_LEN]) }
    }

    #[must_use]
    pub fn read_vram(&self, address: u16) -> u8 {
        self.vram[(address & 0x1FFF) as usize]
    }

    pub fn write_vram(&mut self, address: u16, value: u8) {
        self.vram[(address & 0x1FFF) as usize] = value;
    }

    #[must_use]
    pub fn read_oam(&self, address: u16) -> u8 {
        // $FEA0-$FEFF is unusable and reads $FF on DMG
        self.oam.get((address & 0xFF) as usize).copied().unwrap_or(0xFF)
    }

    pub fn write_oam(&mut self, address: u16, value: u8) {
        if let Some(byte) = self.oam.get_mut((address & 0xFF) as usize) {
            *byte = value;
        }
    }

    /// Copy a raw dump into VRAM starting at `$8000`. Bytes past the end of VRAM are ignored.
    pub fn load_vram(&mut self, bytes: &[u8]) {
        let len = bytes.len().min(VRAM_LEN);
        self.vram[..len].copy_from_slice(&bytes[..len]);
        if bytes.len() > VRAM_LEN {
            log::warn!("VRAM dump is {} bytes, ignoring everything past {VRAM_LEN}", bytes.len());
        }
    }

    /// Copy a raw dump into OAM starting at `$FE00`. Bytes past the end of OAM are ignored.
    pub fn load_oam(&mut self, bytes: &[u8]) {
        let len = bytes.len().min(OAM_LEN);
        self.oam[..len].copy_from_slice(&bytes[..len]);
        if bytes.len() > OAM_LEN {
            log::warn!("OAM dump is {} bytes, ignoring everything past {OAM_LEN}", bytes.len());
        }
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vram_mirrors_on_address_mask() {
        let mut memory = Memory::new();
        memory.write_vram(0x9800, 0x42);
        assert_eq!(memory.read_vram(0x9800), 0x42);
        assert_eq!(memory.read_vram(0x1800), 0x42);
    }

    #[test]
    fn unusable_oam_area_reads_ff() {
        let mut memory = Memory::new();
        memory.write_oam(0xFEA0, 0x12);
        assert_eq!(memory.read_oam(0xFEA0), 0xFF);

        memory.write_oam(0xFE9F, 0x34);
        assert_eq!(memory.read_oam(0xFE9F), 0x34);
    }

    #[test]
    fn oversized_dumps_are_truncated() {
        let mut memory = Memory::new();
        memory.load_vram(&vec![0xAA; VRAM_LEN + 16]);
        assert_eq!(memory.read_vram(0x9FFF), 0xAA);

        memory.load_oam(&[1, 2, 3]);
        assert_eq!(memory.read_oam(0xFE02), 3);
        assert_eq!(memory.read_oam(0xFE03), 0);
    }
}
