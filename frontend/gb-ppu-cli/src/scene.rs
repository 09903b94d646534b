//! TOML scene files: register values plus raw VRAM/OAM dumps

use anyhow::Context;
use gb_ppu::GameBoyPpuSystem;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Register values written before the first frame. Anything not listed keeps its DMG post-boot
/// value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SceneRegisters {
    #[serde(default = "default_lcdc")]
    pub lcdc: u8,
    #[serde(default)]
    pub stat: u8,
    #[serde(default)]
    pub scy: u8,
    #[serde(default)]
    pub scx: u8,
    #[serde(default)]
    pub lyc: u8,
    #[serde(default = "default_bgp")]
    pub bgp: u8,
    #[serde(default = "default_obp")]
    pub obp0: u8,
    #[serde(default = "default_obp")]
    pub obp1: u8,
    #[serde(default)]
    pub wy: u8,
    #[serde(default)]
    pub wx: u8,
}

const fn default_lcdc() -> u8 {
    0x91
}

const fn default_bgp() -> u8 {
    0xFC
}

const fn default_obp() -> u8 {
    0xFF
}

impl Default for SceneRegisters {
    fn default() -> Self {
        Self {
            lcdc: default_lcdc(),
            stat: 0,
            scy: 0,
            scx: 0,
            lyc: 0,
            bgp: default_bgp(),
            obp0: default_obp(),
            obp1: default_obp(),
            wy: 0,
            wx: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct SceneFile {
    vram: PathBuf,
    #[serde(default)]
    oam: Option<PathBuf>,
    #[serde(default)]
    registers: SceneRegisters,
}

#[derive(Debug, Clone)]
pub struct Scene {
    pub registers: SceneRegisters,
    pub vram: Vec<u8>,
    pub oam: Vec<u8>,
}

impl Scene {
    /// Load a scene file. Dump paths are relative to the scene file's directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the scene or either dump can't be read, or if the TOML is invalid.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Unable to read scene file '{}'", path.display()))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

        Self::parse(&contents, base_dir)
    }

    fn parse(contents: &str, base_dir: &Path) -> anyhow::Result<Self> {
        let scene_file: SceneFile = toml::from_str(contents).context("Invalid scene file")?;

        let vram_path = base_dir.join(&scene_file.vram);
        let vram = fs::read(&vram_path)
            .with_context(|| format!("Unable to read VRAM dump '{}'", vram_path.display()))?;

        let oam = match &scene_file.oam {
            Some(oam) => {
                let oam_path = base_dir.join(oam);
                fs::read(&oam_path)
                    .with_context(|| format!("Unable to read OAM dump '{}'", oam_path.display()))?
            }
            None => Vec::new(),
        };

        log::info!(
            "Loaded scene with {} bytes of VRAM and {} bytes of OAM, registers {:02X?}",
            vram.len(),
            oam.len(),
            scene_file.registers
        );

        Ok(Self { registers: scene_file.registers, vram, oam })
    }

    pub fn apply(&self, system: &mut GameBoyPpuSystem) {
        system.memory_mut().load_vram(&self.vram);
        system.memory_mut().load_oam(&self.oam);

        let registers = &self.registers;
        for (address, value) in [
            (0xFF41, registers.stat),
            (0xFF42, registers.scy),
            (0xFF43, registers.scx),
            (0xFF45, registers.lyc),
            (0xFF47, registers.bgp),
            (0xFF48, registers.obp0),
            (0xFF49, registers.obp1),
            (0xFF4A, registers.wy),
            (0xFF4B, registers.wx),
        ] {
            system.write_address(address, value);
        }

        // LCDC last so the LCD turns on with the rest of the registers in place
        system.write_address(0xFF40, registers.lcdc);
    }
}
