mod scene;

use crate::scene::Scene;
use anyhow::{Context, anyhow};
use clap::Parser;
use env_logger::Env;
use gb_ppu::{FRAME_BUFFER_LEN, FramePresenter, GameBoyPpuSystem, Ppu, SCREEN_HEIGHT, SCREEN_WIDTH};
use gb_ppu_config::GbPalette;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
struct Args {
    /// Scene file path (TOML with register values and VRAM/OAM dump paths)
    #[arg(short = 's', long)]
    scene: PathBuf,

    /// Number of frames to render
    #[arg(short = 'n', long, default_value_t = 1)]
    frames: u32,

    /// Directory to write PNG screenshots to
    #[arg(short = 'o', long, default_value = ".")]
    output_dir: PathBuf,

    /// Output palette
    #[arg(long, value_enum, default_value_t)]
    palette: GbPalette,

    /// Restore PPU state from this file after loading the scene
    #[arg(long)]
    load_state: Option<PathBuf>,

    /// Write PPU state to this file after the last frame
    #[arg(long)]
    save_state: Option<PathBuf>,
}

struct PngPresenter {
    output_dir: PathBuf,
    palette: GbPalette,
    frame_count: u32,
}

impl PngPresenter {
    fn new(output_dir: PathBuf, palette: GbPalette) -> Self {
        Self { output_dir, palette, frame_count: 0 }
    }
}

impl FramePresenter for PngPresenter {
    type Err = anyhow::Error;

    fn present_frame(&mut self, frame_buffer: &[u8; FRAME_BUFFER_LEN]) -> Result<(), Self::Err> {
        let rgb: Vec<u8> =
            frame_buffer.iter().flat_map(|&sample| self.palette.sample_to_rgb(sample)).collect();
        let image = image::RgbImage::from_raw(SCREEN_WIDTH as u32, SCREEN_HEIGHT as u32, rgb)
            .ok_or_else(|| anyhow!("Frame buffer does not match screen dimensions"))?;

        let path = self.output_dir.join(format!("frame_{:04}.png", self.frame_count));
        image.save(&path).with_context(|| format!("Unable to write '{}'", path.display()))?;
        self.frame_count += 1;

        log::debug!("Wrote {}", path.display());

        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let scene = Scene::from_file(&args.scene)?;
    let mut system = GameBoyPpuSystem::new();
    scene.apply(&mut system);

    if let Some(path) = &args.load_state {
        let bytes = fs::read(path)
            .with_context(|| format!("Unable to read savestate '{}'", path.display()))?;
        let ppu = Ppu::load_state(&bytes)
            .with_context(|| format!("Invalid savestate '{}'", path.display()))?;
        system.replace_ppu(ppu);
    }

    fs::create_dir_all(&args.output_dir).with_context(|| {
        format!("Unable to create output directory '{}'", args.output_dir.display())
    })?;

    log::info!("Rendering {} frames with palette {}", args.frames, args.palette);

    let mut presenter = PngPresenter::new(args.output_dir.clone(), args.palette);
    for _ in 0..args.frames {
        system.run_frame(&mut presenter)?;
    }

    if let Some(path) = &args.save_state {
        let bytes = system.ppu().save_state()?;
        fs::write(path, bytes)
            .with_context(|| format!("Unable to write savestate '{}'", path.display()))?;
    }

    log::info!("Wrote {} frames to '{}'", presenter.frame_count, args.output_dir.display());

    Ok(())
}
