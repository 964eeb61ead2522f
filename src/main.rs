use std::path::PathBuf;

use anyhow::{Context, Result};
use chipvm::Chip8;
use clap::Parser;
use env_logger::Env;

use crate::platform::{Config, Platform};

mod platform;

/// CHIP-8 virtual machine
///
/// Keypad: 1234 / QWER / ASDF / ZXCV. F5 reloads the ROM, Escape quits.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the CHIP-8 ROM to run
    #[arg(index = 1)]
    rom: PathBuf,

    /// Display scaling factor
    #[arg(short, long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..=100))]
    scale: u32,

    /// Instructions per second
    #[arg(short, long, default_value_t = 700, value_parser = clap::value_parser!(u32).range(1..=5000))]
    ips: u32,

    /// Seed for the random number instruction
    #[arg(long)]
    seed: Option<u64>,

    /// Disable the sound timer tone
    #[arg(short, long)]
    mute: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut chip8 = match args.seed {
        Some(seed) => Chip8::from_seed(seed),
        None => Chip8::new(),
    };
    chip8
        .load_rom_file(&args.rom)
        .with_context(|| format!("failed to load {}", args.rom.display()))?;

    let config = Config {
        rom: args.rom,
        scale: args.scale,
        ips: args.ips,
        mute: args.mute,
    };

    let mut platform = Platform::new(chip8, config)?;
    platform.run()
}
