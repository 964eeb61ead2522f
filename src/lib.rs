//! A CHIP-8 virtual machine.
//!
//! [`Chip8`] owns the whole machine: memory, registers, call stack, timers,
//! keypad and framebuffer. A host loads a ROM, calls [`Chip8::cycle`] a few
//! hundred times per second and [`Chip8::tick_timers`] at 60Hz, feeds key
//! presses in, and draws [`Chip8::display`] whenever it changes.
//!
//! ```
//! let mut chip8 = chipvm::Chip8::new();
//! chip8.load_rom(&[0x60, 0x05, 0x70, 0x01, 0x12, 0x00])?;
//! for _ in 0..3 {
//!     chip8.cycle()?;
//! }
//! assert_eq!(chip8.registers()[0], 6);
//! # Ok::<(), chipvm::Error>(())
//! ```

pub mod chip8;
mod error;

pub use crate::chip8::instruction::Instruction;
pub use crate::chip8::{
    Chip8, KeyWait, TimerStatus, DISPLAY_HEIGHT, DISPLAY_WIDTH, FONT_START, KEY_COUNT,
    MAX_ROM_SIZE, MEMORY_SIZE, PIXEL_OFF, PIXEL_ON, ROM_START,
};
pub use crate::error::{Error, Result};
