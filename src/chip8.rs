use std::fs;
use std::path::Path;

use log::{debug, info, trace, warn};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};

pub mod instruction;
mod ops;

use self::instruction::Instruction;

pub const MEMORY_SIZE: usize = 0x1000;
pub const FONT_START: u16 = 0x50;
pub const ROM_START: u16 = 0x200;
/// Largest ROM that fits between `ROM_START` and the end of memory.
pub const MAX_ROM_SIZE: usize = MEMORY_SIZE - ROM_START as usize;
pub const STACK_SIZE: usize = 0x10;
pub const KEY_COUNT: usize = 0x10;

pub const DISPLAY_WIDTH: usize = 64;
pub const DISPLAY_HEIGHT: usize = 32;

pub const PIXEL_ON: u8 = 0xFF;
pub const PIXEL_OFF: u8 = 0x00;

/// Bytes per glyph in the built-in font.
const GLYPH_SIZE: u16 = 5;
/// Memory accesses through `I` are confined to 12 bits.
const ADDRESS_MASK: u16 = 0x0FFF;

const SPRITES: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

/// Progress of the `Fx0A` (wait for key) instruction.
///
/// A key only counts once it has been pressed and then released again, so the
/// machine remembers which key went down while it keeps re-running `Fx0A`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyWait {
    #[default]
    Idle,
    AwaitingRelease { register: usize, key: u8 },
}

/// Which timers are still running after a call to [`Chip8::tick_timers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimerStatus {
    pub delay: bool,
    /// The host should keep its tone playing while this is set.
    pub sound: bool,
}

impl TimerStatus {
    pub fn any(&self) -> bool {
        self.delay || self.sound
    }
}

/// The CHIP-8 virtual machine.
///
/// All machine state lives here and is only changed through [`Chip8::cycle`],
/// [`Chip8::tick_timers`], the key methods, and the loaders. The random source
/// used by `Cxkk` is a type parameter so tests can run with a fixed seed.
pub struct Chip8<R: Rng = SmallRng> {
    stack_pointer: usize,
    stack: [u16; STACK_SIZE],

    memory: [u8; MEMORY_SIZE],

    registers: [u8; 0x10],
    index: u16,
    program_counter: u16,
    delay_timer: u8,
    sound_timer: u8,

    keypad: [bool; KEY_COUNT],
    key_wait: KeyWait,

    display: [u8; DISPLAY_WIDTH * DISPLAY_HEIGHT],
    display_changed: bool,

    rng: R,
}

impl Chip8<SmallRng> {
    pub fn new() -> Self {
        Self::with_rng(SmallRng::from_entropy())
    }

    /// Creates a machine whose `Cxkk` results are reproducible.
    pub fn from_seed(seed: u64) -> Self {
        Self::with_rng(SmallRng::seed_from_u64(seed))
    }
}

impl Default for Chip8<SmallRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> Chip8<R> {
    pub fn with_rng(rng: R) -> Self {
        let mut chip8 = Self {
            stack_pointer: 0,
            stack: [0; STACK_SIZE],

            memory: [0; MEMORY_SIZE],

            registers: [0; 0x10],
            index: 0,
            program_counter: ROM_START,
            delay_timer: 0,
            sound_timer: 0,

            keypad: [false; KEY_COUNT],
            key_wait: KeyWait::Idle,

            display: [PIXEL_OFF; DISPLAY_WIDTH * DISPLAY_HEIGHT],
            display_changed: false,

            rng,
        };
        chip8.reset();
        chip8
    }

    /// Zeroes every part of the machine and puts the font back at `FONT_START`.
    ///
    /// The program counter is left at `ROM_START`, ready for a ROM to be copied
    /// in. The blank framebuffer is reported as changed so the host redraws it.
    pub fn reset(&mut self) {
        self.stack_pointer = 0;
        self.stack = [0; STACK_SIZE];

        self.memory = [0; MEMORY_SIZE];
        let font = FONT_START as usize;
        self.memory[font..font + SPRITES.len()].copy_from_slice(&SPRITES);

        self.registers = [0; 0x10];
        self.index = 0;
        self.program_counter = ROM_START;
        self.delay_timer = 0;
        self.sound_timer = 0;

        self.keypad = [false; KEY_COUNT];
        self.key_wait = KeyWait::Idle;

        self.display = [PIXEL_OFF; DISPLAY_WIDTH * DISPLAY_HEIGHT];
        self.display_changed = true;

        debug!("machine reset");
    }

    /// Resets the machine and copies `rom` into memory at `ROM_START`.
    ///
    /// A ROM larger than [`MAX_ROM_SIZE`] is rejected, and the machine is left
    /// in its reset state.
    pub fn load_rom(&mut self, rom: &[u8]) -> Result<()> {
        self.reset();

        if rom.len() > MAX_ROM_SIZE {
            return Err(Error::ImageTooLarge {
                size: rom.len(),
                max: MAX_ROM_SIZE,
            });
        }

        let start = ROM_START as usize;
        self.memory[start..start + rom.len()].copy_from_slice(rom);

        info!("loaded {} byte ROM at {:#05X}", rom.len(), ROM_START);
        Ok(())
    }

    /// Resets the machine, reads the ROM at `path` and loads it.
    pub fn load_rom_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.reset();

        let path = path.as_ref();
        let rom = fs::read(path).map_err(|source| Error::SourceUnreadable {
            path: path.to_path_buf(),
            source,
        })?;

        self.load_rom(&rom)
    }

    /// Executes a single instruction.
    ///
    /// The program counter is moved past the instruction before it runs, so
    /// jumps, calls and skips simply overwrite it. On a fatal error the program
    /// counter is put back on the faulting instruction.
    pub fn cycle(&mut self) -> Result<()> {
        let pc = self.program_counter;
        let opcode = self.fetch()?;

        self.program_counter += 2;

        let instruction = Instruction::decode(opcode);
        trace!("{:03X}: {:04X} {:?}", pc, opcode, instruction);

        match self.execute(instruction) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.program_counter = pc;
                Err(err)
            }
        }
    }

    /// Decrements both timers, stopping at zero. Expected to be called at 60Hz
    /// regardless of how fast instructions are executed.
    pub fn tick_timers(&mut self) -> TimerStatus {
        if self.delay_timer > 0 {
            self.delay_timer -= 1;
        }

        if self.sound_timer > 0 {
            self.sound_timer -= 1;
        }

        TimerStatus {
            delay: self.delay_timer > 0,
            sound: self.sound_timer > 0,
        }
    }

    pub fn press_key(&mut self, key: u8) {
        self.set_key(key, true);
    }

    pub fn release_key(&mut self, key: u8) {
        self.set_key(key, false);
    }

    fn set_key(&mut self, key: u8, pressed: bool) {
        match self.keypad.get_mut(key as usize) {
            Some(state) => *state = pressed,
            None => warn!("ignoring input for unknown key {:#X}", key),
        }
    }

    pub fn is_key_pressed(&self, key: u8) -> bool {
        self.keypad.get(key as usize).copied().unwrap_or(false)
    }

    /// The 64x32 framebuffer, row-major, one byte per pixel.
    pub fn display(&self) -> &[u8] {
        &self.display
    }

    /// Returns whether the framebuffer changed since the last call, and clears
    /// the flag.
    pub fn take_display_changed(&mut self) -> bool {
        std::mem::take(&mut self.display_changed)
    }

    pub fn registers(&self) -> &[u8; 0x10] {
        &self.registers
    }

    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn program_counter(&self) -> u16 {
        self.program_counter
    }

    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    /// Return addresses of the subroutines currently being executed, innermost
    /// last.
    pub fn call_stack(&self) -> &[u16] {
        &self.stack[..self.stack_pointer]
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay_timer
    }

    pub fn sound_timer(&self) -> u8 {
        self.sound_timer
    }

    pub fn sound_active(&self) -> bool {
        self.sound_timer > 0
    }

    pub fn key_wait(&self) -> KeyWait {
        self.key_wait
    }

    /// Reads the big-endian instruction word at the program counter.
    fn fetch(&self) -> Result<u16> {
        let pc = self.program_counter as usize;
        if pc + 1 >= MEMORY_SIZE {
            return Err(Error::PcOutOfRange {
                pc: self.program_counter,
            });
        }

        Ok(u16::from_be_bytes([self.memory[pc], self.memory[pc + 1]]))
    }

    fn read_byte(&self, addr: u16) -> u8 {
        self.memory[(addr & ADDRESS_MASK) as usize]
    }

    fn write_byte(&mut self, addr: u16, value: u8) {
        self.memory[(addr & ADDRESS_MASK) as usize] = value;
    }

    /// Returns a random number between 0 and 255.
    fn random_byte(&mut self) -> u8 {
        self.rng.gen()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(rom: &[u8]) -> Chip8 {
        let mut chip8 = Chip8::from_seed(310349960114);
        chip8.load_rom(rom).unwrap();
        chip8
    }

    #[test]
    fn test_reset_places_font() {
        let chip8 = Chip8::from_seed(1);
        let font = FONT_START as usize;
        assert_eq!(&chip8.memory[font..font + 80], &SPRITES[..]);
        assert_eq!(chip8.program_counter, ROM_START);
        assert!(chip8.memory[..font].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_load_rom_copies_bytes() {
        let rom = [0x12, 0x34, 0x56];
        let chip8 = setup(&rom);
        assert_eq!(&chip8.memory[0x200..0x203], &rom);
        assert!(chip8.memory[0x203..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_load_rom_accepts_max_size() {
        let rom = vec![0xAB; MAX_ROM_SIZE];
        let chip8 = setup(&rom);
        assert_eq!(chip8.memory[MEMORY_SIZE - 1], 0xAB);
    }

    #[test]
    fn test_load_rom_too_large_leaves_reset_state() {
        let mut chip8 = setup(&[0x60, 0x05]);
        chip8.cycle().unwrap();
        chip8.delay_timer = 9;
        chip8.key_wait = KeyWait::AwaitingRelease { register: 1, key: 2 };

        let err = chip8.load_rom(&vec![0; MAX_ROM_SIZE + 1]).unwrap_err();

        assert!(matches!(
            err,
            Error::ImageTooLarge {
                size: 3585,
                max: 3584
            }
        ));
        assert_eq!(chip8.registers, [0; 0x10]);
        assert_eq!(chip8.program_counter, ROM_START);
        assert_eq!(chip8.delay_timer, 0);
        assert_eq!(chip8.key_wait, KeyWait::Idle);
        assert_eq!(chip8.memory[0x200], 0);
    }

    #[test]
    fn test_load_rom_file_missing() {
        let mut chip8 = setup(&[0x60, 0x05]);
        chip8.registers[3] = 7;

        let err = chip8
            .load_rom_file("/definitely/not/a/real/rom.ch8")
            .unwrap_err();

        assert!(matches!(err, Error::SourceUnreadable { .. }));
        assert_eq!(chip8.registers[3], 0);
    }

    #[test]
    fn test_timers_1() {
        let mut chip8 = setup(&[0x1F, 0xFF]);
        chip8.delay_timer = 10;
        chip8.sound_timer = 18;

        let status = chip8.tick_timers();

        assert_eq!(chip8.delay_timer, 9);
        assert_eq!(chip8.sound_timer, 17);
        assert_eq!(
            status,
            TimerStatus {
                delay: true,
                sound: true
            }
        );
    }

    #[test]
    fn test_timers_2() {
        let mut chip8 = setup(&[0x1F, 0xFF]);

        let status = chip8.tick_timers();

        assert_eq!(chip8.delay_timer, 0);
        assert_eq!(chip8.sound_timer, 0);
        assert!(!status.any());
    }

    #[test]
    fn test_timers_report_expiry() {
        let mut chip8 = setup(&[0x1F, 0xFF]);
        chip8.delay_timer = 3;
        chip8.sound_timer = 1;

        let status = chip8.tick_timers();

        assert!(status.delay);
        assert!(!status.sound);
        assert!(!chip8.sound_active());
    }

    #[test]
    fn test_fetch_past_memory_is_fatal() {
        let mut chip8 = setup(&[]);
        chip8.program_counter = 0xFFF;

        let err = chip8.cycle().unwrap_err();

        assert!(matches!(err, Error::PcOutOfRange { pc: 0xFFF }));
        assert!(err.is_fatal());
        assert_eq!(chip8.program_counter, 0xFFF);
    }

    #[test]
    fn test_fetch_last_word() {
        let mut chip8 = setup(&[]);
        chip8.program_counter = 0xFFE;
        chip8.memory[0xFFE] = 0x61;
        chip8.memory[0xFFF] = 0x42;

        chip8.cycle().unwrap();

        assert_eq!(chip8.registers[1], 0x42);
        assert_eq!(chip8.program_counter, 0x1000);
    }

    #[test]
    fn test_keys_out_of_range_are_ignored() {
        let mut chip8 = setup(&[]);
        chip8.press_key(0x10);
        assert!(chip8.keypad.iter().all(|&k| !k));
        assert!(!chip8.is_key_pressed(0x10));

        chip8.press_key(0xF);
        assert!(chip8.is_key_pressed(0xF));
        chip8.release_key(0xF);
        assert!(!chip8.is_key_pressed(0xF));
    }

    #[test]
    fn test_take_display_changed_clears_flag() {
        let mut chip8 = setup(&[0x00, 0xE0]);
        assert!(chip8.take_display_changed());
        assert!(!chip8.take_display_changed());

        chip8.cycle().unwrap();

        assert!(chip8.take_display_changed());
        assert!(!chip8.take_display_changed());
    }

    #[test]
    fn test_reload_blanks_display_and_flags_redraw() {
        // LD F V0 ; DRW V0 V0 5
        let rom = [0xF0, 0x29, 0xD0, 0x05];
        let mut chip8 = setup(&rom);
        chip8.cycle().unwrap();
        chip8.cycle().unwrap();
        assert!(chip8.display.iter().any(|&p| p == PIXEL_ON));
        assert!(chip8.take_display_changed());

        chip8.load_rom(&rom).unwrap();

        assert!(chip8.display.iter().all(|&p| p == PIXEL_OFF));
        assert!(chip8.take_display_changed());
    }
}
