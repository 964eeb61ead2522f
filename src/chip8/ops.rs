use log::debug;
use rand::Rng;

use super::instruction::Instruction;
use super::{
    Chip8, KeyWait, DISPLAY_HEIGHT, DISPLAY_WIDTH, FONT_START, GLYPH_SIZE, PIXEL_OFF, PIXEL_ON,
    STACK_SIZE,
};
use crate::error::{Error, Result};

impl<R: Rng> Chip8<R> {
    /// Runs a decoded instruction. The program counter already points at the
    /// next instruction.
    pub(super) fn execute(&mut self, instruction: Instruction) -> Result<()> {
        match instruction {
            Instruction::Cls => self.op_00e0(),
            Instruction::Ret => self.op_00ee()?,
            Instruction::Sys(_) => {}
            Instruction::Jp(nnn) => self.op_1nnn(nnn),
            Instruction::Call(nnn) => self.op_2nnn(nnn)?,
            Instruction::SeByte { x, kk } => self.op_3xkk(x, kk),
            Instruction::SneByte { x, kk } => self.op_4xkk(x, kk),
            Instruction::SeReg { x, y } => self.op_5xy0(x, y),
            Instruction::LdByte { x, kk } => self.op_6xkk(x, kk),
            Instruction::AddByte { x, kk } => self.op_7xkk(x, kk),
            Instruction::LdReg { x, y } => self.op_8xy0(x, y),
            Instruction::Or { x, y } => self.op_8xy1(x, y),
            Instruction::And { x, y } => self.op_8xy2(x, y),
            Instruction::Xor { x, y } => self.op_8xy3(x, y),
            Instruction::AddReg { x, y } => self.op_8xy4(x, y),
            Instruction::Sub { x, y } => self.op_8xy5(x, y),
            Instruction::Shr { x } => self.op_8xy6(x),
            Instruction::Subn { x, y } => self.op_8xy7(x, y),
            Instruction::Shl { x } => self.op_8xye(x),
            Instruction::SneReg { x, y } => self.op_9xy0(x, y),
            Instruction::LdI(nnn) => self.op_annn(nnn),
            Instruction::JpV0(nnn) => self.op_bnnn(nnn),
            Instruction::Rnd { x, kk } => self.op_cxkk(x, kk),
            Instruction::Drw { x, y, n } => self.op_dxyn(x, y, n),
            Instruction::Skp { x } => self.op_ex9e(x),
            Instruction::Sknp { x } => self.op_exa1(x),
            Instruction::LdVxDt { x } => self.op_fx07(x),
            Instruction::LdVxK { x } => self.op_fx0a(x),
            Instruction::LdDtVx { x } => self.op_fx15(x),
            Instruction::LdStVx { x } => self.op_fx18(x),
            Instruction::AddI { x } => self.op_fx1e(x),
            Instruction::LdF { x } => self.op_fx29(x),
            Instruction::LdB { x } => self.op_fx33(x),
            Instruction::StoreRegs { x } => self.op_fx55(x),
            Instruction::LoadRegs { x } => self.op_fx65(x),
            Instruction::Unknown(opcode) => {
                debug!("ignoring undefined instruction {:04X}", opcode);
            }
        }

        Ok(())
    }

    /// Address of the instruction currently executing.
    fn current_address(&self) -> u16 {
        self.program_counter - 2
    }

    /// `CLS`: opcode `00E0`
    ///
    /// Clear the display.
    fn op_00e0(&mut self) {
        self.display.fill(PIXEL_OFF);
        self.display_changed = true;
    }

    /// `RET`: opcode `00EE`
    ///
    /// Return from a subroutine. The top of the stack holds the address just
    /// past the `CALL`, so it replaces the program counter as is.
    fn op_00ee(&mut self) -> Result<()> {
        if self.stack_pointer == 0 {
            return Err(Error::StackUnderflow {
                pc: self.current_address(),
            });
        }

        self.stack_pointer -= 1;
        self.program_counter = self.stack[self.stack_pointer];
        Ok(())
    }

    /// `JP addr`: opcode `1nnn`
    ///
    /// Jump to location `nnn`.
    fn op_1nnn(&mut self, nnn: u16) {
        self.program_counter = nnn;
    }

    /// `CALL addr`: opcode `2nnn`
    ///
    /// Pushes the already advanced program counter so `RET` resumes after the
    /// call.
    fn op_2nnn(&mut self, nnn: u16) -> Result<()> {
        if self.stack_pointer == STACK_SIZE {
            return Err(Error::StackOverflow {
                pc: self.current_address(),
            });
        }

        self.stack[self.stack_pointer] = self.program_counter;
        self.stack_pointer += 1;

        self.program_counter = nnn;
        Ok(())
    }

    /// `SE Vx, byte`: opcode `3xkk`
    ///
    /// Skip next instruction if `Vx = kk`.
    fn op_3xkk(&mut self, x: usize, kk: u8) {
        if self.registers[x] == kk {
            self.program_counter += 2;
        }
    }

    /// `SNE Vx, byte`: opcode `4xkk`
    ///
    /// Skip next instruction if `Vx != kk`.
    fn op_4xkk(&mut self, x: usize, kk: u8) {
        if self.registers[x] != kk {
            self.program_counter += 2;
        }
    }

    /// `SE Vx, Vy`: opcode `5xy0`
    ///
    /// Skip next instruction if `Vx = Vy`.
    fn op_5xy0(&mut self, x: usize, y: usize) {
        if self.registers[x] == self.registers[y] {
            self.program_counter += 2;
        }
    }

    /// `LD Vx, byte`: opcode `6xkk`
    ///
    /// Set `Vx = kk`.
    fn op_6xkk(&mut self, x: usize, kk: u8) {
        self.registers[x] = kk;
    }

    /// `ADD Vx, byte`: opcode `7xkk`
    ///
    /// Set `Vx = Vx + kk`.
    ///
    /// Wraps on overflow without touching `VF`.
    fn op_7xkk(&mut self, x: usize, kk: u8) {
        self.registers[x] = self.registers[x].wrapping_add(kk);
    }

    /// `LD Vx, Vy`: opcode `8xy0`
    ///
    /// Set `Vx = Vy`.
    fn op_8xy0(&mut self, x: usize, y: usize) {
        self.registers[x] = self.registers[y];
    }

    /// `OR Vx, Vy`: opcode `8xy1`
    ///
    /// Set `Vx = Vx OR Vy`.
    fn op_8xy1(&mut self, x: usize, y: usize) {
        self.registers[x] |= self.registers[y];
    }

    /// `AND Vx, Vy`: opcode `8xy2`
    ///
    /// Set `Vx = Vx AND Vy`.
    fn op_8xy2(&mut self, x: usize, y: usize) {
        self.registers[x] &= self.registers[y];
    }

    /// `XOR Vx, Vy`: opcode `8xy3`
    ///
    /// Set `Vx = Vx XOR Vy`.
    fn op_8xy3(&mut self, x: usize, y: usize) {
        self.registers[x] ^= self.registers[y];
    }

    /// `ADD Vx, Vy`: opcode `8xy4`
    ///
    /// Set `Vx = Vx + Vy`, set `VF = carry`.
    ///
    /// `VF` is written after `Vx`, so when `x` is `F` the flag wins.
    fn op_8xy4(&mut self, x: usize, y: usize) {
        let (result, overflow) = self.registers[x].overflowing_add(self.registers[y]);

        self.registers[x] = result;
        self.registers[0xF] = overflow as u8;
    }

    /// `SUB Vx, Vy`: opcode `8xy5`
    ///
    /// Set `Vx = Vx - Vy`, set `VF = NOT borrow`. No borrow means `Vx >= Vy`.
    fn op_8xy5(&mut self, x: usize, y: usize) {
        let (result, borrow) = self.registers[x].overflowing_sub(self.registers[y]);

        self.registers[x] = result;
        self.registers[0xF] = !borrow as u8;
    }

    /// `SHR Vx`: opcode `8xy6`
    ///
    /// Set `Vx = Vx SHR 1`.
    ///
    /// The bit shifted out lands in `VF`. `y` is ignored.
    fn op_8xy6(&mut self, x: usize) {
        let shifted_out = self.registers[x] & 0x1;

        self.registers[x] >>= 1;
        self.registers[0xF] = shifted_out;
    }

    /// `SUBN Vx, Vy`: opcode `8xy7`
    ///
    /// Set `Vx = Vy - Vx`, set `VF = NOT borrow`.
    fn op_8xy7(&mut self, x: usize, y: usize) {
        let (result, borrow) = self.registers[y].overflowing_sub(self.registers[x]);

        self.registers[x] = result;
        self.registers[0xF] = !borrow as u8;
    }

    /// `SHL Vx`: opcode `8xyE`
    ///
    /// Set `Vx = Vx SHL 1`. The bit shifted out lands in `VF`. `y` is ignored.
    fn op_8xye(&mut self, x: usize) {
        let shifted_out = (self.registers[x] & 0b1000_0000) >> 7;

        self.registers[x] <<= 1;
        self.registers[0xF] = shifted_out;
    }

    /// `SNE Vx, Vy`: opcode `9xy0`
    ///
    /// Skip next instruction if `Vx != Vy`.
    fn op_9xy0(&mut self, x: usize, y: usize) {
        if self.registers[x] != self.registers[y] {
            self.program_counter += 2;
        }
    }

    /// `LD I, addr`: opcode `Annn`
    ///
    /// Set `I = nnn`.
    fn op_annn(&mut self, nnn: u16) {
        self.index = nnn;
    }

    /// `JP V0, addr`: opcode `Bnnn`
    ///
    /// Jump to location `nnn + V0`.
    fn op_bnnn(&mut self, nnn: u16) {
        self.program_counter = nnn + self.registers[0] as u16;
    }

    /// `RND Vx, byte`: opcode `Cxkk`
    ///
    /// Set `Vx = random byte AND kk`.
    fn op_cxkk(&mut self, x: usize, kk: u8) {
        self.registers[x] = self.random_byte() & kk;
    }

    /// `DRW Vx, Vy, nibble`: opcode `Dxyn`
    ///
    /// XORs an `n` row sprite read from `I` onto the display at `(Vx, Vy)`.
    /// Every pixel wraps around the screen edges. `VF` is set when any lit
    /// pixel gets switched off.
    fn op_dxyn(&mut self, x: usize, y: usize, n: u8) {
        let origin_x = self.registers[x] as usize % DISPLAY_WIDTH;
        let origin_y = self.registers[y] as usize % DISPLAY_HEIGHT;

        let mut collision = false;

        for row in 0..n as usize {
            let sprite_byte = self.read_byte(self.index.wrapping_add(row as u16));
            let screen_y = (origin_y + row) % DISPLAY_HEIGHT;

            for col in 0..8 {
                if sprite_byte & (0b1000_0000 >> col) == 0 {
                    continue;
                }

                let screen_x = (origin_x + col) % DISPLAY_WIDTH;
                let pixel = &mut self.display[screen_y * DISPLAY_WIDTH + screen_x];

                collision |= *pixel != PIXEL_OFF;
                *pixel ^= PIXEL_ON;
            }
        }

        self.registers[0xF] = collision as u8;
        self.display_changed = true;
    }

    /// `SKP Vx`: opcode `Ex9E`
    ///
    /// Skip next instruction if the key in `Vx` is pressed.
    ///
    /// Only the low nibble of `Vx` selects the key.
    fn op_ex9e(&mut self, x: usize) {
        let key = (self.registers[x] & 0xF) as usize;

        if self.keypad[key] {
            self.program_counter += 2;
        }
    }

    /// `SKNP Vx`: opcode `ExA1`
    ///
    /// Skip next instruction if the key in `Vx` is not pressed.
    fn op_exa1(&mut self, x: usize) {
        let key = (self.registers[x] & 0xF) as usize;

        if !self.keypad[key] {
            self.program_counter += 2;
        }
    }

    /// `LD Vx, DT`: opcode `Fx07`
    ///
    /// Set `Vx = delay timer`.
    fn op_fx07(&mut self, x: usize) {
        self.registers[x] = self.delay_timer;
    }

    /// `LD Vx, K`: opcode `Fx0A`
    ///
    /// Waits for a key to be pressed and released, then stores it in `Vx`.
    /// Waiting is done by stepping the program counter back so the same
    /// instruction runs again on the next cycle.
    fn op_fx0a(&mut self, x: usize) {
        match self.key_wait {
            KeyWait::Idle => {
                if let Some(key) = self.keypad.iter().rposition(|&pressed| pressed) {
                    debug!("V{:X} waiting for release of key {:X}", x, key);
                    self.key_wait = KeyWait::AwaitingRelease {
                        register: x,
                        key: key as u8,
                    };
                }
                self.program_counter -= 2;
            }
            KeyWait::AwaitingRelease { register, key } => {
                if self.keypad[key as usize] {
                    self.program_counter -= 2;
                } else {
                    debug!("key {:X} released into V{:X}", key, register);
                    self.registers[register] = key;
                    self.key_wait = KeyWait::Idle;
                }
            }
        }
    }

    /// `LD DT, Vx`: opcode `Fx15`
    ///
    /// Set `delay timer = Vx`.
    fn op_fx15(&mut self, x: usize) {
        self.delay_timer = self.registers[x];
    }

    /// `LD ST, Vx`: opcode `Fx18`
    ///
    /// Set `sound timer = Vx`.
    fn op_fx18(&mut self, x: usize) {
        self.sound_timer = self.registers[x];
    }

    /// `ADD I, Vx`: opcode `Fx1E`
    ///
    /// Set `I = I + Vx`. Wraps on 16 bits without touching `VF`.
    fn op_fx1e(&mut self, x: usize) {
        self.index = self.index.wrapping_add(self.registers[x] as u16);
    }

    /// `LD F, Vx`: opcode `Fx29`
    ///
    /// Points `I` at the font glyph for the digit in `Vx`.
    fn op_fx29(&mut self, x: usize) {
        let digit = self.registers[x] as u16;

        self.index = FONT_START + GLYPH_SIZE * digit;
    }

    /// `LD B, Vx`: opcode `Fx33`
    ///
    /// Stores the hundreds, tens and ones digits of `Vx` at `I`, `I+1` and
    /// `I+2`.
    fn op_fx33(&mut self, x: usize) {
        let value = self.registers[x];

        self.write_byte(self.index, value / 100);
        self.write_byte(self.index.wrapping_add(1), (value / 10) % 10);
        self.write_byte(self.index.wrapping_add(2), value % 10);
    }

    /// `LD [I], Vx`: opcode `Fx55`
    ///
    /// Stores `V0` through `Vx` starting at `I`. `I` ends up just past the last
    /// byte written.
    fn op_fx55(&mut self, x: usize) {
        for i in 0..=x {
            self.write_byte(self.index.wrapping_add(i as u16), self.registers[i]);
        }

        self.index = self.index.wrapping_add(x as u16 + 1);
    }

    /// `LD Vx, [I]`: opcode `Fx65`
    ///
    /// Read `V0` through `Vx` from memory starting at `I`. `I` ends up just past
    /// the last byte read.
    fn op_fx65(&mut self, x: usize) {
        for i in 0..=x {
            self.registers[i] = self.read_byte(self.index.wrapping_add(i as u16));
        }

        self.index = self.index.wrapping_add(x as u16 + 1);
    }
}
