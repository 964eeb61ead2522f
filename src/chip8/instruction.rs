/// Extracts `_nnn` from an opcode.
macro_rules! nnn {
    ($opcode:expr) => {
        $opcode & 0x0FFF
    };
}

/// Extracts `___n` from an opcode.
macro_rules! n {
    ($opcode:expr) => {
        ($opcode & 0x000F) as u8
    };
}

/// Extracts `_x__` from an opcode. Since `x` is used to index registers, it is
/// returned as a `usize`.
macro_rules! x {
    ($opcode:expr) => {
        (($opcode & 0x0F00) >> 8) as usize
    };
}

/// Extracts `__y_` from an opcode. Since `y` is used to index registers, it is
/// returned as a `usize`.
macro_rules! y {
    ($opcode:expr) => {
        (($opcode & 0x00F0) >> 4) as usize
    };
}

/// Extracts `__kk` from an opcode. Since `kk` is used to compare values against
/// registers, it is returned as a `u8`.
macro_rules! kk {
    ($opcode:expr) => {
        ($opcode & 0x00FF) as u8
    };
}

/// A decoded instruction word.
///
/// Variants are named after the opcode pattern they decode from. Register
/// indices are `usize` so they can index the register file directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// `00E0`
    Cls,
    /// `00EE`
    Ret,
    /// `0nnn`, the legacy machine code call. Never executed.
    Sys(u16),
    /// `1nnn`
    Jp(u16),
    /// `2nnn`
    Call(u16),
    /// `3xkk`
    SeByte { x: usize, kk: u8 },
    /// `4xkk`
    SneByte { x: usize, kk: u8 },
    /// `5xy0`
    SeReg { x: usize, y: usize },
    /// `6xkk`
    LdByte { x: usize, kk: u8 },
    /// `7xkk`
    AddByte { x: usize, kk: u8 },
    /// `8xy0`
    LdReg { x: usize, y: usize },
    /// `8xy1`
    Or { x: usize, y: usize },
    /// `8xy2`
    And { x: usize, y: usize },
    /// `8xy3`
    Xor { x: usize, y: usize },
    /// `8xy4`
    AddReg { x: usize, y: usize },
    /// `8xy5`
    Sub { x: usize, y: usize },
    /// `8xy6`
    Shr { x: usize },
    /// `8xy7`
    Subn { x: usize, y: usize },
    /// `8xyE`
    Shl { x: usize },
    /// `9xy0`
    SneReg { x: usize, y: usize },
    /// `Annn`
    LdI(u16),
    /// `Bnnn`
    JpV0(u16),
    /// `Cxkk`
    Rnd { x: usize, kk: u8 },
    /// `Dxyn`
    Drw { x: usize, y: usize, n: u8 },
    /// `Ex9E`
    Skp { x: usize },
    /// `ExA1`
    Sknp { x: usize },
    /// `Fx07`
    LdVxDt { x: usize },
    /// `Fx0A`
    LdVxK { x: usize },
    /// `Fx15`
    LdDtVx { x: usize },
    /// `Fx18`
    LdStVx { x: usize },
    /// `Fx1E`
    AddI { x: usize },
    /// `Fx29`
    LdF { x: usize },
    /// `Fx33`
    LdB { x: usize },
    /// `Fx55`
    StoreRegs { x: usize },
    /// `Fx65`
    LoadRegs { x: usize },
    /// Any encoding the instruction set leaves undefined. Executes as a no-op.
    Unknown(u16),
}

impl Instruction {
    /// Decodes a big-endian instruction word.
    ///
    /// The high nibble selects the family. Families `0`, `8`, `E` and `F` hold
    /// several operations and are keyed again on the low bits; anything they
    /// don't recognize decodes to [`Instruction::Unknown`]. Every other family
    /// maps to a single operation, so `5xyn` and `9xyn` ignore `n`.
    pub fn decode(opcode: u16) -> Instruction {
        match opcode & 0xF000 {
            0x0000 => match nnn!(opcode) {
                0x0E0 => Instruction::Cls,
                0x0EE => Instruction::Ret,
                addr => Instruction::Sys(addr),
            },
            0x1000 => Instruction::Jp(nnn!(opcode)),
            0x2000 => Instruction::Call(nnn!(opcode)),
            0x3000 => Instruction::SeByte {
                x: x!(opcode),
                kk: kk!(opcode),
            },
            0x4000 => Instruction::SneByte {
                x: x!(opcode),
                kk: kk!(opcode),
            },
            0x5000 => Instruction::SeReg {
                x: x!(opcode),
                y: y!(opcode),
            },
            0x6000 => Instruction::LdByte {
                x: x!(opcode),
                kk: kk!(opcode),
            },
            0x7000 => Instruction::AddByte {
                x: x!(opcode),
                kk: kk!(opcode),
            },
            0x8000 => {
                let (x, y) = (x!(opcode), y!(opcode));
                match n!(opcode) {
                    0x0 => Instruction::LdReg { x, y },
                    0x1 => Instruction::Or { x, y },
                    0x2 => Instruction::And { x, y },
                    0x3 => Instruction::Xor { x, y },
                    0x4 => Instruction::AddReg { x, y },
                    0x5 => Instruction::Sub { x, y },
                    0x6 => Instruction::Shr { x },
                    0x7 => Instruction::Subn { x, y },
                    0xE => Instruction::Shl { x },
                    _ => Instruction::Unknown(opcode),
                }
            }
            0x9000 => Instruction::SneReg {
                x: x!(opcode),
                y: y!(opcode),
            },
            0xA000 => Instruction::LdI(nnn!(opcode)),
            0xB000 => Instruction::JpV0(nnn!(opcode)),
            0xC000 => Instruction::Rnd {
                x: x!(opcode),
                kk: kk!(opcode),
            },
            0xD000 => Instruction::Drw {
                x: x!(opcode),
                y: y!(opcode),
                n: n!(opcode),
            },
            0xE000 => {
                let x = x!(opcode);
                match kk!(opcode) {
                    0x9E => Instruction::Skp { x },
                    0xA1 => Instruction::Sknp { x },
                    _ => Instruction::Unknown(opcode),
                }
            }
            0xF000 => {
                let x = x!(opcode);
                match kk!(opcode) {
                    0x07 => Instruction::LdVxDt { x },
                    0x0A => Instruction::LdVxK { x },
                    0x15 => Instruction::LdDtVx { x },
                    0x18 => Instruction::LdStVx { x },
                    0x1E => Instruction::AddI { x },
                    0x29 => Instruction::LdF { x },
                    0x33 => Instruction::LdB { x },
                    0x55 => Instruction::StoreRegs { x },
                    0x65 => Instruction::LoadRegs { x },
                    _ => Instruction::Unknown(opcode),
                }
            }
            // The mask leaves no other value; every family is matched above.
            _ => Instruction::Unknown(opcode),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_macros() {
        let op: u16 = 0xABCD;
        assert_eq!(nnn!(op), 0x0BCD);
        assert_eq!(x!(op), 0xB);
        assert_eq!(y!(op), 0xC);
        assert_eq!(n!(op), 0xD);
        assert_eq!(kk!(op), 0xCD);
    }

    #[test]
    fn test_decode_family_0() {
        assert_eq!(Instruction::decode(0x00E0), Instruction::Cls);
        assert_eq!(Instruction::decode(0x00EE), Instruction::Ret);
        assert_eq!(Instruction::decode(0x0123), Instruction::Sys(0x123));
        assert_eq!(Instruction::decode(0x0000), Instruction::Sys(0x000));
    }

    #[test]
    fn test_decode_one_to_one_families() {
        assert_eq!(Instruction::decode(0x1ABC), Instruction::Jp(0xABC));
        assert_eq!(Instruction::decode(0x2ABC), Instruction::Call(0xABC));
        assert_eq!(
            Instruction::decode(0x3A12),
            Instruction::SeByte { x: 0xA, kk: 0x12 }
        );
        assert_eq!(
            Instruction::decode(0x7F01),
            Instruction::AddByte { x: 0xF, kk: 0x01 }
        );
        assert_eq!(Instruction::decode(0xA050), Instruction::LdI(0x050));
        assert_eq!(Instruction::decode(0xB300), Instruction::JpV0(0x300));
        assert_eq!(
            Instruction::decode(0xD125),
            Instruction::Drw { x: 1, y: 2, n: 5 }
        );
    }

    #[test]
    fn test_decode_family_8() {
        assert_eq!(
            Instruction::decode(0x8124),
            Instruction::AddReg { x: 1, y: 2 }
        );
        assert_eq!(Instruction::decode(0x8126), Instruction::Shr { x: 1 });
        assert_eq!(Instruction::decode(0x812E), Instruction::Shl { x: 1 });
        assert_eq!(Instruction::decode(0x8128), Instruction::Unknown(0x8128));
    }

    #[test]
    fn test_decode_families_e_and_f() {
        assert_eq!(Instruction::decode(0xE39E), Instruction::Skp { x: 3 });
        assert_eq!(Instruction::decode(0xE3A1), Instruction::Sknp { x: 3 });
        assert_eq!(Instruction::decode(0xE3A2), Instruction::Unknown(0xE3A2));
        assert_eq!(Instruction::decode(0xF30A), Instruction::LdVxK { x: 3 });
        assert_eq!(Instruction::decode(0xF365), Instruction::LoadRegs { x: 3 });
        assert_eq!(Instruction::decode(0xF3FF), Instruction::Unknown(0xF3FF));
    }

    #[test]
    fn test_decode_register_compares_ignore_low_nibble() {
        assert_eq!(
            Instruction::decode(0x5120),
            Instruction::SeReg { x: 1, y: 2 }
        );
        assert_eq!(
            Instruction::decode(0x5121),
            Instruction::SeReg { x: 1, y: 2 }
        );
        assert_eq!(
            Instruction::decode(0x9120),
            Instruction::SneReg { x: 1, y: 2 }
        );
        assert_eq!(
            Instruction::decode(0x912F),
            Instruction::SneReg { x: 1, y: 2 }
        );
    }
}
