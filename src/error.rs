use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The ROM does not fit in the program area starting at `0x200`.
    #[error("ROM is too large ({size} bytes), max size is {max} bytes")]
    ImageTooLarge { size: usize, max: usize },

    #[error("could not read ROM from {}", path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// `CALL` with all 16 stack slots in use.
    #[error("stack overflow: call at {pc:#05X} exceeds 16 nested subroutines")]
    StackOverflow { pc: u16 },

    /// `RET` with an empty call stack.
    #[error("stack underflow: return at {pc:#05X} with empty call stack")]
    StackUnderflow { pc: u16 },

    #[error("program counter {pc:#06X} is outside of memory")]
    PcOutOfRange { pc: u16 },
}

impl Error {
    /// Returns `true` for errors raised while executing instructions, after
    /// which the machine cannot make progress.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::StackOverflow { .. } | Error::StackUnderflow { .. } | Error::PcOutOfRange { .. }
        )
    }
}
