//! Error kinds and the reader status bitset (spec.md §6.3, §7).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ElfError {
    #[error("no such file: {0}")]
    NoSuchFile(String),
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("not a recognizable ELF object: {0}")]
    MalformedElf(String),
    #[error("no symbol table present")]
    NoSymbols,
    #[error("debug info not found")]
    NoDebugInfo,
    #[error("alternate debug info not found: {0}")]
    AltDebugInfoNotFound(String),
}

/// Combinable outcome bits returned alongside a (possibly partial) corpus.
///
/// Mirrors spec.md §6.3's `read_corpus_from_elf` status, and is intended to
/// be OR-ed together: a missing symbol table and missing debug info can both
/// be true of the same input, and the corpus is still returned with
/// whatever content was salvageable.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ReadStatus(u8);

impl ReadStatus {
    pub const OK: ReadStatus = ReadStatus(0);
    pub const DEBUG_INFO_NOT_FOUND: ReadStatus = ReadStatus(1 << 0);
    pub const NO_SYMBOLS_FOUND: ReadStatus = ReadStatus(1 << 1);
    pub const ALT_DEBUG_INFO_NOT_FOUND: ReadStatus = ReadStatus(1 << 2);
    pub const NO_SUCH_FILE: ReadStatus = ReadStatus(1 << 3);
    pub const UNKNOWN: ReadStatus = ReadStatus(1 << 4);

    pub fn is_ok(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, bit: ReadStatus) -> bool {
        self.0 & bit.0 != 0
    }
}

impl std::ops::BitOr for ReadStatus {
    type Output = ReadStatus;
    fn bitor(self, rhs: ReadStatus) -> ReadStatus {
        ReadStatus(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for ReadStatus {
    fn bitor_assign(&mut self, rhs: ReadStatus) {
        self.0 |= rhs.0;
    }
}

pub type Result<T> = std::result::Result<T, ElfError>;
