//! ELF access layer (component C1): open a binary, locate sections,
//! enumerate and version symbols, classify the object, and normalize
//! addresses for the DWARF-to-IR builder.

mod address;
mod error;
mod hash;
mod reader;
mod symbol;

pub use address::{AddressContext, BinaryKind, SectionRange};
pub use error::{ElfError, ReadStatus, Result};
pub use hash::{elf_hash, gnu_hash, GnuHashTable, SysvHashTable};
pub use reader::{AltDebugLink, ElfInfo, ElfReader, HashStrategy, SymbolAddressMaps, SymbolNameMaps};
pub use symbol::{ElfSymbol, SymbolBinding, SymbolId, SymbolTable, SymbolType, SymbolVersion};
