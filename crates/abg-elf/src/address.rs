//! Address normalization (spec.md §4.1): map a raw DWARF-reported address to
//! the value that is stable across relocation and split-debug-info shifts,
//! so two corpora built from differently-linked copies of "the same" binary
//! still compare function/variable addresses meaningfully.

/// How the containing ELF object is classified (spec.md §4.1).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryKind {
    Executable,
    SharedObject,
    Relocatable,
    Unknown,
}

/// One named, address-ranged section relevant to normalization
/// (`.text`, `.data`, `.data1`, `.bss`, `.rodata`).
#[derive(Clone, Debug)]
pub struct SectionRange {
    pub name: String,
    pub start: u64,
    pub size: u64,
}

impl SectionRange {
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.start + self.size
    }
}

/// Everything [`normalize_function_address`]/[`normalize_variable_address`]
/// need, gathered once per corpus.
pub struct AddressContext {
    pub kind: BinaryKind,
    pub text: Option<SectionRange>,
    pub data_sections: Vec<SectionRange>,
    /// `executable load address - dwarf-file load address`, applied only
    /// when debug info is split (spec.md's `.gnu_debugaltlink` case implies
    /// the DWARF-bearing file and the stripped executable can differ).
    pub split_debug_shift: i64,
    pub is_split_debug: bool,
}

impl AddressContext {
    /// Function address normalization: relocatable objects subtract the
    /// `.text` base; executables/DSOs with split debug info apply the
    /// load-address shift; otherwise the address is already absolute.
    pub fn normalize_function_address(&self, addr: u64) -> u64 {
        match self.kind {
            BinaryKind::Relocatable => {
                let base = self.text.as_ref().map(|t| t.start).unwrap_or(0);
                addr.wrapping_sub(base)
            }
            BinaryKind::Executable | BinaryKind::SharedObject => {
                if self.is_split_debug {
                    addr.wrapping_add(self.split_debug_shift as u64)
                } else {
                    addr
                }
            }
            BinaryKind::Unknown => addr,
        }
    }

    /// Variable address normalization. Thread-local addresses are never
    /// shifted: a TLS offset is relative to the TLS block, not the load
    /// address, so none of the relocatable/split-debug adjustments apply.
    pub fn normalize_variable_address(&self, addr: u64, is_tls: bool) -> u64 {
        if is_tls {
            return addr;
        }
        match self.kind {
            BinaryKind::Relocatable => {
                let base = self
                    .data_sections
                    .iter()
                    .find(|s| s.contains(addr))
                    .map(|s| s.start)
                    .unwrap_or(0);
                addr.wrapping_sub(base)
            }
            BinaryKind::Executable | BinaryKind::SharedObject => {
                if self.is_split_debug {
                    addr.wrapping_add(self.split_debug_shift as u64)
                } else {
                    addr
                }
            }
            BinaryKind::Unknown => addr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(kind: BinaryKind) -> AddressContext {
        AddressContext {
            kind,
            text: Some(SectionRange {
                name: ".text".into(),
                start: 0x1000,
                size: 0x500,
            }),
            data_sections: vec![SectionRange {
                name: ".data".into(),
                start: 0x2000,
                size: 0x100,
            }],
            split_debug_shift: 0x10,
            is_split_debug: false,
        }
    }

    #[test]
    fn relocatable_function_address_is_text_relative() {
        let c = ctx(BinaryKind::Relocatable);
        assert_eq!(c.normalize_function_address(0x1010), 0x10);
    }

    #[test]
    fn split_debug_shift_applies_only_when_split() {
        let mut c = ctx(BinaryKind::Executable);
        assert_eq!(c.normalize_function_address(0x4000), 0x4000);
        c.is_split_debug = true;
        assert_eq!(c.normalize_function_address(0x4000), 0x4010);
    }

    #[test]
    fn tls_variable_address_is_never_shifted() {
        let mut c = ctx(BinaryKind::Executable);
        c.is_split_debug = true;
        assert_eq!(c.normalize_variable_address(0x4000, true), 0x4000);
    }

    #[test]
    fn relocatable_variable_address_is_data_section_relative() {
        let c = ctx(BinaryKind::Relocatable);
        assert_eq!(c.normalize_variable_address(0x2040, false), 0x40);
    }
}
