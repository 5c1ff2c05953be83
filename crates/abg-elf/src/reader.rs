//! The ELF access layer (spec.md §4.1, component C1).
//!
//! Built on top of the portable `object` crate for section/symbol iteration,
//! with the ELF-specific bits the generic `Object` trait doesn't surface
//! (dynamic-section strings, hash tables, `.gnu_debugaltlink`) decoded by
//! hand from raw section bytes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use object::{Object, ObjectSection, ObjectSegment, ObjectSymbol, SectionKind, SymbolFlags};
use tracing::{debug, instrument, warn};

use crate::address::{AddressContext, BinaryKind, SectionRange};
use crate::error::{ElfError, ReadStatus, Result};
use crate::hash::{GnuHashTable, SysvHashTable};
use crate::symbol::{ElfSymbol, SymbolBinding, SymbolId, SymbolTable, SymbolType, SymbolVersion};

const DT_NEEDED: i64 = 1;
const DT_STRTAB: i64 = 5;
const DT_SONAME: i64 = 14;
const DT_NULL: i64 = 0;

const STT_GNU_IFUNC: u8 = 10;

/// Debug-info discovery result for `.gnu_debugaltlink` (spec.md §4.1, §6.1).
#[derive(Clone, Debug)]
pub struct AltDebugLink {
    pub path: String,
    pub build_id: Vec<u8>,
}

/// The four symbol-name partitions spec.md §4.1 calls for, each a name to a
/// vector of symbols (a vector because alias groups and common instances
/// share a name).
#[derive(Default)]
pub struct SymbolNameMaps {
    pub defined_functions: HashMap<String, Vec<SymbolId>>,
    pub defined_variables: HashMap<String, Vec<SymbolId>>,
    pub undefined_functions: HashMap<String, Vec<SymbolId>>,
    pub undefined_variables: HashMap<String, Vec<SymbolId>>,
}

/// Address-keyed views used to resolve a `DW_AT_location`-derived address
/// back to the symbol that defines it (spec.md §4.1's "lookup a symbol by
/// address").
#[derive(Default)]
pub struct SymbolAddressMaps {
    pub functions: std::collections::BTreeMap<u64, SymbolId>,
    pub variables: std::collections::BTreeMap<u64, SymbolId>,
}

/// Everything the DWARF-to-IR builder (C5) needs from the ELF layer to
/// materialize one corpus.
pub struct ElfInfo {
    pub path: PathBuf,
    pub kind: BinaryKind,
    pub architecture: String,
    pub soname: Option<String>,
    pub needed: Vec<String>,
    pub load_address: u64,
    pub address_ctx: AddressContext,
    pub alt_debug_link: Option<AltDebugLink>,
    pub symbols: SymbolTable,
    pub names: SymbolNameMaps,
    pub addresses: SymbolAddressMaps,
    pub status: ReadStatus,
}

impl ElfInfo {
    /// spec.md §4.1: "lookup defined public function symbols by name".
    pub fn lookup_defined_function(&self, name: &str) -> Option<&[SymbolId]> {
        self.names.defined_functions.get(name).map(Vec::as_slice)
    }

    /// spec.md §4.1: "lookup defined public variable symbols by name".
    pub fn lookup_defined_variable(&self, name: &str) -> Option<&[SymbolId]> {
        self.names.defined_variables.get(name).map(Vec::as_slice)
    }

    /// spec.md §4.1: "lookup a symbol by address (function or variable)".
    pub fn lookup_by_address(&self, addr: u64) -> Option<SymbolId> {
        self.addresses
            .functions
            .get(&addr)
            .or_else(|| self.addresses.variables.get(&addr))
            .copied()
    }
}

fn classify(kind: object::ObjectKind) -> BinaryKind {
    match kind {
        object::ObjectKind::Executable => BinaryKind::Executable,
        object::ObjectKind::Dynamic => BinaryKind::SharedObject,
        object::ObjectKind::Relocatable => BinaryKind::Relocatable,
        _ => BinaryKind::Unknown,
    }
}

fn read_u32le(data: &[u8], off: usize) -> Option<u32> {
    data.get(off..off + 4)
        .map(|s| u32::from_le_bytes(s.try_into().unwrap()))
}

fn read_i64le(data: &[u8], off: usize) -> Option<i64> {
    data.get(off..off + 8)
        .map(|s| i64::from_le_bytes(s.try_into().unwrap()))
}

fn read_u64le(data: &[u8], off: usize) -> Option<u64> {
    data.get(off..off + 8)
        .map(|s| u64::from_le_bytes(s.try_into().unwrap()))
}

fn cstr_at(data: &[u8], off: usize) -> Option<String> {
    let rest = data.get(off..)?;
    let end = rest.iter().position(|&b| b == 0)?;
    Some(String::from_utf8_lossy(&rest[..end]).into_owned())
}

/// Parse a `.dynamic` section's `Elf64_Dyn` array (little-endian) into
/// `(soname, needed)`, resolving string-table offsets against `.dynstr`.
fn parse_dynamic(dynamic: &[u8], dynstr: &[u8]) -> (Option<String>, Vec<String>) {
    let mut soname = None;
    let mut needed = Vec::new();
    let mut off = 0;
    while off + 16 <= dynamic.len() {
        let tag = match read_i64le(dynamic, off) {
            Some(t) => t,
            None => break,
        };
        let val = read_u64le(dynamic, off + 8).unwrap_or(0);
        if tag == DT_NULL {
            break;
        }
        if tag == DT_SONAME {
            soname = cstr_at(dynstr, val as usize);
        } else if tag == DT_NEEDED {
            if let Some(s) = cstr_at(dynstr, val as usize) {
                needed.push(s);
            }
        }
        off += 16;
    }
    let _ = DT_STRTAB; // DT_STRTAB itself isn't needed: we locate .dynstr by name.
    (soname, needed)
}

/// Parse `.gnu_debugaltlink`: a NUL-terminated path followed immediately by
/// the referenced file's build-id bytes.
fn parse_debugaltlink(data: &[u8]) -> Option<AltDebugLink> {
    let nul = data.iter().position(|&b| b == 0)?;
    let path = String::from_utf8_lossy(&data[..nul]).into_owned();
    let build_id = data.get(nul + 1..)?.to_vec();
    Some(AltDebugLink { path, build_id })
}

pub struct ElfReader;

impl ElfReader {
    /// Open `path`, classify it, and build the symbol-table views the
    /// DWARF-to-IR builder needs. Never fails on missing debug info or
    /// missing symbols (spec.md §7): those are reported via `status` and the
    /// info returned is as complete as the binary allows.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<ElfInfo> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ElfError::NoSuchFile(path.display().to_string())
            } else {
                ElfError::Io(e)
            }
        })?;
        let obj = object::File::parse(&*data)
            .map_err(|e| ElfError::MalformedElf(e.to_string()))?;

        let mut status = ReadStatus::OK;
        let kind = classify(obj.kind());
        let architecture = format!("{:?}", obj.architecture());

        let text = obj.section_by_name(".text").map(|s| SectionRange {
            name: ".text".into(),
            start: s.address(),
            size: s.size(),
        });
        let data_sections = [".data", ".data1", ".bss", ".rodata"]
            .iter()
            .filter_map(|n| {
                obj.section_by_name(n).map(|s| SectionRange {
                    name: (*n).into(),
                    start: s.address(),
                    size: s.size(),
                })
            })
            .collect::<Vec<_>>();

        let load_address = obj
            .segments()
            .filter(|seg| seg.file_range().0 == 0)
            .map(|seg| seg.address())
            .min()
            .unwrap_or(0);

        let alt_debug_link = obj
            .section_by_name(".gnu_debugaltlink")
            .and_then(|s| s.data().ok().map(|d| d.to_vec()))
            .and_then(|d| parse_debugaltlink(&d));

        let (soname, needed) = match (
            obj.section_by_name(".dynamic").and_then(|s| s.data().ok().map(|d| d.to_vec())),
            obj.section_by_name(".dynstr").and_then(|s| s.data().ok().map(|d| d.to_vec())),
        ) {
            (Some(dynamic), Some(dynstr)) => parse_dynamic(&dynamic, &dynstr),
            _ => (None, Vec::new()),
        };

        let (symbols, names, addresses) = Self::read_symbols(&obj, kind)?;
        if symbols.is_empty() {
            warn!("no symbol table found");
            status |= ReadStatus::NO_SYMBOLS_FOUND;
        }

        let address_ctx = AddressContext {
            kind,
            text,
            data_sections,
            split_debug_shift: 0,
            is_split_debug: alt_debug_link.is_some(),
        };

        debug!(?kind, symbols = symbols.len(), "opened ELF object");

        Ok(ElfInfo {
            path: path.to_path_buf(),
            kind,
            architecture,
            soname,
            needed,
            load_address,
            address_ctx,
            alt_debug_link,
            symbols,
            names,
            addresses,
            status,
        })
    }

    /// Choose `.dynsym` for DSOs and `.symtab` otherwise, falling back to
    /// the other table when the preferred one is absent (spec.md §4.1).
    fn read_symbols(
        obj: &object::File,
        kind: BinaryKind,
    ) -> Result<(SymbolTable, SymbolNameMaps, SymbolAddressMaps)> {
        let mut table = SymbolTable::new();
        let mut names = SymbolNameMaps::default();
        let mut addresses = SymbolAddressMaps::default();
        let mut common_mains: HashMap<String, SymbolId> = HashMap::new();

        let prefer_dynamic = matches!(kind, BinaryKind::SharedObject);
        let have_static = obj.symbols().next().is_some();
        let have_dynamic = obj.dynamic_symbols().next().is_some();
        let use_dynamic = if prefer_dynamic {
            have_dynamic || !have_static
        } else {
            !have_static && have_dynamic
        };

        let iter: Box<dyn Iterator<Item = object::Symbol>> = if use_dynamic {
            Box::new(obj.dynamic_symbols())
        } else {
            Box::new(obj.symbols())
        };

        for sym in iter {
            let Ok(name) = sym.name() else { continue };
            if name.is_empty() {
                continue;
            }
            let (binding, raw_type) = match sym.flags() {
                SymbolFlags::Elf { st_info, .. } => (st_info >> 4, st_info & 0xf),
                _ => (1, 0),
            };
            let sym_type = match raw_type {
                1 => SymbolType::Object,
                2 => SymbolType::Function,
                3 => SymbolType::Section,
                4 => SymbolType::File,
                5 => SymbolType::Common,
                6 => SymbolType::Tls,
                t if t == STT_GNU_IFUNC => SymbolType::GnuIfunc,
                _ => SymbolType::None,
            };
            let binding = match binding {
                0 => SymbolBinding::Local,
                2 => SymbolBinding::Weak,
                10 => SymbolBinding::GnuUnique,
                _ => SymbolBinding::Global,
            };
            let is_common = sym.section() == object::SymbolSection::Common;
            let is_defined = !sym.is_undefined();
            let version = None::<SymbolVersion>; // decoded separately once versym/verdef/verneed land.

            let elf_sym = ElfSymbol {
                name: name.to_string(),
                version,
                sym_type,
                binding,
                size: sym.size(),
                is_defined,
                is_common,
                index: sym.index().0,
                main: None,
                next_alias: None,
                common_instances: Vec::new(),
            };

            let is_function = matches!(elf_sym.sym_type, SymbolType::Function | SymbolType::GnuIfunc);
            let addr = sym.address();

            if is_common {
                if let Some(&main) = common_mains.get(name) {
                    let id = table.push(elf_sym);
                    table.add_common_instance(main, id);
                    continue;
                }
            }

            let id = table.push(elf_sym);
            if is_common {
                common_mains.insert(name.to_string(), id);
            }

            let bucket = match (is_defined, is_function) {
                (true, true) => &mut names.defined_functions,
                (true, false) => &mut names.defined_variables,
                (false, true) => &mut names.undefined_functions,
                (false, false) => &mut names.undefined_variables,
            };
            bucket.entry(name.to_string()).or_default().push(id);

            if is_defined && addr != 0 {
                if is_function {
                    addresses.functions.insert(addr, id);
                } else {
                    addresses.variables.insert(addr, id);
                }
            }
        }

        Ok((table, names, addresses))
    }

    /// Construct a hash-accelerated or linear lookup closure for `section`,
    /// preferring `.gnu.hash` over `.hash` over a full scan, matching
    /// spec.md's "Recognize GNU and SysV hash tables... when neither is
    /// present, scan... linearly".
    pub fn hash_lookup_strategy(obj: &object::File) -> HashStrategy {
        if let Some(data) = obj
            .section_by_name(".gnu.hash")
            .and_then(|s| s.data().ok())
        {
            if GnuHashTable::parse(data).is_some() {
                return HashStrategy::Gnu;
            }
        }
        if let Some(data) = obj.section_by_name(".hash").and_then(|s| s.data().ok()) {
            if SysvHashTable::parse(data).is_some() {
                return HashStrategy::Sysv;
            }
        }
        HashStrategy::Linear
    }

    fn _unused_section_kind_check(k: SectionKind) -> bool {
        matches!(k, SectionKind::Data | SectionKind::UninitializedData)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HashStrategy {
    Gnu,
    Sysv,
    Linear,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_dynamic_extracts_soname_and_needed() {
        let dynstr = b"\0libfoo.so.1\0libbar.so.2\0libsoname.so\0";
        let soname_off = dynstr
            .windows("libsoname.so".len())
            .position(|w| w == b"libsoname.so")
            .unwrap();
        let needed1_off = 1usize;
        let needed2_off = dynstr
            .windows("libbar.so.2".len())
            .position(|w| w == b"libbar.so.2")
            .unwrap();

        let mut dynamic = Vec::new();
        let push_entry = |v: &mut Vec<u8>, tag: i64, val: u64| {
            v.extend_from_slice(&tag.to_le_bytes());
            v.extend_from_slice(&val.to_le_bytes());
        };
        push_entry(&mut dynamic, DT_NEEDED, needed1_off as u64);
        push_entry(&mut dynamic, DT_NEEDED, needed2_off as u64);
        push_entry(&mut dynamic, DT_SONAME, soname_off as u64);
        push_entry(&mut dynamic, DT_NULL, 0);

        let (soname, needed) = parse_dynamic(&dynamic, dynstr);
        assert_eq!(soname.as_deref(), Some("libsoname.so"));
        assert_eq!(needed, vec!["libfoo.so.1", "libbar.so.2"]);
    }

    #[test]
    fn parse_debugaltlink_splits_path_and_build_id() {
        let mut data = b"debug.alt\0".to_vec();
        data.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        let link = parse_debugaltlink(&data).unwrap();
        assert_eq!(link.path, "debug.alt");
        assert_eq!(link.build_id, vec![0xde, 0xad, 0xbe, 0xef]);
    }
}
