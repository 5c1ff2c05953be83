//! ELF symbol representation, alias grouping, and versioning.

use cranelift_entity::{entity_impl, PrimaryMap};

/// A handle into a [`SymbolTable`].
///
/// Dense arena index: no symbol is ever removed from the table once read,
/// so a plain index is sufficient and no generation counter is needed.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(u32);
entity_impl!(SymbolId, "sym");

/// `DW_AT_language`-independent classification of what an ELF symbol denotes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SymbolType {
    None,
    Object,
    Function,
    Section,
    File,
    Common,
    Tls,
    GnuIfunc,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SymbolBinding {
    Local,
    Global,
    Weak,
    GnuUnique,
}

/// A symbol version: the version name plus whether it is the default
/// version bound to this symbol name (`foo@@VERS_1` vs `foo@VERS_1`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolVersion {
    pub name: String,
    pub is_default: bool,
}

/// One ELF symbol-table entry, plus the alias-group and common-instance
/// bookkeeping the comparison engine needs.
///
/// Symbols that denote the same address (aliases, e.g. strong/weak pairs
/// sharing an address) form a circular singly-linked list threaded through
/// `next_alias`; exactly one member of the group has `is_main_symbol() ==
/// true`. Relocatable-object common symbols additionally accrete secondary
/// "common instances" sharing a name but distinct sizes/indices, recorded in
/// `common_instances`.
#[derive(Clone, Debug)]
pub struct ElfSymbol {
    pub name: String,
    pub version: Option<SymbolVersion>,
    pub sym_type: SymbolType,
    pub binding: SymbolBinding,
    pub size: u64,
    pub is_defined: bool,
    pub is_common: bool,
    /// Index into the symbol table this symbol was read from.
    pub index: usize,
    /// `None` until the alias group is built; `Some(self)` is not stored,
    /// instead `main` points elsewhere when this symbol isn't the main one.
    pub(crate) main: Option<SymbolId>,
    pub(crate) next_alias: Option<SymbolId>,
    pub(crate) common_instances: Vec<SymbolId>,
}

impl ElfSymbol {
    pub fn is_main_symbol(&self, self_id: SymbolId) -> bool {
        self.main.is_none() || self.main == Some(self_id)
    }

    pub fn name_matches_alias(&self, table: &SymbolTable, self_id: SymbolId, name: &str) -> bool {
        if self.name == name {
            return true;
        }
        let mut cur = self.next_alias;
        while let Some(id) = cur {
            if id == self_id {
                break;
            }
            let sym = &table[id];
            if sym.name == name {
                return true;
            }
            cur = sym.next_alias;
        }
        false
    }
}

/// Owns every [`ElfSymbol`] read from one binary's chosen symbol table(s).
#[derive(Default)]
pub struct SymbolTable {
    symbols: PrimaryMap<SymbolId, ElfSymbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, symbol: ElfSymbol) -> SymbolId {
        self.symbols.push(symbol)
    }

    pub fn get(&self, id: SymbolId) -> &ElfSymbol {
        &self.symbols[id]
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut ElfSymbol {
        &mut self.symbols[id]
    }

    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &ElfSymbol)> {
        self.symbols.iter()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Link `second` as the next alias of `first`, closing the circular list.
    ///
    /// `first` is assumed to already be (or become) the main symbol of the
    /// group; if `second` previously headed its own group, its tail is
    /// spliced in so the list stays circular.
    pub fn link_alias(&mut self, first: SymbolId, second: SymbolId) {
        let main = self.symbols[first].main.unwrap_or(first);
        self.symbols[first].main = Some(main);
        self.symbols[second].main = Some(main);
        let old_next = self.symbols[first].next_alias.unwrap_or(first);
        self.symbols[first].next_alias = Some(second);
        self.symbols[second].next_alias = Some(old_next);
    }

    pub fn add_common_instance(&mut self, main: SymbolId, instance: SymbolId) {
        self.symbols[main].common_instances.push(instance);
    }

    /// All aliases of `id`, including `id` itself, walking the circular list
    /// exactly once.
    pub fn aliases(&self, id: SymbolId) -> Vec<SymbolId> {
        let mut out = vec![id];
        let mut cur = self.symbols[id].next_alias;
        while let Some(next) = cur {
            if next == id {
                break;
            }
            out.push(next);
            cur = self.symbols[next].next_alias;
        }
        out
    }
}

impl std::ops::Index<SymbolId> for SymbolTable {
    type Output = ElfSymbol;
    fn index(&self, id: SymbolId) -> &ElfSymbol {
        self.get(id)
    }
}

impl std::ops::IndexMut<SymbolId> for SymbolTable {
    fn index_mut(&mut self, id: SymbolId) -> &mut ElfSymbol {
        self.get_mut(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str) -> ElfSymbol {
        ElfSymbol {
            name: name.to_string(),
            version: None,
            sym_type: SymbolType::Function,
            binding: SymbolBinding::Global,
            size: 0,
            is_defined: true,
            is_common: false,
            index: 0,
            main: None,
            next_alias: None,
            common_instances: Vec::new(),
        }
    }

    #[test]
    fn alias_group_is_circular_and_exactly_one_main() {
        let mut table = SymbolTable::new();
        let a = table.push(sym("a"));
        let b = table.push(sym("b"));
        let c = table.push(sym("c"));
        table.link_alias(a, b);
        table.link_alias(a, c);

        let aliases = table.aliases(a);
        assert_eq!(aliases.len(), 3);
        assert!(table[a].is_main_symbol(a));
        assert!(!table[b].is_main_symbol(b));
        assert!(!table[c].is_main_symbol(c));
    }

    #[test]
    fn name_matches_alias_walks_the_whole_group() {
        let mut table = SymbolTable::new();
        let a = table.push(sym("a"));
        let b = table.push(sym("b"));
        table.link_alias(a, b);
        assert!(table[a].name_matches_alias(&table, a, "b"));
        assert!(!table[a].name_matches_alias(&table, a, "z"));
    }
}
