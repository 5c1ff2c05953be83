//! Corpus and corpus group (spec.md §3 "Corpus", "Corpus group").

use std::collections::HashMap;

use abg_elf::{SymbolId, SymbolTable};

use crate::decls::DeclId;
use crate::translation_unit::TuId;
use crate::types::TypeId;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CorpusOrigin {
    Dwarf,
    Artificial,
    LinuxKernelBinary,
}

/// The nine type-kind partitions a corpus indexes exported types by
/// (spec.md §3: "nine type-name → type lookup maps partitioned by kind").
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeMapKind {
    Basic,
    Class,
    Union,
    Enum,
    Typedef,
    Qualified,
    Pointer,
    Reference,
    Array,
    Function,
}

#[derive(Default)]
pub struct TypeNameMaps {
    maps: HashMap<TypeMapKind, HashMap<String, Vec<TypeId>>>,
}

impl TypeNameMaps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: TypeMapKind, name: String, ty: TypeId) {
        self.maps.entry(kind).or_default().entry(name).or_default().push(ty);
    }

    pub fn lookup(&self, kind: TypeMapKind, name: &str) -> &[TypeId] {
        self.maps
            .get(&kind)
            .and_then(|m| m.get(name))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// spec.md §3: "An `exported_decls_builder` applies keep/suppress name/symbol
/// filters at the moment a decl is published."
#[derive(Default, Clone)]
pub struct ExportedDeclsBuilder {
    pub keep_names: Option<Vec<String>>,
    pub suppress_names: Vec<String>,
    pub suppress_symbols: Vec<String>,
}

impl ExportedDeclsBuilder {
    pub fn accepts(&self, name: &str, symbol_name: Option<&str>) -> bool {
        if let Some(keep) = &self.keep_names {
            if !keep.iter().any(|k| k == name) {
                return false;
            }
        }
        if self.suppress_names.iter().any(|n| n == name) {
            return false;
        }
        if let Some(sym) = symbol_name {
            if self.suppress_symbols.iter().any(|s| s == sym) {
                return false;
            }
        }
        true
    }
}

/// One corpus: all translation units read from one ELF binary (spec.md §3).
pub struct Corpus {
    pub path: String,
    pub soname: Option<String>,
    pub needed: Vec<String>,
    pub architecture: String,
    pub origin: CorpusOrigin,

    pub symbols: SymbolTable,
    pub defined_functions: HashMap<String, Vec<SymbolId>>,
    pub defined_variables: HashMap<String, Vec<SymbolId>>,
    pub undefined_functions: HashMap<String, Vec<SymbolId>>,
    pub undefined_variables: HashMap<String, Vec<SymbolId>>,

    pub translation_units: Vec<TuId>,

    pub exported_functions: Vec<DeclId>,
    pub exported_variables: Vec<DeclId>,

    pub type_maps: TypeNameMaps,

    pub exported_decls_builder: ExportedDeclsBuilder,
}

impl Corpus {
    pub fn new(path: String, architecture: String, origin: CorpusOrigin) -> Self {
        Corpus {
            path,
            soname: None,
            needed: Vec::new(),
            architecture,
            origin,
            symbols: SymbolTable::new(),
            defined_functions: HashMap::new(),
            defined_variables: HashMap::new(),
            undefined_functions: HashMap::new(),
            undefined_variables: HashMap::new(),
            translation_units: Vec::new(),
            exported_functions: Vec::new(),
            exported_variables: Vec::new(),
            type_maps: TypeNameMaps::new(),
            exported_decls_builder: ExportedDeclsBuilder::default(),
        }
    }

    /// spec.md §5: "Exported functions and variables are sorted by (symbol
    /// name, symbol version) before report generation so diff output is
    /// deterministic." Called by the builder after the fixup pass.
    pub fn sort_exported<'a>(
        &mut self,
        decls: &crate::decls::DeclArena,
        key_of: impl Fn(DeclId) -> (String, Option<String>),
    ) {
        let sort_by_key = |ids: &mut Vec<DeclId>| {
            ids.sort_by(|a, b| key_of(*a).cmp(&key_of(*b)));
        };
        sort_by_key(&mut self.exported_functions);
        sort_by_key(&mut self.exported_variables);
        let _ = decls;
    }
}

pub struct CorpusGroup {
    pub corpora: Vec<Corpus>,
}

impl CorpusGroup {
    pub fn new() -> Self {
        CorpusGroup { corpora: Vec::new() }
    }

    pub fn push(&mut self, corpus: Corpus) {
        self.corpora.push(corpus);
    }
}

impl Default for CorpusGroup {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exported_decls_builder_filters_by_keep_then_suppress() {
        let mut b = ExportedDeclsBuilder::default();
        b.keep_names = Some(vec!["foo".into(), "bar".into()]);
        b.suppress_names = vec!["bar".into()];
        assert!(b.accepts("foo", None));
        assert!(!b.accepts("bar", None));
        assert!(!b.accepts("baz", None));
    }

    #[test]
    fn type_name_maps_partition_by_kind() {
        use cranelift_entity::EntityRef;
        let mut maps = TypeNameMaps::new();
        let t0 = TypeId::new(0);
        let t1 = TypeId::new(1);
        maps.insert(TypeMapKind::Class, "S".into(), t0);
        maps.insert(TypeMapKind::Enum, "S".into(), t1);
        assert_eq!(maps.lookup(TypeMapKind::Class, "S"), &[t0]);
        assert_eq!(maps.lookup(TypeMapKind::Enum, "S"), &[t1]);
        assert!(maps.lookup(TypeMapKind::Union, "S").is_empty());
    }
}
